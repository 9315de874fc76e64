//! 데이터 소스 조회 결과 테이블.
//!
//! 컬럼 이름 목록과 행 목록(`serde_json::Value` 셀)으로 구성된 단순한 테이블입니다.
//! Tushare 응답의 `data: { fields, items }` 구조와 같은 모양이라 그대로
//! 역직렬화할 수 있습니다.

use super::dataset::TableSpec;
use super::date_format::DateFormats;
use super::record::Record;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 컬럼 기반 결과 테이블.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// 컬럼 이름
    #[serde(default)]
    pub fields: Vec<String>,
    /// 행 (각 행은 `fields`와 같은 길이)
    #[serde(default)]
    pub items: Vec<Vec<Value>>,
}

impl Table {
    /// 새 테이블 생성.
    pub fn new(fields: Vec<String>, items: Vec<Vec<Value>>) -> Self {
        Self { fields, items }
    }

    /// 빈 테이블.
    pub fn empty() -> Self {
        Self::default()
    }

    /// 행 수.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// 행이 없는지 확인.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 컬럼 위치.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    /// 컬럼 존재 여부.
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// 필수 컬럼이 모두 있는지 확인합니다.
    pub fn require_columns(&self, columns: &[&str]) -> CoreResult<()> {
        match columns.iter().find(|c| !self.has_column(c)) {
            Some(missing) => Err(CoreError::MissingColumn(missing.to_string())),
            None => Ok(()),
        }
    }

    /// 셀 값 조회.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.items.get(row)?.get(idx)
    }

    /// 컬럼 값을 문자열로 모읍니다 (null 제외).
    pub fn column_strings(&self, column: &str) -> Vec<String> {
        match self.column_index(column) {
            Some(idx) => self
                .items
                .iter()
                .filter_map(|row| row.get(idx).and_then(value_as_string))
                .collect(),
            None => Vec::new(),
        }
    }

    /// 행을 JSON 객체로 변환합니다.
    pub fn row_object(&self, row: usize) -> Map<String, Value> {
        let mut object = Map::new();
        if let Some(values) = self.items.get(row) {
            for (field, value) in self.fields.iter().zip(values.iter()) {
                object.insert(field.clone(), value.clone());
            }
        }
        object
    }

    /// 조건을 만족하는 행만 남깁니다.
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[String], &[Value]) -> bool,
    {
        let fields = &self.fields;
        self.items.retain(|row| keep(fields, row));
    }

    /// 여러 테이블을 한 번에 이어붙입니다.
    ///
    /// 컬럼은 처음 등장한 순서로 합집합을 만들고, 없는 셀은 `null`로 채웁니다.
    pub fn concat<I>(tables: I) -> Table
    where
        I: IntoIterator<Item = Table>,
    {
        let tables: Vec<Table> = tables.into_iter().collect();

        let mut fields: Vec<String> = Vec::new();
        for table in &tables {
            for field in &table.fields {
                if !fields.contains(field) {
                    fields.push(field.clone());
                }
            }
        }

        let total_rows = tables.iter().map(Table::len).sum();
        let mut items = Vec::with_capacity(total_rows);
        for table in tables {
            let mapping: Vec<Option<usize>> =
                fields.iter().map(|f| table.column_index(f)).collect();
            for mut row in table.items {
                let aligned = mapping
                    .iter()
                    .map(|idx| {
                        idx.and_then(|i| row.get_mut(i).map(Value::take))
                            .unwrap_or(Value::Null)
                    })
                    .collect();
                items.push(aligned);
            }
        }

        Table { fields, items }
    }

    /// JSON 객체 목록으로 테이블을 만듭니다 (저장소 payload 복원용).
    pub fn from_objects(objects: Vec<Map<String, Value>>) -> Table {
        let mut fields: Vec<String> = Vec::new();
        for object in &objects {
            for key in object.keys() {
                if !fields.contains(key) {
                    fields.push(key.clone());
                }
            }
        }

        let items = objects
            .into_iter()
            .map(|mut object| {
                fields
                    .iter()
                    .map(|f| object.remove(f).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Table { fields, items }
    }

    /// 저장용 레코드로 변환합니다.
    ///
    /// 날짜 컬럼의 첫 번째 값으로 형식을 판별한 뒤 모든 행을 같은 형식으로
    /// 파싱합니다. 형식이 맞지 않으면 `FormatUnresolved`를 반환합니다.
    pub fn to_records(&self, spec: &TableSpec, formats: &DateFormats) -> CoreResult<Vec<Record>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let mut required = vec![spec.symbol_column.as_str(), spec.date_column.as_str()];
        if let Some(sub_key) = &spec.sub_key_column {
            required.push(sub_key.as_str());
        }
        self.require_columns(&required)?;

        let symbol_idx = self.column_index(&spec.symbol_column).unwrap_or_default();
        let date_idx = self.column_index(&spec.date_column).unwrap_or_default();
        let sub_key_idx = spec
            .sub_key_column
            .as_deref()
            .and_then(|c| self.column_index(c));

        let sample = self
            .items
            .iter()
            .find_map(|row| row.get(date_idx).and_then(value_as_string))
            .ok_or_else(|| {
                CoreError::InvalidInput(format!("{} 컬럼 값이 모두 비어 있습니다", spec.date_column))
            })?;
        let format = formats.resolve(&sample)?.to_string();

        let mut records = Vec::with_capacity(self.len());
        for (row_idx, row) in self.items.iter().enumerate() {
            let symbol = row.get(symbol_idx).and_then(value_as_string).ok_or_else(|| {
                CoreError::InvalidInput(format!("{}번째 행의 {} 값이 없습니다", row_idx, spec.symbol_column))
            })?;
            let raw_date = row.get(date_idx).and_then(value_as_string).ok_or_else(|| {
                CoreError::InvalidInput(format!("{}번째 행의 {} 값이 없습니다", row_idx, spec.date_column))
            })?;
            let date = formats.parse_with(&format, &raw_date)?;
            let sub_key = sub_key_idx
                .and_then(|idx| row.get(idx))
                .and_then(value_as_string)
                .unwrap_or_default();

            records.push(Record {
                symbol,
                date,
                sub_key,
                payload: self.row_object(row_idx),
            });
        }

        Ok(records)
    }
}

/// 셀 값을 문자열로 변환 (null이면 None).
pub fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}
