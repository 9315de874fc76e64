//! 저장 단위 레코드와 병합 전 중복 제거.

use crate::error::{CoreError, CoreResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// 데이터셋 테이블의 한 행.
///
/// `(symbol, date, sub_key)`가 테이블 내 고유 키입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub symbol: String,
    pub date: NaiveDate,
    /// 보조 키 (없으면 빈 문자열)
    pub sub_key: String,
    /// 원본 행 전체
    pub payload: Map<String, Value>,
}

/// 레코드 고유 키.
pub type RecordKey = (String, NaiveDate, String);

impl Record {
    /// 고유 키.
    pub fn key(&self) -> RecordKey {
        (self.symbol.clone(), self.date, self.sub_key.clone())
    }
}

/// 한 번의 조회 결과 안에서 중복 키를 정리합니다.
///
/// 값까지 같은 중복은 하나로 합치고, 같은 키에 값이 다른 행이 있으면
/// `MergeConflict`를 반환합니다. 결과는 키 순서로 정렬됩니다.
pub fn dedup_records(table: &str, records: Vec<Record>) -> CoreResult<Vec<Record>> {
    let mut unique: BTreeMap<RecordKey, Record> = BTreeMap::new();

    for record in records {
        match unique.entry(record.key()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(existing) => {
                if existing.get().payload != record.payload {
                    return Err(CoreError::MergeConflict {
                        table: table.to_string(),
                        symbol: record.symbol,
                        date: record.date,
                        sub_key: record.sub_key,
                    });
                }
                tracing::trace!(
                    table = table,
                    symbol = %record.symbol,
                    date = %record.date,
                    "동일 중복 행 제거"
                );
            }
        }
    }

    Ok(unique.into_values().collect())
}

/// 심볼별 레코드 수.
pub fn count_by_symbol(records: &[Record]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.symbol.as_str()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(symbol: &str, day: u32, close: f64) -> Record {
        let mut payload = Map::new();
        payload.insert("ts_code".into(), json!(symbol));
        payload.insert("close".into(), json!(close));
        Record {
            symbol: symbol.to_string(),
            date: NaiveDate::from_ymd_opt(2020, 1, day).unwrap(),
            sub_key: String::new(),
            payload,
        }
    }

    #[test]
    fn test_dedup_identical_rows() {
        let records = vec![
            record("000001.SZ", 3, 10.0),
            record("000001.SZ", 2, 9.0),
            record("000001.SZ", 3, 10.0),
        ];
        let deduped = dedup_records("daily_hfq", records).unwrap();
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].date, NaiveDate::from_ymd_opt(2020, 1, 2).unwrap());
    }

    #[test]
    fn test_dedup_divergent_rows_conflict() {
        let records = vec![record("000001.SZ", 3, 10.0), record("000001.SZ", 3, 10.5)];
        let err = dedup_records("daily_hfq", records).unwrap_err();
        assert!(matches!(err, CoreError::MergeConflict { ref symbol, .. } if symbol == "000001.SZ"));
    }

    #[test]
    fn test_sub_key_distinguishes_rows() {
        let mut a = record("000300.SH", 2, 1.0);
        a.sub_key = "600000.SH".into();
        let mut b = record("000300.SH", 2, 2.0);
        b.sub_key = "600036.SH".into();

        let deduped = dedup_records("index_weight", vec![a, b]).unwrap();
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn test_count_by_symbol() {
        let records = vec![
            record("A", 2, 1.0),
            record("A", 3, 1.0),
            record("B", 2, 1.0),
        ];
        let counts = count_by_symbol(&records);
        assert_eq!(counts.get("A"), Some(&2));
        assert_eq!(counts.get("B"), Some(&1));
    }
}
