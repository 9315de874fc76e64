//! 날짜 형식 판별 및 파싱.
//!
//! 데이터 소스마다 날짜 문자열 형식이 다릅니다 (`20200102`, `2020-01-02` 등).
//! 설정된 후보 형식 목록에서 샘플 값과 맞는 형식을 찾고, 같은 컬럼의 나머지
//! 값은 그 형식으로 파싱합니다.

use crate::error::{CoreError, CoreResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 기본 후보 형식 (쉼표 구분).
pub const DEFAULT_DATE_FORMATS: &str = "%Y%m%d,%Y-%m-%d";

/// 날짜 형식 후보 목록.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateFormats {
    formats: Vec<String>,
}

impl Default for DateFormats {
    fn default() -> Self {
        Self::parse_list(DEFAULT_DATE_FORMATS)
    }
}

impl DateFormats {
    /// 형식 목록으로 생성.
    pub fn new(formats: Vec<String>) -> Self {
        Self { formats }
    }

    /// 쉼표로 구분된 형식 문자열을 파싱합니다 (예: `"%Y%m%d,%Y-%m-%d"`).
    pub fn parse_list(list: &str) -> Self {
        let formats = list
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();
        Self { formats }
    }

    /// 후보 형식 목록.
    pub fn formats(&self) -> &[String] {
        &self.formats
    }

    /// 샘플 값과 일치하는 첫 번째 형식을 반환합니다.
    pub fn resolve(&self, sample: &str) -> CoreResult<&str> {
        let sample = sample.trim();
        self.formats
            .iter()
            .find(|f| NaiveDate::parse_from_str(sample, f).is_ok())
            .map(String::as_str)
            .ok_or_else(|| self.unresolved(sample))
    }

    /// 형식을 판별한 뒤 값을 파싱합니다.
    pub fn parse(&self, value: &str) -> CoreResult<NaiveDate> {
        let format = self.resolve(value)?;
        self.parse_with(format, value)
    }

    /// 이미 판별된 형식으로 값을 파싱합니다.
    ///
    /// 한 컬럼 안에서 형식이 섞여 있으면 `FormatUnresolved`를 반환합니다.
    pub fn parse_with(&self, format: &str, value: &str) -> CoreResult<NaiveDate> {
        let value = value.trim();
        NaiveDate::parse_from_str(value, format).map_err(|_| self.unresolved(value))
    }

    fn unresolved(&self, value: &str) -> CoreError {
        CoreError::FormatUnresolved {
            value: value.to_string(),
            formats: self.formats.clone(),
        }
    }
}
