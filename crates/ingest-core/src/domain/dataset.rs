//! 데이터셋 저장 테이블 정의와 가격 수정 방식.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// PostgreSQL 식별자 최대 길이.
const MAX_IDENTIFIER_LEN: usize = 63;

/// 데이터셋이 저장되는 테이블의 이름과 키 컬럼.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    /// 테이블 이름 (예: "daily_hfq")
    pub name: String,
    /// 심볼 컬럼 (예: "ts_code")
    pub symbol_column: String,
    /// 커버리지 조회 기준 날짜 컬럼 (예: "trade_date", "ann_date")
    pub date_column: String,
    /// 같은 (심볼, 날짜)에 여러 행이 있는 데이터셋의 보조 키 컬럼
    pub sub_key_column: Option<String>,
}

impl TableSpec {
    /// 새 테이블 정의 생성.
    pub fn new(
        name: impl Into<String>,
        symbol_column: impl Into<String>,
        date_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            symbol_column: symbol_column.into(),
            date_column: date_column.into(),
            sub_key_column: None,
        }
    }

    /// 보조 키 컬럼 지정.
    pub fn with_sub_key(mut self, column: impl Into<String>) -> Self {
        self.sub_key_column = Some(column.into());
        self
    }

    /// SQL 식별자로 안전하게 쓸 수 있는지 검증합니다.
    pub fn validate(&self) -> CoreResult<()> {
        validate_identifier("테이블", &self.name)?;
        validate_identifier("심볼 컬럼", &self.symbol_column)?;
        validate_identifier("날짜 컬럼", &self.date_column)?;
        if let Some(sub_key) = &self.sub_key_column {
            validate_identifier("보조 키 컬럼", sub_key)?;
        }
        if self.symbol_column == self.date_column {
            return Err(CoreError::InvalidDescriptor(format!(
                "{}: 심볼 컬럼과 날짜 컬럼이 같습니다 ({})",
                self.name, self.symbol_column
            )));
        }
        Ok(())
    }
}

fn validate_identifier(kind: &str, ident: &str) -> CoreResult<()> {
    let mut chars = ident.chars();
    let valid_head = chars
        .next()
        .map(|c| c.is_ascii_lowercase() || c == '_')
        .unwrap_or(false);
    let valid_tail = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if !valid_head || !valid_tail || ident.len() > MAX_IDENTIFIER_LEN {
        return Err(CoreError::InvalidDescriptor(format!(
            "{} 이름이 올바르지 않습니다: {:?}",
            kind, ident
        )));
    }
    Ok(())
}

/// 가격 수정 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Adjust {
    /// 미수정 가격
    None,
    /// 전진 수정 (최신 가격 기준)
    Qfq,
    /// 후진 수정 (상장일 가격 기준)
    #[default]
    Hfq,
}

impl Adjust {
    /// 제공자 파라미터 값 (미수정은 빈 문자열).
    pub fn as_str(&self) -> &'static str {
        match self {
            Adjust::None => "",
            Adjust::Qfq => "qfq",
            Adjust::Hfq => "hfq",
        }
    }

    /// 일봉 저장 테이블 이름 (예: `base`가 "daily"이면 "daily_hfq", 미수정은 "daily").
    pub fn daily_table(&self, base: &str) -> String {
        match self {
            Adjust::None => base.to_string(),
            other => format!("{}_{}", base, other.as_str()),
        }
    }

    /// 이미 저장한 행을 다시 쓰지 않고 이어서 저장할 수 있는지.
    ///
    /// `qfq`는 최신 복권 인자를 기준으로 하므로 배당/분할이 생기면 과거 행의
    /// 가격이 모두 바뀝니다.
    pub fn is_incremental(&self) -> bool {
        !matches!(self, Adjust::Qfq)
    }
}

impl fmt::Display for Adjust {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Adjust::None => write!(f, "none"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

impl FromStr for Adjust {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "" | "none" => Ok(Adjust::None),
            "qfq" => Ok(Adjust::Qfq),
            "hfq" => Ok(Adjust::Hfq),
            _ => Err(format!("Unknown adjust mode: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_spec_validate() {
        let spec = TableSpec::new("daily_hfq", "ts_code", "trade_date");
        assert!(spec.validate().is_ok());

        let spec = TableSpec::new("index_weight", "index_code", "trade_date").with_sub_key("con_code");
        assert!(spec.validate().is_ok());

        let bad = TableSpec::new("daily; DROP TABLE x", "ts_code", "trade_date");
        assert!(matches!(bad.validate(), Err(CoreError::InvalidDescriptor(_))));

        let same = TableSpec::new("daily", "trade_date", "trade_date");
        assert!(same.validate().is_err());

        let empty = TableSpec::new("", "ts_code", "trade_date");
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_adjust_parse_and_table() {
        assert_eq!("hfq".parse::<Adjust>().unwrap(), Adjust::Hfq);
        assert_eq!("QFQ".parse::<Adjust>().unwrap(), Adjust::Qfq);
        assert_eq!("none".parse::<Adjust>().unwrap(), Adjust::None);
        assert!("xyz".parse::<Adjust>().is_err());

        assert_eq!(Adjust::Hfq.daily_table("daily"), "daily_hfq");
        assert_eq!(Adjust::None.daily_table("daily"), "daily");
        assert_eq!(Adjust::Qfq.daily_table("cn_daily"), "cn_daily_qfq");

        assert!(Adjust::Hfq.is_incremental());
        assert!(Adjust::None.is_incremental());
        assert!(!Adjust::Qfq.is_incremental());
    }
}
