//! 수집 대상 심볼 목록.

use crate::Result;
use ingest_data::DataSource;
use tracing::info;

/// 수집 대상 유니버스.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Universe {
    /// 고정 목록
    Fixed(Vec<String>),
    /// 데이터 소스의 상장 종목 목록 (거래소 필터 선택)
    Listed { exchange: Option<String> },
}

impl Universe {
    /// 쉼표로 구분된 문자열에서 고정 목록 생성 (빈 항목 제외).
    pub fn parse_list(list: &str) -> Self {
        Universe::Fixed(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// 심볼 목록을 확정합니다.
    pub async fn resolve(&self, source: &dyn DataSource) -> Result<Vec<String>> {
        match self {
            Universe::Fixed(symbols) => Ok(symbols.clone()),
            Universe::Listed { exchange } => {
                let listing = source.stock_basic(exchange.as_deref()).await?;
                let symbols = listing.column_strings("ts_code");
                info!(
                    source = source.name(),
                    exchange = exchange.as_deref().unwrap_or("ALL"),
                    count = symbols.len(),
                    "상장 종목 조회 완료"
                );
                Ok(symbols)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        assert_eq!(
            Universe::parse_list(" 000001.SZ, ,600000.SH,"),
            Universe::Fixed(vec!["000001.SZ".to_string(), "600000.SH".to_string()])
        );
    }
}
