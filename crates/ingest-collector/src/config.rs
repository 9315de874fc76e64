//! 실행 설정 해석.
//!
//! 설정 파일/환경 변수(`AppConfig`)와 CLI 인자를 합쳐 수집 구간과 유니버스를
//! 결정합니다.

use crate::error::CollectorError;
use crate::modules::Universe;
use crate::Result;
use chrono::{NaiveDate, Utc};
use chrono_tz::Asia::Shanghai;
use ingest_core::SyncConfig;

/// 거래소 기준 오늘 날짜 (Asia/Shanghai).
pub fn exchange_today() -> NaiveDate {
    Utc::now().with_timezone(&Shanghai).date_naive()
}

/// 수집 구간 결정.
///
/// CLI 인자가 설정보다 우선하고, 종료일이 없으면 거래소 기준 오늘입니다.
pub fn determine_date_range(
    config: &SyncConfig,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(NaiveDate, NaiveDate)> {
    let formats = config.date_formats();

    let start_date = formats.parse(start.unwrap_or(&config.start_date))?;
    let end_date = match end.or(config.end_date.as_deref()) {
        Some(date) => formats.parse(date)?,
        None => exchange_today(),
    };

    if start_date > end_date {
        return Err(CollectorError::Config(format!(
            "시작일({})이 종료일({})보다 늦습니다",
            start_date, end_date
        )));
    }

    Ok((start_date, end_date))
}

/// 종목 유니버스 결정.
///
/// `--symbols` 인자, 설정의 고정 목록, 상장 종목 조회 순으로 사용합니다.
pub fn stock_universe(config: &SyncConfig, symbols: Option<&str>) -> Universe {
    match symbols {
        Some(list) => Universe::parse_list(list),
        None if !config.symbols.is_empty() => Universe::Fixed(config.symbols.clone()),
        None => Universe::Listed {
            exchange: config.listing_exchange.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_range_from_config() {
        let config = SyncConfig {
            start_date: "20200101".to_string(),
            end_date: Some("2020-03-31".to_string()),
            ..Default::default()
        };
        let (start, end) = determine_date_range(&config, None, None).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2020, 3, 31).unwrap());
    }

    #[test]
    fn test_cli_overrides_and_default_end() {
        let config = SyncConfig::default();
        let (start, end) = determine_date_range(&config, Some("20240102"), None).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(end, exchange_today());
    }

    #[test]
    fn test_reversed_range_rejected() {
        let config = SyncConfig::default();
        let err = determine_date_range(&config, Some("20200201"), Some("20200101")).unwrap_err();
        assert!(matches!(err, CollectorError::Config(_)));

        let err = determine_date_range(&config, Some("2020/01/01"), Some("20200101")).unwrap_err();
        assert!(matches!(err, CollectorError::Core(_)));
    }

    #[test]
    fn test_stock_universe_precedence() {
        let mut config = SyncConfig::default();
        assert_eq!(
            stock_universe(&config, None),
            Universe::Listed { exchange: None }
        );

        config.symbols = vec!["000001.SZ".to_string()];
        assert_eq!(
            stock_universe(&config, None),
            Universe::Fixed(vec!["000001.SZ".to_string()])
        );
        assert_eq!(
            stock_universe(&config, Some("600000.SH")),
            Universe::Fixed(vec!["600000.SH".to_string()])
        );
    }
}
