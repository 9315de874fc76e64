//! Tushare Pro API 클라이언트.
//!
//! 모든 API는 하나의 엔드포인트에 다음 형식으로 POST 합니다:
//!
//! ```json
//! {"api_name": "daily", "token": "...", "params": {"ts_code": "000001.SZ"}, "fields": ""}
//! ```
//!
//! 응답은 `{"code": 0, "msg": "", "data": {"fields": [...], "items": [[...]]}}` 형식입니다.
//!
//! # 주의 사항
//!
//! - 수정주가 일봉(`pro_bar`)은 한 번에 한 종목만 조회할 수 있습니다.
//!   여러 종목을 넘기면 중복/어긋난 행이 섞여 돌아오므로 종목별로 호출합니다.
//! - 분당 호출 한도를 넘기면 `code = 40203`이 옵니다 (재시도 대상).
//! - 동시 호출을 지원하지 않습니다. 호출자는 순차적으로 사용해야 합니다.
//! - 한 번에 돌려주는 행 수에 상한이 있습니다. `has_more`가 `true`이면
//!   `offset`을 늘려 다음 페이지를 이어서 조회합니다.

use crate::error::{DataError, Result};
use crate::source::DataSource;
use async_trait::async_trait;
use chrono::NaiveDate;
use ingest_core::{value_as_string, Adjust, Table, TushareConfig};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

/// 요청 한도 초과 응답 코드.
const RATE_LIMIT_CODE: i64 = 40203;

/// 토큰 오류 응답 코드.
const TOKEN_ERROR_CODES: [i64; 2] = [40001, 40101];

/// 수정 대상 가격 컬럼.
const PRICE_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "pre_close"];

/// 한 API 호출에서 따라갈 최대 페이지 수.
const MAX_PAGES: usize = 1_000;

/// 상장 종목 조회 컬럼.
const STOCK_BASIC_FIELDS: &str = "ts_code,symbol,name,area,industry,market,exchange,list_date";

/// API 응답 래퍼.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<ApiData>,
}

/// 응답 데이터 (한 페이지).
#[derive(Debug, Default, Deserialize)]
struct ApiData {
    #[serde(default)]
    fields: Vec<String>,
    #[serde(default)]
    items: Vec<Vec<Value>>,
    /// 남은 행이 있으면 `true`
    #[serde(default)]
    has_more: bool,
}

/// Tushare Pro 원격 데이터 소스.
#[derive(Clone)]
pub struct TushareDataSource {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl TushareDataSource {
    /// 설정으로 클라이언트를 생성합니다.
    pub fn new(config: &TushareConfig) -> Result<Self> {
        if config.token.is_empty() {
            return Err(DataError::ConfigError(
                "Tushare 토큰이 설정되지 않았습니다 (INGEST__SOURCE__TUSHARE__TOKEN)".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DataError::ConfigError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            token: config.token.clone(),
            base_url: config.base_url.clone(),
        })
    }

    /// API 호출. `has_more`가 끝날 때까지 페이지를 이어붙입니다.
    async fn query(&self, api_name: &str, params: Value, fields: &str) -> Result<Table> {
        let mut pages = Vec::new();
        let mut offset = 0usize;

        loop {
            let mut page_params = params.clone();
            if offset > 0 {
                if let Value::Object(map) = &mut page_params {
                    map.insert("offset".to_string(), json!(offset));
                }
            }

            let page = self.query_page(api_name, page_params, fields).await?;
            let rows = page.items.len();
            let has_more = page.has_more;
            pages.push(Table::new(page.fields, page.items));

            if !has_more {
                break;
            }
            // 잘린 응답을 완전한 결과로 취급하지 않음
            if rows == 0 || pages.len() >= MAX_PAGES {
                return Err(DataError::transient(format!(
                    "Tushare 응답이 끝나지 않았습니다 [{}]: offset={}, pages={}",
                    api_name,
                    offset,
                    pages.len()
                )));
            }
            offset += rows;
            debug!(api_name = api_name, offset = offset, "다음 페이지 조회");
        }

        let table = Table::concat(pages);
        debug!(api_name = api_name, rows = table.len(), "Tushare API 응답");
        Ok(table)
    }

    /// API 한 페이지 호출.
    async fn query_page(&self, api_name: &str, params: Value, fields: &str) -> Result<ApiData> {
        debug!(api_name = api_name, params = %params, "Tushare API 요청");

        let body = json!({
            "api_name": api_name,
            "token": self.token,
            "params": params,
            "fields": fields,
        });

        let response = self.client.post(&self.base_url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = format!("Tushare API 오류 [{}]: {} - {}", api_name, status, text);
            return Err(match status.as_u16() {
                429 => DataError::RateLimited(message),
                code if code >= 500 => DataError::transient(message),
                _ => DataError::permanent(message),
            });
        }

        let payload: ApiResponse = response
            .json()
            .await
            .map_err(|e| DataError::transient(format!("Tushare 응답 해석 실패 [{}]: {}", api_name, e)))?;

        if payload.code != 0 {
            return Err(classify_api_error(
                api_name,
                payload.code,
                payload.msg.as_deref().unwrap_or_default(),
            ));
        }

        Ok(payload.data.unwrap_or_default())
    }

    /// 심볼마다 한 번씩 호출하고 결과를 한 번에 이어붙입니다.
    async fn query_each(
        &self,
        api_name: &str,
        key: &str,
        codes: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Table> {
        let mut tables = Vec::with_capacity(codes.len());
        for code in codes {
            tables.push(self.query(api_name, range_params(key, code, start, end), "").await?);
        }
        Ok(Table::concat(tables))
    }

    /// 수정주가 일봉 (한 종목).
    async fn pro_bar(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
        adjust: Adjust,
    ) -> Result<Table> {
        let daily = self
            .query("daily", range_params("ts_code", code, start, end), "")
            .await?;
        if daily.is_empty() || adjust == Adjust::None {
            return Ok(daily);
        }

        let factors = self
            .query("adj_factor", range_params("ts_code", code, start, end), "")
            .await?;
        adjust_prices(daily, &factors, adjust)
    }
}

/// 응답 코드를 에러 유형으로 분류합니다.
fn classify_api_error(api_name: &str, code: i64, msg: &str) -> DataError {
    let message = format!("Tushare API 오류 [{}] code={}: {}", api_name, code, msg);

    if code == RATE_LIMIT_CODE || msg.contains("每分钟") || msg.contains("最多访问") {
        DataError::RateLimited(message)
    } else if TOKEN_ERROR_CODES.contains(&code) || msg.to_lowercase().contains("token") {
        DataError::ConfigError(message)
    } else {
        DataError::permanent(message)
    }
}

/// 제공자 날짜 형식 (YYYYMMDD).
fn wire_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

fn range_params(key: &str, code: &str, start: NaiveDate, end: NaiveDate) -> Value {
    let mut params = Map::new();
    params.insert(key.to_string(), Value::String(code.to_string()));
    params.insert("start_date".to_string(), Value::String(wire_date(start)));
    params.insert("end_date".to_string(), Value::String(wire_date(end)));
    Value::Object(params)
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// 복권 인자로 가격 컬럼을 수정합니다.
///
/// - `hfq`: 가격 × 인자
/// - `qfq`: 가격 × 인자 / 조회 구간의 최신 인자
///
/// `change`, `pct_chg`는 수정된 가격으로 다시 계산합니다.
/// 인자가 없는 날짜의 행은 제외합니다.
pub(crate) fn adjust_prices(daily: Table, factors: &Table, adjust: Adjust) -> Result<Table> {
    if adjust == Adjust::None {
        return Ok(daily);
    }
    daily.require_columns(&["trade_date"])?;
    factors.require_columns(&["trade_date", "adj_factor"])?;

    let factor_by_date: BTreeMap<String, f64> = (0..factors.len())
        .filter_map(|row| {
            let date = factors.value(row, "trade_date").and_then(value_as_string)?;
            let factor = factors.value(row, "adj_factor").and_then(as_f64)?;
            Some((date, factor))
        })
        .collect();

    let Some((_, &latest_factor)) = factor_by_date.iter().next_back() else {
        return Err(DataError::transient("복권 인자가 비어 있습니다"));
    };
    if latest_factor == 0.0 {
        return Err(DataError::InvalidData("최신 복권 인자가 0입니다".to_string()));
    }

    let mut fields = daily.fields.clone();
    if !fields.iter().any(|f| f == "adj_factor") {
        fields.push("adj_factor".to_string());
    }

    let mut items = Vec::with_capacity(daily.len());
    let mut dropped = 0usize;

    for row in 0..daily.len() {
        let mut object = daily.row_object(row);
        let Some(factor) = object
            .get("trade_date")
            .and_then(value_as_string)
            .and_then(|date| factor_by_date.get(&date).copied())
        else {
            dropped += 1;
            continue;
        };

        let scale = match adjust {
            Adjust::Hfq => factor,
            Adjust::Qfq => factor / latest_factor,
            Adjust::None => 1.0,
        };

        for column in PRICE_COLUMNS {
            if let Some(price) = object.get(column).and_then(as_f64) {
                object.insert(column.to_string(), json!(round4(price * scale)));
            }
        }

        let close = object.get("close").and_then(as_f64);
        let pre_close = object.get("pre_close").and_then(as_f64);
        if let (Some(close), Some(pre_close)) = (close, pre_close) {
            let change = close - pre_close;
            object.insert("change".to_string(), json!(round4(change)));
            if pre_close != 0.0 {
                object.insert("pct_chg".to_string(), json!(round4(change / pre_close * 100.0)));
            }
        }
        object.insert("adj_factor".to_string(), json!(factor));

        items.push(
            fields
                .iter()
                .map(|f| object.remove(f).unwrap_or(Value::Null))
                .collect(),
        );
    }

    if dropped > 0 {
        warn!(dropped = dropped, adjust = %adjust, "복권 인자가 없는 행 제외");
    }

    Ok(Table::new(fields, items))
}

#[async_trait]
impl DataSource for TushareDataSource {
    fn name(&self) -> &'static str {
        "tushare"
    }

    async fn daily(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
        adjust: Adjust,
    ) -> Result<Table> {
        let mut tables = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            tables.push(self.pro_bar(symbol, start, end, adjust).await?);
        }
        Ok(Table::concat(tables))
    }

    async fn daily_basic(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Table> {
        // daily_basic은 쉼표로 구분된 여러 종목을 한 번에 받습니다.
        let joined = symbols.join(",");
        self.query("daily_basic", range_params("ts_code", &joined, start, end), "")
            .await
    }

    async fn fina_indicator(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Table> {
        self.query_each("fina_indicator", "ts_code", symbols, start, end)
            .await
    }

    async fn index_daily(
        &self,
        codes: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Table> {
        self.query_each("index_daily", "ts_code", codes, start, end).await
    }

    async fn index_weight(
        &self,
        codes: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Table> {
        self.query_each("index_weight", "index_code", codes, start, end)
            .await
    }

    async fn trade_cal(&self, start: NaiveDate, end: NaiveDate, exchange: &str) -> Result<Table> {
        self.query("trade_cal", range_params("exchange", exchange, start, end), "")
            .await
    }

    async fn stock_basic(&self, exchange: Option<&str>) -> Result<Table> {
        let mut params = Map::new();
        params.insert("list_status".to_string(), json!("L"));
        if let Some(exchange) = exchange {
            params.insert("exchange".to_string(), json!(exchange));
        }
        self.query("stock_basic", Value::Object(params), STOCK_BASIC_FIELDS)
            .await
    }
}
