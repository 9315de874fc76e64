//! 데이터셋 정의.

use chrono::NaiveDate;
use ingest_core::{Adjust, CoreError, CoreResult, Table, TableSpec};
use ingest_data::{DataSource, Result};

/// 데이터셋 조회 함수.
///
/// 데이터셋별 파라미터(가격 수정 방식 등)를 함께 들고 있습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFn {
    Daily { adjust: Adjust },
    DailyBasic,
    FinaIndicator,
    IndexDaily,
    IndexWeight,
    /// 심볼 자리에 거래소 코드를 받습니다.
    TradeCal,
}

impl FetchFn {
    /// 제공자 API 이름 (로그용).
    pub fn api_name(&self) -> &'static str {
        match self {
            FetchFn::Daily { .. } => "daily",
            FetchFn::DailyBasic => "daily_basic",
            FetchFn::FinaIndicator => "fina_indicator",
            FetchFn::IndexDaily => "index_daily",
            FetchFn::IndexWeight => "index_weight",
            FetchFn::TradeCal => "trade_cal",
        }
    }

    /// 데이터 소스를 호출합니다.
    pub async fn call(
        &self,
        source: &dyn DataSource,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Table> {
        match *self {
            FetchFn::Daily { adjust } => source.daily(symbols, start, end, adjust).await,
            FetchFn::DailyBasic => source.daily_basic(symbols, start, end).await,
            FetchFn::FinaIndicator => source.fina_indicator(symbols, start, end).await,
            FetchFn::IndexDaily => source.index_daily(symbols, start, end).await,
            FetchFn::IndexWeight => source.index_weight(symbols, start, end).await,
            FetchFn::TradeCal => {
                let mut tables = Vec::with_capacity(symbols.len());
                for exchange in symbols {
                    tables.push(source.trade_cal(start, end, exchange).await?);
                }
                Ok(Table::concat(tables))
            }
        }
    }
}

/// 동기화 대상 데이터셋.
///
/// 드라이버가 만들고 엔진은 읽기만 합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetDescriptor {
    /// 데이터셋 이름 (요약/로그용)
    pub name: String,
    pub fetch: FetchFn,
    /// 같은 윈도우의 여러 심볼을 한 번에 조회할 수 있는지
    pub multistocks: bool,
    pub table: TableSpec,
}

impl DatasetDescriptor {
    /// 단일 심볼 조회 데이터셋 생성. 이름은 테이블 이름을 따릅니다.
    pub fn new(fetch: FetchFn, table: TableSpec) -> Self {
        Self {
            name: table.name.clone(),
            fetch,
            multistocks: false,
            table,
        }
    }

    /// 다중 심볼 조회 여부 지정.
    pub fn with_multistocks(mut self, multistocks: bool) -> Self {
        self.multistocks = multistocks;
        self
    }

    /// 정의 검증. 잘못된 정의는 실행 전체를 중단시킵니다.
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidDescriptor(
                "데이터셋 이름이 비어 있습니다".to_string(),
            ));
        }
        if let FetchFn::Daily { adjust } = self.fetch {
            if !adjust.is_incremental() {
                return Err(CoreError::InvalidDescriptor(format!(
                    "{} 가격은 증분 저장할 수 없습니다 (hfq 또는 none 사용)",
                    adjust
                )));
            }
        }
        self.table.validate()
    }
}
