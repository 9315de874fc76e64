//! 거래 달력 드라이버.

use super::{DownloadContext, Downloader};
use crate::engine::{DatasetDescriptor, FetchFn};
use crate::Result;
use async_trait::async_trait;
use ingest_core::TableSpec;

/// 거래소별 거래 달력. 심볼 자리에 거래소 코드를 씁니다.
pub struct TradeCalDownloader {
    context: DownloadContext,
    descriptor: DatasetDescriptor,
}

impl TradeCalDownloader {
    pub fn new(context: DownloadContext) -> Self {
        let table = TableSpec::new(context.tables.trade_cal.as_str(), "exchange", "cal_date");
        Self {
            descriptor: DatasetDescriptor::new(FetchFn::TradeCal, table),
            context,
        }
    }
}

#[async_trait]
impl Downloader for TradeCalDownloader {
    fn descriptor(&self) -> &DatasetDescriptor {
        &self.descriptor
    }

    fn context(&self) -> &DownloadContext {
        &self.context
    }

    async fn universe(&self) -> Result<Vec<String>> {
        Ok(self.context.exchanges.clone())
    }
}
