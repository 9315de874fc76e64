//! 재무 지표 드라이버.
//!
//! 공시일(`ann_date`) 기준으로 커버리지를 계산합니다. 같은 날 여러 보고 기간이
//! 공시될 수 있어 `end_date`를 보조 키로 씁니다.

use super::{DownloadContext, Downloader};
use crate::engine::{DatasetDescriptor, FetchFn};
use crate::Result;
use async_trait::async_trait;
use ingest_core::TableSpec;

pub struct FinaIndicatorDownloader {
    context: DownloadContext,
    descriptor: DatasetDescriptor,
}

impl FinaIndicatorDownloader {
    pub fn new(context: DownloadContext) -> Self {
        let table = TableSpec::new(context.tables.fina_indicator.as_str(), "ts_code", "ann_date")
            .with_sub_key("end_date");
        Self {
            descriptor: DatasetDescriptor::new(FetchFn::FinaIndicator, table),
            context,
        }
    }
}

#[async_trait]
impl Downloader for FinaIndicatorDownloader {
    fn descriptor(&self) -> &DatasetDescriptor {
        &self.descriptor
    }

    fn context(&self) -> &DownloadContext {
        &self.context
    }

    async fn universe(&self) -> Result<Vec<String>> {
        self.context
            .stocks
            .resolve(self.context.engine.source().as_ref())
            .await
    }
}
