//! 시세 데이터 증분 수집기.
//!
//! 이 crate는 다음을 제공합니다:
//! - 배치 동기화 엔진 (윈도우 계산, 조회, 병합, 재시도)
//! - 데이터셋 드라이버 (일봉, 일별 지표, 재무 지표, 지수, 거래 달력)
//! - 상장 종목 동기화
//! - 수집 CLI 바이너리

pub mod config;
pub mod engine;
pub mod error;
pub mod modules;
pub mod stats;

pub use engine::{
    DatasetDescriptor, FetchFn, RetryPolicy, SymbolPlan, SyncEngine, SyncOptions,
};
pub use error::{CollectorError, Result};
pub use modules::{DownloadContext, Downloader, Universe};
pub use stats::{SymbolOutcome, SymbolReport, SyncSummary};
