//! 데이터 소스와 커버리지 저장소.
//!
//! 이 crate는 다음을 제공합니다:
//! - 데이터 소스 인터페이스와 구현 (Tushare Pro, 저장소 조회)
//! - 데이터셋 행과 심볼별 워터마크를 저장하는 커버리지 저장소
//!   (PostgreSQL, 메모리)

pub mod error;
pub mod source;
pub mod storage;

pub use error::{DataError, Result, UnavailableKind};

// 데이터 소스 재내보내기
pub use source::{
    count_open_days, create_data_source, DataSource, DatabaseDataSource, TushareDataSource,
};

// 저장소 재내보내기
pub use storage::{
    CoverageStore, MemoryCoverageStore, PgCoverageStore, Watermark, WATERMARK_TABLE,
};

// 연결 풀 타입 재내보내기
pub use sqlx::PgPool;
