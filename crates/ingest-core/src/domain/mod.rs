//! 수집 도메인 모델.

pub mod dataset;
pub mod date_format;
pub mod record;
pub mod table;
pub mod window;

pub use dataset::{Adjust, TableSpec};
pub use date_format::{DateFormats, DEFAULT_DATE_FORMATS};
pub use record::{count_by_symbol, dedup_records, Record, RecordKey};
pub use table::{value_as_string, Table};
pub use window::CoverageWindow;
