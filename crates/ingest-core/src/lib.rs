//! # Ingest Core
//!
//! 시세 데이터 증분 수집 시스템의 핵심 도메인 타입을 제공합니다.
//!
//! - 조회 결과 테이블과 저장 레코드
//! - 증분 수집 윈도우 계산
//! - 날짜 형식 판별
//! - 레코드 중복 제거 (병합 충돌 감지)
//! - 설정 및 로깅 초기화

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
