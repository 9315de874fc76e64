//! 수집 시스템의 도메인 에러 타입.
//!
//! 데이터 소스나 저장소와 무관하게 순수 도메인 로직(날짜 파싱, 레코드 병합,
//! 데이터셋 정의 검증)에서 발생하는 에러를 정의합니다.

use chrono::NaiveDate;
use thiserror::Error;

/// 핵심 도메인 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 설정된 날짜 형식 중 어느 것도 값과 맞지 않음
    #[error("날짜 형식 해석 실패: {value:?} 값이 형식 {formats:?} 중 어느 것과도 맞지 않습니다")]
    FormatUnresolved {
        /// 해석에 실패한 샘플 값
        value: String,
        /// 시도한 형식 목록
        formats: Vec<String>,
    },

    /// 같은 키에 서로 다른 값을 가진 행이 존재 (윈도우 계산 버그)
    #[error("병합 충돌: {table} 테이블의 {symbol} @ {date} (sub_key={sub_key:?}) 값이 서로 다릅니다")]
    MergeConflict {
        table: String,
        symbol: String,
        date: NaiveDate,
        sub_key: String,
    },

    /// 필수 컬럼 누락
    #[error("필수 컬럼 누락: {0}")]
    MissingColumn(String),

    /// 잘못된 데이터셋 정의
    #[error("잘못된 데이터셋 정의: {0}")]
    InvalidDescriptor(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),
}

/// 도메인 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// 실행 전체를 중단해야 하는 구조적 에러인지 확인합니다.
    ///
    /// 병합 충돌과 데이터셋 정의 오류는 심볼 단위로 흡수하지 않습니다.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CoreError::MergeConflict { .. } | CoreError::InvalidDescriptor(_)
        )
    }
}
