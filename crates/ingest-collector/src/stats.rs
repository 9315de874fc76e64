//! 동기화 실행 결과 요약.

use ingest_core::CoverageWindow;
use serde::Serialize;
use std::time::Duration;

/// 심볼별 처리 결과.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SymbolOutcome {
    /// 이미 최신 (조회하지 않음)
    UpToDate,
    /// 조회 후 저장
    Fetched { rows: usize },
    /// 조회 성공, 데이터 없음. `advanced`는 워터마크 전진 여부
    Empty { advanced: bool },
    /// 재시도 후에도 실패
    Failed { error: String },
}

/// 심볼 하나의 처리 기록.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolReport {
    pub symbol: String,
    /// 계산된 수집 윈도우 (최신이면 없음)
    pub window: Option<CoverageWindow>,
    pub outcome: SymbolOutcome,
}

/// 데이터셋 하나의 동기화 결과
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncSummary {
    /// 데이터셋 이름
    pub dataset: String,
    /// 대상 심볼 수
    pub total: usize,
    /// 조회 후 저장한 심볼 수
    pub fetched: usize,
    /// 건너뛴 심볼 수 (이미 최신 데이터)
    pub skipped: usize,
    /// 빈 데이터 (조회 성공, 데이터 없음)
    pub empty: usize,
    /// 실패한 심볼 수
    pub failed: usize,
    /// 저장된 총 행 수
    pub rows: usize,
    /// 심볼별 결과 (입력 순서)
    pub reports: Vec<SymbolReport>,
    /// 중단 요청으로 일부 심볼을 처리하지 못했는지
    pub cancelled: bool,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl SyncSummary {
    /// 새 요약 생성
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            ..Default::default()
        }
    }

    /// 심볼 결과를 기록하고 카운터를 갱신합니다.
    pub fn record(
        &mut self,
        symbol: impl Into<String>,
        window: Option<CoverageWindow>,
        outcome: SymbolOutcome,
    ) {
        self.total += 1;
        match &outcome {
            SymbolOutcome::UpToDate => self.skipped += 1,
            SymbolOutcome::Fetched { rows } => {
                self.fetched += 1;
                self.rows += rows;
            }
            SymbolOutcome::Empty { .. } => self.empty += 1,
            SymbolOutcome::Failed { .. } => self.failed += 1,
        }
        self.reports.push(SymbolReport {
            symbol: symbol.into(),
            window,
            outcome,
        });
    }

    /// 심볼의 결과 조회.
    pub fn outcome(&self, symbol: &str) -> Option<&SymbolOutcome> {
        self.reports
            .iter()
            .find(|r| r.symbol == symbol)
            .map(|r| &r.outcome)
    }

    /// 실패한 심볼 목록.
    pub fn failed_symbols(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, SymbolOutcome::Failed { .. }))
            .map(|r| r.symbol.as_str())
            .collect()
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            ((self.total - self.failed) as f64 / self.total as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self) {
        tracing::info!(
            dataset = %self.dataset,
            total = self.total,
            fetched = self.fetched,
            skipped = self.skipped,
            empty = self.empty,
            failed = self.failed,
            rows = self.rows,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "동기화 완료"
        );

        if self.cancelled {
            tracing::warn!(dataset = %self.dataset, "중단 요청으로 일부 심볼 미처리");
        }

        for symbol in self.failed_symbols() {
            tracing::warn!(dataset = %self.dataset, symbol = symbol, "실패 심볼");
        }
    }
}
