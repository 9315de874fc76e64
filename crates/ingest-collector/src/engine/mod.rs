//! 배치 동기화 엔진.
//!
//! 데이터셋 하나를 심볼 목록과 목표 구간에 맞춰 증분 동기화합니다.
//!
//! 1. 심볼마다 저장소의 마지막 수집 날짜로 윈도우 계산 (최신이면 건너뜀)
//! 2. 윈도우를 조회 단위로 묶음 (`multistocks`일 때만 여러 심볼)
//! 3. 조회 단위마다 재시도 정책으로 데이터 소스 호출
//! 4. 레코드 변환, 중복 제거 후 행과 워터마크를 한 트랜잭션으로 병합
//!
//! 제공자 호출은 하나씩 순서대로 실행합니다. 심볼 단위 실패는 요약에 기록하고
//! 계속 진행하며, 저장소 오류와 병합 충돌은 실행 전체를 중단시킵니다.

pub mod descriptor;
pub mod plan;
pub mod retry;

pub use descriptor::{DatasetDescriptor, FetchFn};
pub use plan::{group_units, FetchUnit, SymbolPlan};
pub use retry::{Backoff, RetryPolicy};

use crate::error::{CollectorError, Result};
use crate::stats::{SymbolOutcome, SyncSummary};
use chrono::NaiveDate;
use ingest_core::{
    count_by_symbol, dedup_records, CoreError, CoverageWindow, DateFormats, Record, SyncConfig,
    Table,
};
use ingest_data::{count_open_days, CoverageStore, DataSource, Watermark};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn, Instrument};

/// 엔진 실행 옵션.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub retry: RetryPolicy,
    /// 연속된 제공자 호출 사이 최소 간격
    pub request_delay: Duration,
    /// 빈 결과 확인에 쓰는 거래소 달력
    pub calendar_exchange: String,
    /// 다중 심볼 조회 시 배치당 최대 심볼 수
    pub max_batch_size: usize,
    pub date_formats: DateFormats,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

impl SyncOptions {
    /// 동기화 설정에서 생성.
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            retry: RetryPolicy::from_config(config),
            request_delay: Duration::from_millis(config.request_delay_ms),
            calendar_exchange: config.calendar_exchange.clone(),
            max_batch_size: config.max_batch_size,
            date_formats: config.date_formats(),
        }
    }
}

/// 제공자 호출 간격 유지.
struct Pacer {
    delay: Duration,
    last: Option<tokio::time::Instant>,
}

impl Pacer {
    fn new(delay: Duration) -> Self {
        Self { delay, last: None }
    }

    async fn wait(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                tokio::time::sleep(self.delay - elapsed).await;
            }
        }
        self.last = Some(tokio::time::Instant::now());
    }
}

/// 한 번의 실행 동안 유지되는 상태.
struct RunState {
    pacer: Pacer,
    /// 윈도우별 개장일 수 (`None`은 확인 불가)
    calendar: HashMap<CoverageWindow, Option<usize>>,
}

/// 배치 동기화 엔진.
pub struct SyncEngine {
    source: Arc<dyn DataSource>,
    store: Arc<dyn CoverageStore>,
    options: SyncOptions,
    cancel: Arc<AtomicBool>,
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn DataSource>,
        store: Arc<dyn CoverageStore>,
        options: SyncOptions,
    ) -> Self {
        Self {
            source,
            store,
            options,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    pub fn store(&self) -> &Arc<dyn CoverageStore> {
        &self.store
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// 중단 플래그. `true`로 설정하면 다음 조회 단위 전에 멈춥니다.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// 심볼별 수집 윈도우를 계산합니다 (조회하지 않음).
    ///
    /// 중복 심볼은 처음 것만 남기고 입력 순서를 유지합니다.
    pub async fn plan(
        &self,
        descriptor: &DatasetDescriptor,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SymbolPlan>> {
        descriptor.validate()?;
        if start > end {
            return Err(CoreError::InvalidInput(format!(
                "시작일이 종료일보다 늦습니다: {} > {}",
                start, end
            ))
            .into());
        }

        self.store.ensure_table(&descriptor.table).await?;

        let mut seen = HashSet::new();
        let mut plans = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            if !seen.insert(symbol.as_str()) {
                continue;
            }
            let latest = self.store.latest_covered(&descriptor.table, symbol).await?;
            let window = CoverageWindow::compute(latest, start, end);
            debug!(
                dataset = %descriptor.name,
                symbol = %symbol,
                latest = ?latest,
                window = ?window,
                "윈도우 계산"
            );
            plans.push(SymbolPlan {
                symbol: symbol.clone(),
                window,
            });
        }

        Ok(plans)
    }

    /// 데이터셋을 목표 구간까지 동기화합니다.
    pub async fn synchronize(
        &self,
        descriptor: &DatasetDescriptor,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<SyncSummary> {
        let started = Instant::now();
        let mut summary = SyncSummary::new(&descriptor.name);

        let plans = self.plan(descriptor, symbols, start, end).await?;
        let units = group_units(&plans, descriptor.multistocks, self.options.max_batch_size);

        info!(
            dataset = %descriptor.name,
            symbols = plans.len(),
            units = units.len(),
            start = %start,
            end = %end,
            "동기화 시작"
        );

        let mut state = RunState {
            pacer: Pacer::new(self.options.request_delay),
            calendar: HashMap::new(),
        };
        let mut outcomes: HashMap<String, SymbolOutcome> = HashMap::new();

        for (idx, unit) in units.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                warn!(
                    dataset = %descriptor.name,
                    remaining = units.len() - idx,
                    "중단 요청 수신, 남은 조회 단위 건너뜀"
                );
                summary.cancelled = true;
                break;
            }

            let span = ingest_core::sync_span!(descriptor.name, unit.symbols.join(","));
            debug!(
                progress = format!("{}/{}", idx + 1, units.len()),
                window = %unit.window,
                "조회 시작"
            );

            let results = self
                .sync_unit(descriptor, unit, &mut state)
                .instrument(span)
                .await?;
            outcomes.extend(results);
        }

        for plan in plans {
            match plan.window {
                None => summary.record(plan.symbol, None, SymbolOutcome::UpToDate),
                Some(window) => {
                    if let Some(outcome) = outcomes.remove(&plan.symbol) {
                        summary.record(plan.symbol, Some(window), outcome);
                    }
                }
            }
        }

        summary.elapsed = started.elapsed();
        summary.log_summary();
        Ok(summary)
    }

    /// 조회 단위 하나를 조회하고 병합합니다.
    ///
    /// 여러 심볼을 묶은 조회가 재시도로 해결되지 않는 에러로 실패하면
    /// 심볼별로 다시 조회해 실패한 심볼만 기록합니다.
    async fn sync_unit(
        &self,
        descriptor: &DatasetDescriptor,
        unit: &FetchUnit,
        state: &mut RunState,
    ) -> Result<Vec<(String, SymbolOutcome)>> {
        match self.fetch(descriptor, &unit.symbols, unit.window, state).await {
            Ok(table) => self.apply(descriptor, unit, table, state).await,
            Err(e) if e.is_structural() => Err(e.into()),
            Err(e) if unit.symbols.len() > 1 && !e.is_retryable() => {
                warn!(
                    symbols = unit.symbols.len(),
                    error = %e,
                    "배치 조회 실패, 종목별로 다시 조회"
                );
                let mut outcomes = Vec::with_capacity(unit.symbols.len());
                for symbol in &unit.symbols {
                    let single = FetchUnit {
                        window: unit.window,
                        symbols: vec![symbol.clone()],
                    };
                    let fetched = self
                        .fetch(descriptor, &single.symbols, single.window, state)
                        .await;
                    let results = match fetched {
                        Ok(table) => self.apply(descriptor, &single, table, state).await?,
                        Err(e) if e.is_structural() => return Err(e.into()),
                        Err(e) => fail_unit(&single, &e.to_string()),
                    };
                    outcomes.extend(results);
                }
                Ok(outcomes)
            }
            Err(e) => Ok(fail_unit(unit, &e.to_string())),
        }
    }

    /// 요청 간격을 지키며 재시도 정책으로 제공자를 호출합니다.
    async fn fetch(
        &self,
        descriptor: &DatasetDescriptor,
        symbols: &[String],
        window: CoverageWindow,
        state: &mut RunState,
    ) -> ingest_data::Result<Table> {
        let source: &dyn DataSource = &*self.source;

        state.pacer.wait().await;
        self.options
            .retry
            .run(descriptor.fetch.api_name(), || {
                descriptor
                    .fetch
                    .call(source, symbols, window.start, window.end)
            })
            .await
    }

    /// 조회 결과를 레코드로 바꿔 병합하고 심볼별 결과를 만듭니다.
    async fn apply(
        &self,
        descriptor: &DatasetDescriptor,
        unit: &FetchUnit,
        table: Table,
        state: &mut RunState,
    ) -> Result<Vec<(String, SymbolOutcome)>> {
        let window = unit.window;

        let records = match table.to_records(&descriptor.table, &self.options.date_formats) {
            Ok(records) => records,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => return Ok(fail_unit(unit, &e.to_string())),
        };

        let members: HashSet<&str> = unit.symbols.iter().map(String::as_str).collect();
        let fetched_rows = records.len();
        let records: Vec<Record> = records
            .into_iter()
            .filter(|r| members.contains(r.symbol.as_str()))
            .collect();
        if records.len() < fetched_rows {
            warn!(
                ignored = fetched_rows - records.len(),
                "조회 단위에 없는 심볼의 행 무시"
            );
        }

        let records = dedup_records(&descriptor.table.name, records)?;
        let rows_by_symbol = count_by_symbol(&records);

        if !records.is_empty() {
            let watermarks: Vec<Watermark> = unit
                .symbols
                .iter()
                .filter(|s| rows_by_symbol.contains_key(s.as_str()))
                .map(|s| Watermark::new(s.as_str(), window.end))
                .collect();

            let merged = self
                .store
                .merge(&descriptor.table, &records, &watermarks)
                .await?;
            debug!(rows = merged, watermarks = watermarks.len(), "병합 완료");
        }

        let mut outcomes = Vec::with_capacity(unit.symbols.len());
        for symbol in &unit.symbols {
            let outcome = match rows_by_symbol.get(symbol.as_str()) {
                Some(&rows) => {
                    info!(symbol = %symbol, rows = rows, window = %window, "수집 및 저장 완료");
                    SymbolOutcome::Fetched { rows }
                }
                None => {
                    let advanced = self.settle_empty(descriptor, symbol, window, state).await?;
                    SymbolOutcome::Empty { advanced }
                }
            };
            outcomes.push((symbol.clone(), outcome));
        }

        Ok(outcomes)
    }

    /// 빈 결과 처리. 윈도우에 개장일이 없으면 워터마크를 전진시킵니다.
    async fn settle_empty(
        &self,
        descriptor: &DatasetDescriptor,
        symbol: &str,
        window: CoverageWindow,
        state: &mut RunState,
    ) -> Result<bool> {
        match self.open_days(window, state).await? {
            Some(0) => {
                self.store
                    .advance_watermark(&descriptor.table, &Watermark::new(symbol, window.end))
                    .await?;
                debug!(symbol = symbol, window = %window, "개장일 없음, 워터마크 전진");
                Ok(true)
            }
            Some(open_days) => {
                debug!(
                    symbol = symbol,
                    window = %window,
                    open_days = open_days,
                    "데이터 없음, 워터마크 유지"
                );
                Ok(false)
            }
            None => {
                debug!(symbol = symbol, window = %window, "거래 달력 확인 불가, 워터마크 유지");
                Ok(false)
            }
        }
    }

    /// 윈도우의 개장일 수 (실행 중 캐시).
    async fn open_days(
        &self,
        window: CoverageWindow,
        state: &mut RunState,
    ) -> Result<Option<usize>> {
        if let Some(cached) = state.calendar.get(&window) {
            return Ok(*cached);
        }

        let source: &dyn DataSource = &*self.source;
        let exchange = self.options.calendar_exchange.as_str();

        state.pacer.wait().await;
        let result = self
            .options
            .retry
            .run("trade_cal", || source.trade_cal(window.start, window.end, exchange))
            .await;

        let open_days = match result {
            Ok(calendar) => count_open_days(&calendar),
            Err(e) if e.is_structural() => return Err(CollectorError::from(e)),
            Err(e) => {
                warn!(exchange = exchange, window = %window, error = %e, "거래 달력 조회 실패");
                None
            }
        };

        state.calendar.insert(window, open_days);
        Ok(open_days)
    }
}

/// 조회 단위의 모든 심볼을 실패로 기록합니다.
fn fail_unit(unit: &FetchUnit, error: &str) -> Vec<(String, SymbolOutcome)> {
    error!(
        symbols = %unit.symbols.join(","),
        window = %unit.window,
        error = error,
        "조회 실패"
    );
    unit.symbols
        .iter()
        .map(|symbol| {
            (
                symbol.clone(),
                SymbolOutcome::Failed {
                    error: error.to_string(),
                },
            )
        })
        .collect()
}
