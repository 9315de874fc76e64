//! SyncEngine 통합 테스트.
//!
//! 스크립트된 데이터 소스와 메모리 저장소로 다음을 검증합니다:
//! - 윈도우 계산과 재실행 시 이어받기
//! - 조회 단위 구성 (단일/다중 심볼)
//! - 재시도와 실패 격리
//! - 빈 결과의 워터마크 처리
//! - 병합 충돌, 저장소 오류 시 중단

use async_trait::async_trait;
use chrono::NaiveDate;
use ingest_collector::engine::{Backoff, DatasetDescriptor, FetchFn, RetryPolicy, SyncEngine, SyncOptions};
use ingest_collector::modules::{DailyBasicDownloader, TradeCalDownloader};
use ingest_collector::{CollectorError, DownloadContext, Downloader, SymbolOutcome, Universe};
use ingest_core::{Adjust, CoreError, DateFormats, Record, StoreTables, Table, TableSpec};
use ingest_data::{
    CoverageStore, DataError, DataSource, MemoryCoverageStore, Watermark,
};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// 테스트 헬퍼
// ============================================================================

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, day).unwrap()
}

fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// 데이터 소스 호출 기록.
#[derive(Debug, Clone, PartialEq)]
struct Call {
    api: &'static str,
    symbols: Vec<String>,
    start: NaiveDate,
    end: NaiveDate,
}

/// 심볼별 거래일 데이터와 실패 시나리오를 가진 데이터 소스.
#[derive(Default)]
struct ScriptedSource {
    bars: BTreeMap<String, Vec<NaiveDate>>,
    failures: Mutex<HashMap<String, VecDeque<DataError>>>,
    bad_dates: HashSet<String>,
    divergent: HashSet<String>,
    /// `None`이면 거래 달력 조회 실패
    open_days: Option<BTreeSet<NaiveDate>>,
    /// 거래 달력에서 `is_open` 컬럼을 뺌
    trimmed_calendar: bool,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedSource {
    fn new() -> Self {
        Self {
            open_days: Some(BTreeSet::new()),
            ..Default::default()
        }
    }

    fn with_bars(mut self, symbol: &str, days: &[u32]) -> Self {
        self.bars
            .insert(symbol.to_string(), days.iter().map(|&day| d(day)).collect());
        self
    }

    fn failing(self, symbol: &str, times: usize, make: fn() -> DataError) -> Self {
        self.failures
            .lock()
            .unwrap()
            .entry(symbol.to_string())
            .or_default()
            .extend((0..times).map(|_| make()));
        self
    }

    fn with_bad_dates(mut self, symbol: &str) -> Self {
        self.bad_dates.insert(symbol.to_string());
        self
    }

    fn with_divergent_rows(mut self, symbol: &str) -> Self {
        self.divergent.insert(symbol.to_string());
        self
    }

    fn with_open_days(mut self, days: &[u32]) -> Self {
        self.open_days = Some(days.iter().map(|&day| d(day)).collect());
        self
    }

    fn with_trimmed_calendar(mut self) -> Self {
        self.trimmed_calendar = true;
        self
    }

    fn without_calendar(mut self) -> Self {
        self.open_days = None;
        self
    }

    fn calls(&self, api: &str) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.api == api)
            .cloned()
            .collect()
    }

    fn calls_for(&self, api: &str, symbol: &str) -> usize {
        self.calls(api)
            .iter()
            .filter(|c| c.symbols.iter().any(|s| s == symbol))
            .count()
    }

    fn log(&self, api: &'static str, symbols: &[String], start: NaiveDate, end: NaiveDate) {
        self.calls.lock().unwrap().push(Call {
            api,
            symbols: symbols.to_vec(),
            start,
            end,
        });
    }

    fn bars_table(
        &self,
        api: &'static str,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> ingest_data::Result<Table> {
        self.log(api, symbols, start, end);

        {
            let mut failures = self.failures.lock().unwrap();
            for symbol in symbols {
                if let Some(err) = failures.get_mut(symbol).and_then(VecDeque::pop_front) {
                    return Err(err);
                }
            }
        }

        let mut items = Vec::new();
        for symbol in symbols {
            let days = self.bars.get(symbol).into_iter().flatten();
            for date in days.filter(|date| start <= **date && **date <= end) {
                let trade_date = if self.bad_dates.contains(symbol) {
                    date.format("%Y/%m/%d").to_string()
                } else {
                    date.format("%Y%m%d").to_string()
                };
                items.push(vec![json!(symbol), json!(trade_date), json!(10.0)]);
                if self.divergent.contains(symbol) {
                    items.push(vec![json!(symbol), json!(trade_date), json!(11.0)]);
                }
            }
        }

        Ok(Table::new(
            vec!["ts_code".into(), "trade_date".into(), "close".into()],
            items,
        ))
    }
}

#[async_trait]
impl DataSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn daily(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
        _adjust: Adjust,
    ) -> ingest_data::Result<Table> {
        self.bars_table("daily", symbols, start, end)
    }

    async fn daily_basic(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> ingest_data::Result<Table> {
        self.bars_table("daily_basic", symbols, start, end)
    }

    async fn fina_indicator(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> ingest_data::Result<Table> {
        self.log("fina_indicator", symbols, start, end);
        Ok(Table::empty())
    }

    async fn index_daily(
        &self,
        codes: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> ingest_data::Result<Table> {
        self.bars_table("index_daily", codes, start, end)
    }

    async fn index_weight(
        &self,
        codes: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> ingest_data::Result<Table> {
        self.log("index_weight", codes, start, end);
        Ok(Table::empty())
    }

    async fn trade_cal(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        exchange: &str,
    ) -> ingest_data::Result<Table> {
        self.log("trade_cal", &[exchange.to_string()], start, end);

        let Some(open_days) = &self.open_days else {
            return Err(DataError::permanent("calendar unavailable"));
        };

        if self.trimmed_calendar {
            let items = start
                .iter_days()
                .take_while(|date| *date <= end)
                .map(|date| vec![json!(exchange), json!(date.format("%Y%m%d").to_string())])
                .collect();
            return Ok(Table::new(vec!["exchange".into(), "cal_date".into()], items));
        }

        let items = start
            .iter_days()
            .take_while(|date| *date <= end)
            .map(|date| {
                let is_open = if open_days.contains(&date) { 1 } else { 0 };
                vec![
                    json!(exchange),
                    json!(date.format("%Y%m%d").to_string()),
                    json!(is_open),
                ]
            })
            .collect();

        Ok(Table::new(
            vec!["exchange".into(), "cal_date".into(), "is_open".into()],
            items,
        ))
    }

    async fn stock_basic(&self, _exchange: Option<&str>) -> ingest_data::Result<Table> {
        let items = self.bars.keys().map(|s| vec![json!(s)]).collect();
        Ok(Table::new(vec!["ts_code".into()], items))
    }
}

/// 행이 있는 병합을 항상 거부하는 저장소.
#[derive(Default)]
struct RejectingStore {
    inner: MemoryCoverageStore,
}

#[async_trait]
impl CoverageStore for RejectingStore {
    fn name(&self) -> &'static str {
        "rejecting"
    }

    async fn ensure_table(&self, spec: &TableSpec) -> ingest_data::Result<()> {
        self.inner.ensure_table(spec).await
    }

    async fn latest_covered(
        &self,
        spec: &TableSpec,
        symbol: &str,
    ) -> ingest_data::Result<Option<NaiveDate>> {
        self.inner.latest_covered(spec, symbol).await
    }

    async fn merge(
        &self,
        spec: &TableSpec,
        records: &[Record],
        watermarks: &[Watermark],
    ) -> ingest_data::Result<usize> {
        if !records.is_empty() {
            return Err(DataError::QueryError("could not extend file".into()));
        }
        self.inner.merge(spec, records, watermarks).await
    }
}

fn options() -> SyncOptions {
    SyncOptions {
        retry: RetryPolicy {
            max_retries: 2,
            backoff: Backoff::Fixed(Duration::from_millis(1)),
            rate_limit_delay: Duration::from_millis(1),
        },
        request_delay: Duration::ZERO,
        calendar_exchange: "SSE".to_string(),
        max_batch_size: 100,
        date_formats: DateFormats::default(),
    }
}

fn daily_descriptor() -> DatasetDescriptor {
    DatasetDescriptor::new(
        FetchFn::Daily { adjust: Adjust::Hfq },
        TableSpec::new("daily_hfq", "ts_code", "trade_date"),
    )
}

fn basic_descriptor() -> DatasetDescriptor {
    DatasetDescriptor::new(
        FetchFn::DailyBasic,
        TableSpec::new("daily_basic", "ts_code", "trade_date"),
    )
    .with_multistocks(true)
}

fn engine_with(
    source: &Arc<ScriptedSource>,
    store: Arc<dyn CoverageStore>,
    options: SyncOptions,
) -> SyncEngine {
    SyncEngine::new(source.clone() as Arc<dyn DataSource>, store, options)
}

fn engine(source: &Arc<ScriptedSource>, store: &Arc<MemoryCoverageStore>) -> SyncEngine {
    engine_with(source, store.clone() as Arc<dyn CoverageStore>, options())
}

// ============================================================================
// 기본 시나리오
// ============================================================================

#[tokio::test]
async fn test_fetch_empty_and_failure_then_resume() {
    let source = Arc::new(
        ScriptedSource::new()
            .with_bars("A", &[2, 3, 6, 7, 8])
            .failing("C", 10, || DataError::permanent("unknown instrument")),
    );
    let store = Arc::new(MemoryCoverageStore::new());
    let engine = engine(&source, &store);
    let descriptor = daily_descriptor();
    let universe = symbols(&["A", "B", "C"]);

    let summary = engine
        .synchronize(&descriptor, &universe, d(1), d(10))
        .await
        .unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.empty, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.rows, 5);
    assert_eq!(summary.outcome("A"), Some(&SymbolOutcome::Fetched { rows: 5 }));
    assert_eq!(summary.outcome("B"), Some(&SymbolOutcome::Empty { advanced: true }));
    assert!(matches!(summary.outcome("C"), Some(SymbolOutcome::Failed { .. })));

    assert_eq!(store.row_count("daily_hfq").await, 5);
    assert_eq!(store.watermark("daily_hfq", "A").await, Some(d(10)));
    assert_eq!(store.watermark("daily_hfq", "B").await, Some(d(10)));
    assert_eq!(store.watermark("daily_hfq", "C").await, None);

    // 재실행: A, B는 최신, C는 다시 시도
    let summary = engine
        .synchronize(&descriptor, &universe, d(1), d(10))
        .await
        .unwrap();

    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.fetched, 0);
    assert_eq!(summary.outcome("A"), Some(&SymbolOutcome::UpToDate));
    assert_eq!(summary.failed_symbols(), vec!["C"]);

    assert_eq!(source.calls_for("daily", "A"), 1);
    assert_eq!(source.calls_for("daily", "C"), 2);
    assert_eq!(store.row_count("daily_hfq").await, 5);
}

#[tokio::test]
async fn test_reports_follow_input_order() {
    let source = Arc::new(ScriptedSource::new().with_bars("A", &[2]).with_bars("B", &[2]));
    let store = Arc::new(MemoryCoverageStore::new());
    let engine = engine(&source, &store);

    let summary = engine
        .synchronize(&daily_descriptor(), &symbols(&["B", "A", "B"]), d(1), d(10))
        .await
        .unwrap();

    let order: Vec<&str> = summary.reports.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(order, vec!["B", "A"]);
    assert_eq!(source.calls("daily").len(), 2);
}

#[tokio::test]
async fn test_incremental_runs_never_duplicate_rows() {
    let source = Arc::new(ScriptedSource::new().with_bars("A", &[2, 3, 4, 5, 6, 7, 8, 9]));
    let store = Arc::new(MemoryCoverageStore::new());
    let engine = engine(&source, &store);
    let descriptor = daily_descriptor();
    let universe = symbols(&["A"]);

    engine
        .synchronize(&descriptor, &universe, d(1), d(5))
        .await
        .unwrap();
    assert_eq!(store.row_count("daily_hfq").await, 4);

    let summary = engine
        .synchronize(&descriptor, &universe, d(1), d(10))
        .await
        .unwrap();
    assert_eq!(summary.rows, 4);
    assert_eq!(store.row_count("daily_hfq").await, 8);

    let calls = source.calls("daily");
    assert_eq!(calls.len(), 2);
    assert_eq!((calls[1].start, calls[1].end), (d(6), d(10)));

    // 같은 구간 재실행은 조회 없이 끝남
    let summary = engine
        .synchronize(&descriptor, &universe, d(1), d(10))
        .await
        .unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(source.calls("daily").len(), 2);
    assert_eq!(store.row_count("daily_hfq").await, 8);

    let keys: HashSet<_> = store.rows("daily_hfq").await.iter().map(Record::key).collect();
    assert_eq!(keys.len(), 8);
}

#[tokio::test]
async fn test_window_starts_after_existing_coverage() {
    let source = Arc::new(ScriptedSource::new().with_bars("A", &[7]).with_bars("B", &[3]));
    let store = Arc::new(MemoryCoverageStore::new());
    let descriptor = daily_descriptor();

    store.ensure_table(&descriptor.table).await.unwrap();
    store
        .advance_watermark(&descriptor.table, &Watermark::new("A", d(5)))
        .await
        .unwrap();
    // 목표 구간보다 앞선 커버리지
    store
        .advance_watermark(
            &descriptor.table,
            &Watermark::new("B", NaiveDate::from_ymd_opt(2019, 12, 20).unwrap()),
        )
        .await
        .unwrap();

    let engine = engine(&source, &store);
    let plans = engine
        .plan(&descriptor, &symbols(&["A", "B"]), d(1), d(10))
        .await
        .unwrap();
    assert_eq!(plans[0].window.map(|w| w.start), Some(d(6)));
    assert_eq!(plans[1].window.map(|w| w.start), Some(d(1)));
    assert!(source.calls("daily").is_empty(), "plan은 조회하지 않음");

    engine
        .synchronize(&descriptor, &symbols(&["A", "B"]), d(1), d(10))
        .await
        .unwrap();
    let calls = source.calls("daily");
    assert_eq!(calls[0].start, d(6));
    assert_eq!(calls[1].start, d(1));
}

#[tokio::test]
async fn test_reversed_range_is_rejected() {
    let source = Arc::new(ScriptedSource::new());
    let store = Arc::new(MemoryCoverageStore::new());
    let engine = engine(&source, &store);

    let err = engine
        .synchronize(&daily_descriptor(), &symbols(&["A"]), d(10), d(1))
        .await
        .unwrap_err();
    assert!(matches!(err, CollectorError::Core(CoreError::InvalidInput(_))));
}

#[tokio::test]
async fn test_forward_adjusted_daily_is_rejected() {
    let source = Arc::new(ScriptedSource::new().with_bars("A", &[2]));
    let store = Arc::new(MemoryCoverageStore::new());
    let engine = engine(&source, &store);
    let descriptor = DatasetDescriptor::new(
        FetchFn::Daily { adjust: Adjust::Qfq },
        TableSpec::new("daily_qfq", "ts_code", "trade_date"),
    );

    let err = engine
        .synchronize(&descriptor, &symbols(&["A"]), d(1), d(10))
        .await
        .unwrap_err();

    assert!(matches!(err, CollectorError::Core(CoreError::InvalidDescriptor(_))));
    assert!(source.calls("daily").is_empty());
}

// ============================================================================
// 조회 단위
// ============================================================================

#[tokio::test]
async fn test_single_symbol_dataset_fetches_one_symbol_per_call() {
    let source = Arc::new(
        ScriptedSource::new()
            .with_bars("A", &[2])
            .with_bars("B", &[2])
            .with_bars("C", &[2]),
    );
    let store = Arc::new(MemoryCoverageStore::new());
    let engine = engine(&source, &store);

    engine
        .synchronize(&daily_descriptor(), &symbols(&["A", "B", "C"]), d(1), d(10))
        .await
        .unwrap();

    let calls = source.calls("daily");
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|c| c.symbols.len() == 1));
}

#[tokio::test]
async fn test_multistocks_groups_symbols_with_same_window() {
    let source = Arc::new(
        ScriptedSource::new()
            .with_bars("A", &[2, 6])
            .with_bars("B", &[2, 6])
            .with_bars("C", &[6]),
    );
    let store = Arc::new(MemoryCoverageStore::new());
    let descriptor = basic_descriptor();

    store.ensure_table(&descriptor.table).await.unwrap();
    store
        .advance_watermark(&descriptor.table, &Watermark::new("C", d(4)))
        .await
        .unwrap();

    let engine = engine(&source, &store);
    let summary = engine
        .synchronize(&descriptor, &symbols(&["A", "C", "B"]), d(1), d(10))
        .await
        .unwrap();

    let calls = source.calls("daily_basic");
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].symbols, symbols(&["A", "B"]));
    assert_eq!(calls[0].start, d(1));
    assert_eq!(calls[1].symbols, symbols(&["C"]));
    assert_eq!(calls[1].start, d(5));

    assert_eq!(summary.outcome("A"), Some(&SymbolOutcome::Fetched { rows: 2 }));
    assert_eq!(summary.outcome("C"), Some(&SymbolOutcome::Fetched { rows: 1 }));
    assert_eq!(store.row_count("daily_basic").await, 5);
}

#[tokio::test]
async fn test_multistocks_respects_batch_size() {
    let source = Arc::new(
        ScriptedSource::new()
            .with_bars("A", &[2])
            .with_bars("B", &[2])
            .with_bars("C", &[2]),
    );
    let store = Arc::new(MemoryCoverageStore::new());
    let engine = engine_with(
        &source,
        store.clone(),
        SyncOptions {
            max_batch_size: 2,
            ..options()
        },
    );

    engine
        .synchronize(&basic_descriptor(), &symbols(&["A", "B", "C"]), d(1), d(10))
        .await
        .unwrap();

    let sizes: Vec<usize> = source
        .calls("daily_basic")
        .iter()
        .map(|c| c.symbols.len())
        .collect();
    assert_eq!(sizes, vec![2, 1]);
}

#[tokio::test]
async fn test_batch_failure_isolates_failing_symbol() {
    let source = Arc::new(
        ScriptedSource::new()
            .with_bars("A", &[2, 3])
            .with_bars("C", &[2])
            .failing("B", 10, || DataError::permanent("no such instrument")),
    );
    let store = Arc::new(MemoryCoverageStore::new());
    let engine = engine(&source, &store);
    let descriptor = basic_descriptor();
    let universe = symbols(&["B", "A", "C"]);

    for _ in 0..2 {
        let summary = engine
            .synchronize(&descriptor, &universe, d(1), d(10))
            .await
            .unwrap();
        assert!(matches!(summary.outcome("B"), Some(SymbolOutcome::Failed { .. })));
        assert_eq!(summary.failed_symbols(), vec!["B"]);
    }

    assert_eq!(store.row_count("daily_basic").await, 3);
    assert_eq!(store.watermark("daily_basic", "A").await, Some(d(10)));
    assert_eq!(store.watermark("daily_basic", "C").await, Some(d(10)));
    assert_eq!(store.watermark("daily_basic", "B").await, None);

    // 첫 실행: 배치 1회 + 종목별 3회, 두 번째 실행: B만 남아 1회
    let calls = source.calls("daily_basic");
    assert_eq!(calls.len(), 5);
    assert_eq!(calls[0].symbols, symbols(&["B", "A", "C"]));
    assert!(calls[1..].iter().all(|c| c.symbols.len() == 1));
}

#[tokio::test]
async fn test_batch_transient_failure_is_not_split() {
    let source = Arc::new(
        ScriptedSource::new()
            .with_bars("A", &[2])
            .with_bars("B", &[2])
            .failing("B", 5, || DataError::transient("connection reset")),
    );
    let store = Arc::new(MemoryCoverageStore::new());
    let engine = engine(&source, &store);

    let summary = engine
        .synchronize(&basic_descriptor(), &symbols(&["A", "B"]), d(1), d(10))
        .await
        .unwrap();

    assert_eq!(summary.failed, 2);
    assert_eq!(source.calls("daily_basic").len(), 3);
    assert!(source.calls("daily_basic").iter().all(|c| c.symbols.len() == 2));
}

// ============================================================================
// 재시도와 실패 격리
// ============================================================================

#[tokio::test]
async fn test_transient_failure_retried_up_to_bound() {
    let source = Arc::new(
        ScriptedSource::new()
            .with_bars("A", &[2])
            .with_bars("C", &[2])
            .failing("C", 5, || DataError::transient("connection reset")),
    );
    let store = Arc::new(MemoryCoverageStore::new());
    let engine = engine(&source, &store);

    let summary = engine
        .synchronize(&daily_descriptor(), &symbols(&["C", "A"]), d(1), d(10))
        .await
        .unwrap();

    // 최초 1회 + 재시도 2회
    assert_eq!(source.calls_for("daily", "C"), 3);
    assert!(matches!(summary.outcome("C"), Some(SymbolOutcome::Failed { .. })));
    assert_eq!(summary.outcome("A"), Some(&SymbolOutcome::Fetched { rows: 1 }));
    assert_eq!(store.watermark("daily_hfq", "C").await, None);
}

#[tokio::test]
async fn test_transient_failure_recovers() {
    let source = Arc::new(
        ScriptedSource::new()
            .with_bars("A", &[2, 3])
            .failing("A", 1, || DataError::RateLimited("40203".into())),
    );
    let store = Arc::new(MemoryCoverageStore::new());
    let engine = engine(&source, &store);

    let summary = engine
        .synchronize(&daily_descriptor(), &symbols(&["A"]), d(1), d(10))
        .await
        .unwrap();

    assert_eq!(source.calls_for("daily", "A"), 2);
    assert_eq!(summary.outcome("A"), Some(&SymbolOutcome::Fetched { rows: 2 }));
}

#[tokio::test]
async fn test_permanent_failure_not_retried() {
    let source = Arc::new(
        ScriptedSource::new().failing("A", 5, || DataError::permanent("unknown instrument")),
    );
    let store = Arc::new(MemoryCoverageStore::new());
    let engine = engine(&source, &store);

    let summary = engine
        .synchronize(&daily_descriptor(), &symbols(&["A"]), d(1), d(10))
        .await
        .unwrap();

    assert_eq!(source.calls_for("daily", "A"), 1);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn test_unresolved_date_format_is_symbol_failure() {
    let source = Arc::new(
        ScriptedSource::new()
            .with_bars("A", &[2])
            .with_bars("B", &[2])
            .with_bad_dates("B"),
    );
    let store = Arc::new(MemoryCoverageStore::new());
    let engine = engine(&source, &store);

    let summary = engine
        .synchronize(&daily_descriptor(), &symbols(&["A", "B"]), d(1), d(10))
        .await
        .unwrap();

    assert_eq!(summary.outcome("A"), Some(&SymbolOutcome::Fetched { rows: 1 }));
    assert!(matches!(summary.outcome("B"), Some(SymbolOutcome::Failed { .. })));
    assert_eq!(store.watermark("daily_hfq", "B").await, None);
}

#[tokio::test]
async fn test_credential_error_aborts_run() {
    let source = Arc::new(
        ScriptedSource::new()
            .with_bars("B", &[2])
            .failing("A", 1, || DataError::ConfigError("token invalid".into())),
    );
    let store = Arc::new(MemoryCoverageStore::new());
    let engine = engine(&source, &store);

    let err = engine
        .synchronize(&daily_descriptor(), &symbols(&["A", "B"]), d(1), d(10))
        .await
        .unwrap_err();

    assert!(matches!(err, CollectorError::Data(DataError::ConfigError(_))));
    assert_eq!(source.calls_for("daily", "B"), 0);
}

#[tokio::test]
async fn test_divergent_duplicates_abort_run() {
    let source = Arc::new(ScriptedSource::new().with_bars("A", &[2, 3]).with_divergent_rows("A"));
    let store = Arc::new(MemoryCoverageStore::new());
    let engine = engine(&source, &store);

    let err = engine
        .synchronize(&daily_descriptor(), &symbols(&["A"]), d(1), d(10))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CollectorError::Core(CoreError::MergeConflict { .. })
    ));
    assert_eq!(store.row_count("daily_hfq").await, 0);
    assert_eq!(store.watermark("daily_hfq", "A").await, None);
}

#[tokio::test]
async fn test_failed_merge_leaves_watermark() {
    let source = Arc::new(ScriptedSource::new().with_bars("A", &[2, 3]));
    let store = Arc::new(RejectingStore::default());
    let engine = engine_with(&source, store.clone(), options());

    let err = engine
        .synchronize(&daily_descriptor(), &symbols(&["A"]), d(1), d(10))
        .await
        .unwrap_err();

    assert!(matches!(err, CollectorError::Data(DataError::QueryError(_))));
    assert_eq!(store.inner.watermark("daily_hfq", "A").await, None);
    assert_eq!(store.inner.row_count("daily_hfq").await, 0);
}

// ============================================================================
// 빈 결과
// ============================================================================

#[tokio::test]
async fn test_empty_with_open_days_keeps_watermark() {
    let source = Arc::new(ScriptedSource::new().with_open_days(&[2, 3]));
    let store = Arc::new(MemoryCoverageStore::new());
    let engine = engine(&source, &store);
    let descriptor = daily_descriptor();

    let summary = engine
        .synchronize(&descriptor, &symbols(&["B"]), d(1), d(10))
        .await
        .unwrap();
    assert_eq!(summary.outcome("B"), Some(&SymbolOutcome::Empty { advanced: false }));
    assert_eq!(store.watermark("daily_hfq", "B").await, None);

    // 다음 실행에서 다시 조회
    engine
        .synchronize(&descriptor, &symbols(&["B"]), d(1), d(10))
        .await
        .unwrap();
    assert_eq!(source.calls_for("daily", "B"), 2);
}

#[tokio::test]
async fn test_empty_without_calendar_keeps_watermark() {
    let source = Arc::new(ScriptedSource::new().without_calendar());
    let store = Arc::new(MemoryCoverageStore::new());
    let engine = engine(&source, &store);

    let summary = engine
        .synchronize(&daily_descriptor(), &symbols(&["B"]), d(1), d(10))
        .await
        .unwrap();

    assert_eq!(summary.outcome("B"), Some(&SymbolOutcome::Empty { advanced: false }));
    assert_eq!(store.watermark("daily_hfq", "B").await, None);
}

#[tokio::test]
async fn test_calendar_without_open_flag_keeps_watermark() {
    let source = Arc::new(ScriptedSource::new().with_trimmed_calendar());
    let store = Arc::new(MemoryCoverageStore::new());
    let engine = engine(&source, &store);

    let summary = engine
        .synchronize(&daily_descriptor(), &symbols(&["B"]), d(1), d(10))
        .await
        .unwrap();

    assert_eq!(summary.outcome("B"), Some(&SymbolOutcome::Empty { advanced: false }));
    assert_eq!(store.watermark("daily_hfq", "B").await, None);
}

#[tokio::test]
async fn test_calendar_checked_once_per_window() {
    let source = Arc::new(ScriptedSource::new());
    let store = Arc::new(MemoryCoverageStore::new());
    let engine = engine(&source, &store);

    let summary = engine
        .synchronize(&daily_descriptor(), &symbols(&["B", "C", "D"]), d(1), d(10))
        .await
        .unwrap();

    assert_eq!(summary.empty, 3);
    let calendar_calls = source.calls("trade_cal");
    assert_eq!(calendar_calls.len(), 1);
    assert_eq!(calendar_calls[0].symbols, symbols(&["SSE"]));
}

// ============================================================================
// 중단과 드라이버
// ============================================================================

#[tokio::test]
async fn test_cancelled_run_skips_remaining_units() {
    let source = Arc::new(ScriptedSource::new().with_bars("A", &[2]));
    let store = Arc::new(MemoryCoverageStore::new());
    let engine = engine(&source, &store);

    engine.cancel_flag().store(true, Ordering::SeqCst);
    let summary = engine
        .synchronize(&daily_descriptor(), &symbols(&["A"]), d(1), d(10))
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert!(summary.reports.is_empty());
    assert!(source.calls("daily").is_empty());
    assert_eq!(store.watermark("daily_hfq", "A").await, None);
}

fn context(engine: SyncEngine, stocks: Universe) -> DownloadContext {
    DownloadContext {
        engine: Arc::new(engine),
        stocks,
        indexes: Universe::Fixed(symbols(&["000300.SH"])),
        exchanges: symbols(&["SSE"]),
        start: d(1),
        end: d(10),
        tables: StoreTables::default(),
    }
}

#[tokio::test]
async fn test_daily_basic_downloader_uses_listed_universe() {
    let source = Arc::new(
        ScriptedSource::new()
            .with_bars("000001.SZ", &[2, 3])
            .with_bars("600000.SH", &[2, 3]),
    );
    let store = Arc::new(MemoryCoverageStore::new());
    let downloader = DailyBasicDownloader::new(context(
        engine(&source, &store),
        Universe::Listed { exchange: None },
    ));

    assert_eq!(downloader.get_table_name(), "daily_basic");
    assert_eq!(downloader.get_date_column_name(), "trade_date");

    let summary = downloader.download().await.unwrap();
    assert_eq!(summary.dataset, "daily_basic");
    assert_eq!(summary.fetched, 2);

    let calls = source.calls("daily_basic");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].symbols, symbols(&["000001.SZ", "600000.SH"]));
}

#[tokio::test]
async fn test_trade_cal_downloader_stores_calendar() {
    let source = Arc::new(ScriptedSource::new().with_open_days(&[2, 3, 6]));
    let store = Arc::new(MemoryCoverageStore::new());
    let downloader = TradeCalDownloader::new(context(
        engine(&source, &store),
        Universe::Fixed(Vec::new()),
    ));

    let summary = downloader.download().await.unwrap();
    assert_eq!(summary.outcome("SSE"), Some(&SymbolOutcome::Fetched { rows: 10 }));
    assert_eq!(store.row_count("trade_cal").await, 10);
    assert_eq!(store.watermark("trade_cal", "SSE").await, Some(d(10)));
}
