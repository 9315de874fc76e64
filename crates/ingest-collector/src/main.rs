//! Market data ingestion CLI.

use clap::{Parser, Subcommand, ValueEnum};
use ingest_collector::config::{determine_date_range, stock_universe};
use ingest_collector::modules::{
    all_downloaders, sync_listing, DailyBasicDownloader, DailyDownloader,
    FinaIndicatorDownloader, IndexDailyDownloader, IndexWeightDownloader, TradeCalDownloader,
};
use ingest_collector::{DownloadContext, Downloader, SyncEngine, SyncOptions, Universe};
use ingest_core::{init_logging, Adjust, AppConfig, LogConfig, StoreKind};
use ingest_data::{create_data_source, CoverageStore, MemoryCoverageStore, PgCoverageStore};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ingest-collector")]
#[command(about = "Incremental market data collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로 (기본: config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// 수집 시작일 (YYYYMMDD)
    #[arg(long, global = true)]
    start: Option<String>,

    /// 수집 종료일 (YYYYMMDD, 기본: 오늘)
    #[arg(long, global = true)]
    end: Option<String>,

    /// 특정 종목만 수집 (쉼표로 구분, 예: "000001.SZ,600000.SH")
    #[arg(long, global = true)]
    symbols: Option<String>,

    /// 커버리지 저장소 (postgres, memory)
    #[arg(long, global = true)]
    store: Option<StoreKind>,
}

#[derive(Subcommand)]
enum Commands {
    /// 종목 일봉
    Daily {
        /// 가격 수정 방식 (hfq, none)
        #[arg(long, default_value = "hfq")]
        adjust: Adjust,
    },

    /// 종목 일별 지표
    DailyBasic,

    /// 재무 지표
    FinaIndicator,

    /// 지수 일봉
    IndexDaily,

    /// 지수 구성 종목 비중
    IndexWeight,

    /// 거래 달력
    TradeCal,

    /// 상장 종목 목록 동기화
    SyncListing,

    /// 전체 데이터셋 순차 실행 (거래 달력 → 일봉 → 지표 → 지수)
    RunAll {
        /// 일봉 가격 수정 방식
        #[arg(long, default_value = "hfq")]
        adjust: Adjust,
    },

    /// 조회 없이 심볼별 수집 윈도우 출력
    Plan {
        /// 데이터셋
        #[arg(long, value_enum, default_value = "daily")]
        dataset: Dataset,

        /// 일봉 가격 수정 방식
        #[arg(long, default_value = "hfq")]
        adjust: Adjust,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Dataset {
    Daily,
    DailyBasic,
    FinaIndicator,
    IndexDaily,
    IndexWeight,
    TradeCal,
}

fn downloader(dataset: Dataset, context: DownloadContext, adjust: Adjust) -> Box<dyn Downloader> {
    match dataset {
        Dataset::Daily => Box::new(DailyDownloader::new(context, adjust)),
        Dataset::DailyBasic => Box::new(DailyBasicDownloader::new(context)),
        Dataset::FinaIndicator => Box::new(FinaIndicatorDownloader::new(context)),
        Dataset::IndexDaily => Box::new(IndexDailyDownloader::new(context)),
        Dataset::IndexWeight => Box::new(IndexWeightDownloader::new(context)),
        Dataset::TradeCal => Box::new(TradeCalDownloader::new(context)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // 설정 로드 (파일 → 환경 변수 → CLI 인자)
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(Some(path.as_path()))?,
        None => AppConfig::load_default()?,
    };
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(store) = cli.store {
        config.store.kind = store;
    }

    // 로깅 초기화
    init_logging(LogConfig::from(&config.logging))
        .map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {}", e))?;

    tracing::info!("Market Ingest Collector 시작");

    // 저장소 연결
    let (store, pool): (Arc<dyn CoverageStore>, Option<sqlx::PgPool>) = match config.store.kind {
        StoreKind::Postgres => {
            let store = PgCoverageStore::connect(&config.database).await?;
            let pool = store.pool().clone();
            tracing::info!("데이터베이스 연결 성공");
            (Arc::new(store), Some(pool))
        }
        StoreKind::Memory => {
            tracing::warn!("메모리 저장소 사용: 종료 시 수집 결과가 사라집니다");
            (Arc::new(MemoryCoverageStore::new()), None)
        }
    };

    let source = create_data_source(&config.source, pool.clone())?;
    let engine = Arc::new(SyncEngine::new(
        source,
        store,
        SyncOptions::from_config(&config.sync),
    ));

    // Ctrl-C: 진행 중인 조회 단위를 마친 뒤 중단
    let cancel = engine.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("종료 신호 수신, 현재 조회 단위 완료 후 중단합니다");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let (start, end) =
        determine_date_range(&config.sync, cli.start.as_deref(), cli.end.as_deref())?;
    let mut context = DownloadContext {
        engine: Arc::clone(&engine),
        stocks: stock_universe(&config.sync, cli.symbols.as_deref()),
        indexes: Universe::Fixed(config.sync.index_codes.clone()),
        exchanges: config.sync.exchanges.clone(),
        start,
        end,
        tables: config.source.tables.clone(),
    };

    tracing::info!(start = %start, end = %end, "수집 범위 설정 완료");

    // 명령 실행
    match cli.command {
        Commands::Daily { adjust } => {
            downloader(Dataset::Daily, context, adjust).download().await?;
        }
        Commands::DailyBasic => {
            downloader(Dataset::DailyBasic, context, Adjust::default())
                .download()
                .await?;
        }
        Commands::FinaIndicator => {
            downloader(Dataset::FinaIndicator, context, Adjust::default())
                .download()
                .await?;
        }
        Commands::IndexDaily => {
            downloader(Dataset::IndexDaily, context, Adjust::default())
                .download()
                .await?;
        }
        Commands::IndexWeight => {
            downloader(Dataset::IndexWeight, context, Adjust::default())
                .download()
                .await?;
        }
        Commands::TradeCal => {
            downloader(Dataset::TradeCal, context, Adjust::default())
                .download()
                .await?;
        }
        Commands::SyncListing => {
            let summary = sync_listing(
                engine.source().as_ref(),
                engine.store().as_ref(),
                &config.source.tables.stock_basic,
                config.sync.listing_exchange.as_deref(),
                &config.sync.date_formats(),
            )
            .await?;
            summary.log_summary();
        }
        Commands::RunAll { adjust } => {
            tracing::info!("=== 전체 워크플로우 시작 ===");

            // 상장 종목 조회는 한 번만
            let stocks = context.stocks.resolve(engine.source().as_ref()).await?;
            context.stocks = Universe::Fixed(stocks);

            let downloaders = all_downloaders(&context, adjust);
            for downloader in &downloaders {
                downloader.descriptor().validate()?;
            }
            let steps = downloaders.len();
            let mut failed = 0usize;

            for (idx, downloader) in downloaders.iter().enumerate() {
                if engine.cancel_flag().load(Ordering::SeqCst) {
                    tracing::warn!("중단 요청으로 남은 데이터셋을 건너뜁니다");
                    break;
                }
                tracing::info!(
                    "Step {}/{}: {}",
                    idx + 1,
                    steps,
                    downloader.get_table_name()
                );
                let summary = downloader.download().await?;
                failed += summary.failed;
            }

            tracing::info!(failed = failed, "=== 전체 워크플로우 완료 ===");
        }
        Commands::Plan { dataset, adjust } => {
            let downloader = downloader(dataset, context, adjust);
            let plans = downloader.plan().await?;
            let pending = plans.iter().filter(|p| p.window.is_some()).count();

            println!(
                "{} ({}): {} symbols, {} pending",
                downloader.get_table_name(),
                downloader.get_date_column_name(),
                plans.len(),
                pending
            );
            for plan in plans {
                match plan.window {
                    Some(window) => println!("{}\t{}", plan.symbol, window),
                    None => println!("{}\tup-to-date", plan.symbol),
                }
            }
        }
    }

    if let Some(pool) = pool {
        pool.close().await;
    }
    tracing::info!("Market Ingest Collector 종료");

    Ok(())
}
