//! 백테스팅 엔진 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 합성 데이터로 전략 백테스트 (시드 고정 → 재현 가능)
//! quantlab backtest -s strategies/sma_cross.json --symbol BTCUSDT --seed 42 --minutes 43200
//!
//! # Postgres 캐시의 실데이터로 백테스트
//! quantlab backtest -s strategies/sma_cross.json --symbol BTCUSDT \
//!     --db-url postgres://localhost/quantlab -f 2024-01-01 -t 2024-03-31
//!
//! # 1분봉을 캐시에 적재 (누락 구간만 다운로드)
//! quantlab fetch --symbol BTCUSDT -f 2024-01-01 -t 2024-01-31 \
//!     --db-url postgres://localhost/quantlab
//!
//! # 합성 1분봉을 JSON으로 출력
//! quantlab synth --seed 42 --minutes 2880 -o btc_1m.json
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::info;

use quantlab_analytics::{BacktestConfig, BacktestEngine};
use quantlab_core::{Candle, DownloadEvent, Timeframe};
use quantlab_data::{
    aggregate_candles, CachedCandleProvider, InMemoryCandleStore, PostgresCandleStore,
    SyntheticExchange, SyntheticMarketGenerator,
};
use quantlab_indicators::IndicatorRegistry;
use quantlab_strategy::{StrategyExecutor, StrategySchema};

#[derive(Parser)]
#[command(name = "quantlab")]
#[command(about = "캔들 기반 선언적 전략 백테스팅 엔진", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 전략 백테스트 실행
    Backtest {
        /// 전략 스키마 JSON 파일
        #[arg(short, long)]
        strategy: String,

        /// 심볼
        #[arg(long, default_value = "BTCUSDT")]
        symbol: String,

        /// 시작 날짜 (YYYY-MM-DD, 생략 시 데이터 처음)
        #[arg(short = 'f', long)]
        from: Option<String>,

        /// 종료 날짜 (YYYY-MM-DD, 생략 시 데이터 끝)
        #[arg(short = 't', long)]
        to: Option<String>,

        /// 초기 자본
        #[arg(long, default_value = "10000")]
        capital: Decimal,

        /// 수수료율 (%, 체결당)
        #[arg(long, default_value = "0.1")]
        commission: Decimal,

        /// 슬리피지 (%, 체결당)
        #[arg(long, default_value = "0.05")]
        slippage: Decimal,

        /// Postgres 캐시 URL (생략 시 합성 데이터)
        #[arg(long)]
        db_url: Option<String>,

        /// 합성 데이터 시드
        #[arg(long, default_value = "42")]
        seed: u32,

        /// 합성 데이터 길이 (1분봉 수)
        #[arg(long, default_value = "43200")]
        minutes: usize,
    },

    /// 1분봉을 캐시에 적재 (누락 구간만 다운로드)
    Fetch {
        /// 심볼
        #[arg(long)]
        symbol: String,

        /// 시작 날짜 (YYYY-MM-DD)
        #[arg(short = 'f', long)]
        from: String,

        /// 종료 날짜 (YYYY-MM-DD)
        #[arg(short = 't', long)]
        to: String,

        /// Postgres 캐시 URL (생략 시 인메모리, 시연용)
        #[arg(long)]
        db_url: Option<String>,

        /// 데이터 소스 시드 (거래소 SDK는 범위 밖, 합성 거래소 사용)
        #[arg(long, default_value = "42")]
        seed: u32,
    },

    /// 합성 1분봉 생성
    Synth {
        /// 시드
        #[arg(long, default_value = "42")]
        seed: u32,

        /// 1분봉 수
        #[arg(long, default_value = "1440")]
        minutes: usize,

        /// 시작 가격
        #[arg(long, default_value = "50000")]
        price: f64,

        /// 출력 파일 (생략 시 표준 출력)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Backtest {
            strategy,
            symbol,
            from,
            to,
            capital,
            commission,
            slippage,
            db_url,
            seed,
            minutes,
        } => {
            run_backtest(
                &strategy, &symbol, from, to, capital, commission, slippage, db_url, seed,
                minutes,
            )
            .await
        }
        Commands::Fetch {
            symbol,
            from,
            to,
            db_url,
            seed,
        } => run_fetch(&symbol, &from, &to, db_url, seed).await,
        Commands::Synth {
            seed,
            minutes,
            price,
            output,
        } => run_synth(seed, minutes, price, output),
    }
}

fn parse_date(value: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("날짜 형식 오류 (YYYY-MM-DD): {value}"))?;
    Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap()))
}

fn load_schema(path: &str) -> Result<StrategySchema> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("전략 파일을 읽을 수 없음: {path}"))?;
    serde_json::from_str(&text).with_context(|| format!("전략 스키마 파싱 실패: {path}"))
}

#[allow(clippy::too_many_arguments)]
async fn run_backtest(
    strategy_path: &str,
    symbol: &str,
    from: Option<String>,
    to: Option<String>,
    capital: Decimal,
    commission: Decimal,
    slippage: Decimal,
    db_url: Option<String>,
    seed: u32,
    minutes: usize,
) -> Result<()> {
    if capital <= Decimal::ZERO {
        return Err(anyhow!("초기 자본은 0보다 커야 합니다"));
    }
    let schema = load_schema(strategy_path)?;
    let registry = IndicatorRegistry::with_builtins();

    // 1분봉 확보
    let origin = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let minute_candles: Vec<Candle> = match &db_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(4)
                .connect(url)
                .await
                .with_context(|| "Postgres 연결 실패")?;
            let store = PostgresCandleStore::new(pool);
            store.ensure_schema().await?;
            let start = from
                .as_deref()
                .map(parse_date)
                .transpose()?
                .ok_or_else(|| anyhow!("--db-url 사용 시 --from이 필요합니다"))?;
            let end = to
                .as_deref()
                .map(parse_date)
                .transpose()?
                .ok_or_else(|| anyhow!("--db-url 사용 시 --to가 필요합니다"))?;
            let exchange = Arc::new(SyntheticExchange::new(
                seed,
                50_000.0,
                start,
                ((end - start).num_minutes().max(0) as usize) + 1,
            ));
            let provider = CachedCandleProvider::new(Arc::new(store), exchange);
            let outcome = provider
                .fetch_candles(symbol, Timeframe::M1, start, end, true, |message, loaded, total| {
                    info!(?loaded, ?total, "{message}");
                })
                .await?;
            info!(
                from_cache = outcome.stats.from_cache,
                from_api = outcome.stats.from_api,
                "데이터 준비 완료"
            );
            outcome.candles
        }
        None => SyntheticMarketGenerator::new(seed, 50_000.0).generate(origin, minutes),
    };
    if minute_candles.is_empty() {
        return Err(anyhow!("캔들 데이터가 없습니다"));
    }

    // 기준/추가 타임프레임으로 집계
    let primary = schema.data.primary_timeframe;
    let series = if primary == Timeframe::M1 {
        minute_candles.clone()
    } else {
        aggregate_candles(&minute_candles, primary)
    };
    let mut mtf: HashMap<Timeframe, Vec<Candle>> = HashMap::new();
    for tf in &schema.data.additional_timeframes {
        mtf.insert(*tf, aggregate_candles(&minute_candles, *tf));
    }

    // 실행 구간
    let start = match from.as_deref() {
        Some(value) => parse_date(value)?,
        None => series[0].open_time,
    };
    let end = match to.as_deref() {
        Some(value) => parse_date(value)? + Duration::days(1) - Duration::milliseconds(1),
        None => series[series.len() - 1].open_time,
    };

    let config = BacktestConfig::new(start, end)
        .with_initial_capital(capital)
        .with_commission_pct(commission)
        .with_slippage_pct(slippage);

    let executor = StrategyExecutor::new(schema, registry)
        .map_err(|e| anyhow!("전략 검증 실패: {e}"))?;
    let mut engine = BacktestEngine::new(config, executor);

    let mut on_progress = |event: quantlab_core::ProgressEvent| {
        info!(
            progress = format!("{:.1}%", event.progress),
            processed = event.processed_candles,
            total = event.total_candles,
            "진행 중"
        );
    };
    let run = engine.run(&series, symbol, &mtf, Some(&mut on_progress));

    println!("{}", run.summary());
    if let Some(error) = &run.error {
        return Err(anyhow!("백테스트 실패: {error}"));
    }
    Ok(())
}

async fn run_fetch(
    symbol: &str,
    from: &str,
    to: &str,
    db_url: Option<String>,
    seed: u32,
) -> Result<()> {
    let start = parse_date(from)?;
    let end = parse_date(to)? + Duration::days(1) - Duration::milliseconds(1);
    let total_minutes = ((end - start).num_minutes().max(0) as usize) + 1;

    let store: Arc<dyn quantlab_data::CandleStore> = match &db_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(4)
                .connect(url)
                .await
                .with_context(|| "Postgres 연결 실패")?;
            let store = PostgresCandleStore::new(pool);
            store.ensure_schema().await?;
            Arc::new(store)
        }
        None => {
            info!("--db-url 미지정: 인메모리 저장소로 시연합니다");
            Arc::new(InMemoryCandleStore::new())
        }
    };

    let exchange = Arc::new(SyntheticExchange::new(seed, 50_000.0, start, total_minutes));
    let provider = CachedCandleProvider::new(store, exchange);

    // 배치마다 다운로드 이벤트를 JSON 라인으로 출력 (SSE 경계와 같은 형태)
    let outcome = provider
        .fetch_candles(symbol, Timeframe::M1, start, end, true, |message, loaded, total| {
            let event = DownloadEvent::progress(message, loaded, total);
            println!("{}", serde_json::to_string(&event).unwrap_or_default());
        })
        .await;

    match outcome {
        Ok(outcome) => {
            let event = DownloadEvent::complete(
                outcome.stats.from_cache,
                outcome.stats.from_api,
                outcome.candles.len(),
            );
            println!("{}", serde_json::to_string(&event)?);
            info!(
                from_cache = outcome.stats.from_cache,
                from_api = outcome.stats.from_api,
                saved = outcome.stats.saved_to_cache,
                elapsed_ms = outcome.stats.total_time_ms,
                "적재 완료"
            );
            Ok(())
        }
        Err(e) => {
            let event = DownloadEvent::error(e.to_string());
            println!("{}", serde_json::to_string(&event)?);
            Err(e.into())
        }
    }
}

fn run_synth(seed: u32, minutes: usize, price: f64, output: Option<String>) -> Result<()> {
    let origin = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let candles = SyntheticMarketGenerator::new(seed, price).generate(origin, minutes);
    let json = serde_json::to_string_pretty(&candles)?;
    match output {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("파일 쓰기 실패: {path}"))?;
            println!("{}개 캔들 저장: {path}", candles.len());
        }
        None => println!("{json}"),
    }
    Ok(())
}
