//! 백테스트 엔진과 성과 분석.
//!
//! # 데이터 흐름
//!
//! ```text
//! (전략, 캔들, 설정)
//!        │
//!        ▼
//! BacktestEngine ── StrategyExecutor (신호)
//!        │       └─ MarketSimulator (체결)
//!        ▼
//! BacktestRun { trades, equity_curve, metrics }
//! ```

pub mod backtest;
pub mod metrics;

pub use backtest::{BacktestConfig, BacktestEngine, BacktestRun, BacktestStatus, DataSource};
pub use metrics::{calculate_metrics, EquityPoint, PerformanceMetrics};
