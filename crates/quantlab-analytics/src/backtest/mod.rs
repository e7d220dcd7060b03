//! 백테스트 엔진.
//!
//! 실행 결과는 항상 `BacktestRun`으로 반환되며, `status` 필드가
//! 성공/실패/취소를 인코딩합니다. 엔진은 호출자에게 오류를 던지지
//! 않습니다.

mod engine;

use chrono::{DateTime, Utc};
use quantlab_core::Trade;
use quantlab_execution::FillModel;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metrics::{EquityPoint, PerformanceMetrics};

pub use engine::BacktestEngine;

/// 데이터 소스 선택.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// 로컬 캐시만
    #[default]
    Local,
    /// 거래소 (캐시 경유)
    Exchange,
}

/// 백테스트 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// 시작 시각 (포함)
    pub start: DateTime<Utc>,
    /// 종료 시각 (포함)
    pub end: DateTime<Utc>,
    /// 초기 자본 (> 0)
    #[serde(default = "default_initial_capital")]
    pub initial_capital: Decimal,
    /// 통화 (정보성)
    #[serde(default = "default_currency")]
    pub currency: String,
    /// 체결당 수수료율 (명목의 %)
    #[serde(default = "default_commission_pct")]
    pub commission_pct: Decimal,
    /// 체결당 슬리피지 (가격의 %)
    #[serde(default = "default_slippage_pct")]
    pub slippage_pct: Decimal,
    /// 체결 모델 (realistic만 규범적)
    #[serde(default)]
    pub fill_model: FillModel,
    /// 데이터 소스
    #[serde(default)]
    pub data_source: DataSource,
    /// SL/TP 계산용 ATR 기간
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,
    /// 진행률 보고 주기 (캔들 수)
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

fn default_initial_capital() -> Decimal {
    dec!(10_000)
}
fn default_currency() -> String {
    "USDT".to_string()
}
fn default_commission_pct() -> Decimal {
    dec!(0.1)
}
fn default_slippage_pct() -> Decimal {
    dec!(0.05)
}
fn default_atr_period() -> usize {
    14
}
fn default_progress_interval() -> usize {
    100
}

impl BacktestConfig {
    /// 구간으로 설정을 생성합니다 (나머지는 기본값).
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            initial_capital: default_initial_capital(),
            currency: default_currency(),
            commission_pct: default_commission_pct(),
            slippage_pct: default_slippage_pct(),
            fill_model: FillModel::default(),
            data_source: DataSource::default(),
            atr_period: default_atr_period(),
            progress_interval: default_progress_interval(),
        }
    }

    /// 초기 자본 설정.
    pub fn with_initial_capital(mut self, capital: Decimal) -> Self {
        self.initial_capital = capital;
        self
    }

    /// 수수료율 설정.
    pub fn with_commission_pct(mut self, pct: Decimal) -> Self {
        self.commission_pct = pct;
        self
    }

    /// 슬리피지 설정.
    pub fn with_slippage_pct(mut self, pct: Decimal) -> Self {
        self.slippage_pct = pct;
        self
    }

    /// 진행률 보고 주기 설정.
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval.max(1);
        self
    }
}

/// 백테스트 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BacktestStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// 백테스트 실행 결과.
///
/// `status = completed`일 때만 `metrics`가 채워집니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestRun {
    /// 실행 ID
    pub id: Uuid,
    /// 전략 ID
    pub strategy_id: String,
    /// 전략 버전
    pub strategy_version: String,
    /// 설정
    pub config: BacktestConfig,
    /// 상태
    pub status: BacktestStatus,
    /// 거래 기록 (캔들 순서)
    pub trades: Vec<Trade>,
    /// 자산 곡선 (처리한 캔들마다 1점)
    pub equity_curve: Vec<EquityPoint>,
    /// 성과 지표 (completed 전용)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<PerformanceMetrics>,
    /// 시작 시각
    pub started_at: DateTime<Utc>,
    /// 종료 시각
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// 실패/취소 사유
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 전체 캔들 수 (클리핑 후)
    pub total_candles: usize,
    /// 처리한 캔들 수
    pub processed_candles: usize,
}

impl BacktestRun {
    /// 사람이 읽는 결과 요약.
    pub fn summary(&self) -> String {
        let Some(metrics) = &self.metrics else {
            return format!(
                "백테스트 {}: {:?}{}",
                self.id,
                self.status,
                self.error
                    .as_ref()
                    .map(|e| format!(" ({e})"))
                    .unwrap_or_default()
            );
        };

        format!(
            "백테스트 결과 요약\n\
             ═══════════════════════════════════════\n\
             전략: {} v{}\n\
             기간: {} → {}\n\
             캔들: {} / {}\n\
             ───────────────────────────────────────\n\
             초기 자본: {}\n\
             최종 자산: {:.2}\n\
             총 수익률: {:.2}%\n\
             CAGR: {:.2}%\n\
             ───────────────────────────────────────\n\
             총 거래: {} (롱 {} / 숏 {})\n\
             승률: {:.1}%\n\
             프로핏 팩터: {:.2}\n\
             ───────────────────────────────────────\n\
             샤프 비율: {:.2}\n\
             소르티노 비율: {:.2}\n\
             최대 낙폭: {:.2}%\n\
             칼마 비율: {:.2}\n\
             ───────────────────────────────────────\n\
             총 수수료: {:.2}\n\
             ═══════════════════════════════════════",
            self.strategy_id,
            self.strategy_version,
            self.config.start.format("%Y-%m-%d %H:%M"),
            self.config.end.format("%Y-%m-%d %H:%M"),
            self.processed_candles,
            self.total_candles,
            metrics.initial_capital,
            metrics.final_capital,
            metrics.total_return_pct,
            metrics.cagr_pct,
            metrics.total_trades,
            metrics.long_trades,
            metrics.short_trades,
            metrics.win_rate_pct,
            metrics.profit_factor,
            metrics.sharpe_ratio,
            metrics.sortino_ratio,
            metrics.max_drawdown_pct,
            metrics.calmar_ratio,
            metrics.total_commission,
        )
    }
}
