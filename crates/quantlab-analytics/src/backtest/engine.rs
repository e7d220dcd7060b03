//! 백테스트 엔진 본체.
//!
//! # 아키텍처
//!
//! ```text
//! BacktestEngine (루프 소유, 포지션 상태의 단일 소유자)
//!   ├── StrategyExecutor (신호 생성, 포지션 상태는 엔진이 통지)
//!   └── MarketSimulator  (체결/청산/포트폴리오)
//! ```
//!
//! 실행기와 시뮬레이터는 서로를 모릅니다. 엔진이 시뮬레이터의 체결
//! 결과를 `set_position`으로 실행기에 전달해 순환 참조를 끊습니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use quantlab_core::{Candle, ExitReason, ProgressEvent, Side, SignalKind, Timeframe};
use quantlab_indicators::{Atr, Indicator, IndicatorValue, Params};
use quantlab_execution::{MarketSimulator, SimulatorConfig};
use quantlab_strategy::StrategyExecutor;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::backtest::{BacktestConfig, BacktestRun, BacktestStatus};
use crate::metrics::{calculate_metrics, EquityPoint};

/// 백테스트 엔진.
///
/// 한 번의 실행 동안 실행기와 시뮬레이터를 독점 소유합니다.
pub struct BacktestEngine {
    config: BacktestConfig,
    executor: StrategyExecutor,
    simulator: MarketSimulator,
    cancel: Arc<AtomicBool>,
}

impl BacktestEngine {
    /// 설정과 전략 실행기로 엔진을 생성합니다.
    pub fn new(config: BacktestConfig, executor: StrategyExecutor) -> Self {
        let simulator = MarketSimulator::new(SimulatorConfig {
            initial_capital: config.initial_capital,
            commission_pct: config.commission_pct,
            slippage_pct: config.slippage_pct,
            max_open_positions: executor.schema().risk.max_open_positions,
            fill_model: config.fill_model,
        });
        Self {
            config,
            executor,
            simulator,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 취소 신호 핸들. true로 설정하면 다음 캔들 전에 중단합니다.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// 백테스트를 실행합니다.
    ///
    /// 오류를 던지지 않고 항상 `BacktestRun`을 반환합니다. 진행률은
    /// `progress_interval` 캔들마다 (그리고 처음/마지막에) 보고됩니다.
    pub fn run(
        &mut self,
        series: &[Candle],
        symbol: &str,
        mtf: &HashMap<Timeframe, Vec<Candle>>,
        mut on_progress: Option<&mut dyn FnMut(ProgressEvent)>,
    ) -> BacktestRun {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let timer = Instant::now();
        let schema = self.executor.schema().clone();

        let mut run = BacktestRun {
            id: run_id,
            strategy_id: schema.id.clone(),
            strategy_version: schema.version.clone(),
            config: self.config.clone(),
            status: BacktestStatus::Running,
            trades: Vec::new(),
            equity_curve: Vec::new(),
            metrics: None,
            started_at,
            completed_at: None,
            error: None,
            total_candles: 0,
            processed_candles: 0,
        };

        // 1. 구간 클리핑 (양끝 포함)
        let clipped: Vec<Candle> = series
            .iter()
            .filter(|c| c.open_time >= self.config.start && c.open_time <= self.config.end)
            .cloned()
            .collect();
        run.total_candles = clipped.len();
        if clipped.is_empty() {
            run.status = BacktestStatus::Failed;
            run.error = Some(format!(
                "No data in range: {} ~ {}",
                self.config.start, self.config.end
            ));
            run.completed_at = Some(Utc::now());
            return run;
        }

        // 2. 워밍업 검증
        let warmup = self.executor.required_warmup();
        if clipped.len() < warmup {
            run.status = BacktestStatus::Failed;
            run.error = Some(format!(
                "Insufficient data: 워밍업에 {warmup}개 필요, {}개 제공",
                clipped.len()
            ));
            run.completed_at = Some(Utc::now());
            return run;
        }

        // 3. 상태 초기화
        self.simulator.reset();
        self.executor.set_position(symbol, None);
        let mut peak_equity = self.config.initial_capital;

        // 4. SL/TP용 ATR 사전 계산
        let atr_values = compute_atr(&clipped, self.config.atr_period);

        // 5. 전략 전체 평가
        let execution = self.executor.execute(&clipped, symbol, mtf);

        let total_steps = clipped.len() - warmup;
        let mut entry_index: Option<usize> = None;

        // 6. 캔들 루프
        for i in warmup..clipped.len() {
            // 취소 확인 (캔들 처리 전)
            if self.cancel.load(Ordering::Relaxed) {
                let last = &clipped[i.saturating_sub(1)];
                let trades =
                    self.simulator
                        .force_close_all(last.close, last.open_time, ExitReason::Manual);
                run.trades.extend(trades);
                self.executor.set_position(symbol, None);
                run.status = BacktestStatus::Cancelled;
                run.error = Some("사용자 취소".to_string());
                run.completed_at = Some(Utc::now());
                info!(run_id = %run_id, processed = run.processed_candles, "백테스트 취소됨");
                return run;
            }

            let candle = &clipped[i];

            // 6a. 열린 포지션 청산 검사 (SL/TS/TP)
            let closed = self.simulator.process_candle(candle, symbol);
            if !closed.is_empty() {
                run.trades.extend(closed);
                if !self.simulator.has_position(symbol) {
                    self.executor.set_position(symbol, None);
                    entry_index = None;
                }
            }

            // 6a'. 보유 기간 초과 청산
            if let (Some(timeout), Some(opened_at)) =
                (schema.exit.timeout_candles, entry_index)
            {
                if self.simulator.has_position(symbol) && i - opened_at >= timeout {
                    if let Some(trade) = self.simulator.close_symbol_position(
                        symbol,
                        candle.close,
                        candle.open_time,
                        ExitReason::Timeout,
                    ) {
                        run.trades.push(trade);
                    }
                    self.executor.set_position(symbol, None);
                    entry_index = None;
                }
            }

            // 6b. 전략 신호 적용
            match execution[i].signal {
                SignalKind::ExitLong | SignalKind::ExitShort => {
                    if let Some(trade) = self.simulator.close_symbol_position(
                        symbol,
                        candle.close,
                        candle.open_time,
                        ExitReason::Signal,
                    ) {
                        run.trades.push(trade);
                    }
                    self.executor.set_position(symbol, None);
                    entry_index = None;
                }
                SignalKind::EntryLong | SignalKind::EntryShort => {
                    let side = if execution[i].signal == SignalKind::EntryLong {
                        Side::Long
                    } else {
                        Side::Short
                    };
                    let opened = self.simulator.open_position(
                        side,
                        candle,
                        symbol,
                        schema.exit.stop_loss.as_ref(),
                        schema.exit.take_profit.as_ref(),
                        schema.exit.trailing.as_ref(),
                        schema.risk.risk_per_trade_pct,
                        atr_values[i],
                    );
                    if opened.is_some() {
                        self.executor.set_position(symbol, Some(side));
                        entry_index = Some(i);
                    } else {
                        debug!(index = i, "진입 거부 (자본/포지션 한도)");
                    }
                }
                SignalKind::None => {}
            }

            // 6c. 자산 곡선
            let equity = self.simulator.equity(candle.close);
            if equity > peak_equity {
                peak_equity = equity;
            }
            let drawdown_abs = peak_equity - equity;
            let drawdown_pct = if peak_equity > Decimal::ZERO {
                (drawdown_abs / peak_equity * Decimal::from(100))
                    .to_f64()
                    .unwrap_or(0.0)
            } else {
                0.0
            };
            run.equity_curve.push(EquityPoint {
                timestamp: candle.open_time,
                equity,
                drawdown_abs,
                drawdown_pct,
                open_positions: self.simulator.open_position_count(),
            });

            // 6d. 진행률 보고
            run.processed_candles = i - warmup + 1;
            let is_boundary = run.processed_candles == 1
                || run.processed_candles == total_steps
                || run.processed_candles % self.config.progress_interval.max(1) == 0;
            if is_boundary {
                if let Some(callback) = on_progress.as_deref_mut() {
                    let processed = run.processed_candles;
                    let elapsed_ms = timer.elapsed().as_millis() as i64;
                    let eta_ms = if processed > 0 && total_steps > processed {
                        Some(elapsed_ms * (total_steps - processed) as i64 / processed as i64)
                    } else {
                        None
                    };
                    callback(ProgressEvent {
                        backtest_id: run_id,
                        progress: processed as f64 / total_steps.max(1) as f64 * 100.0,
                        processed_candles: processed,
                        total_candles: total_steps,
                        current_date: Some(candle.open_time),
                        eta_ms,
                    });
                }
            }
        }

        // 7. 잔여 포지션 강제 청산
        let last = &clipped[clipped.len() - 1];
        let remaining =
            self.simulator
                .force_close_all(last.close, last.open_time, ExitReason::Manual);
        let settled = !remaining.is_empty();
        run.trades.extend(remaining);
        self.executor.set_position(symbol, None);

        // 강제 청산으로 실현된 자본을 마지막 자산 곡선 점에 반영
        // (Σ순손익 = 최종 자본 − 초기 자본 유지)
        if settled {
            let equity = self.simulator.equity(last.close);
            if equity > peak_equity {
                peak_equity = equity;
            }
            if let Some(point) = run.equity_curve.last_mut() {
                point.equity = equity;
                point.drawdown_abs = peak_equity - equity;
                point.drawdown_pct = if peak_equity > Decimal::ZERO {
                    (point.drawdown_abs / peak_equity * Decimal::from(100))
                        .to_f64()
                        .unwrap_or(0.0)
                } else {
                    0.0
                };
                point.open_positions = 0;
            }
        }

        // 8. 지표 계산
        let metrics = calculate_metrics(
            &run.trades,
            &run.equity_curve,
            self.config.initial_capital,
            self.simulator.portfolio().total_commission,
            (clipped[0].open_time, last.open_time),
        );
        run.metrics = Some(metrics);
        run.status = BacktestStatus::Completed;
        run.completed_at = Some(Utc::now());
        info!(
            run_id = %run_id,
            trades = run.trades.len(),
            candles = run.processed_candles,
            elapsed_ms = timer.elapsed().as_millis() as u64,
            "백테스트 완료"
        );
        run
    }
}

/// 클리핑된 시퀀스에 대한 ATR (SL/TP 거리 계산용).
fn compute_atr(series: &[Candle], period: usize) -> Vec<Option<f64>> {
    let params = Params::empty().with("period", period);
    Atr.calculate(series, &params)
        .into_iter()
        .map(|v| v.and_then(|value| match value {
            IndicatorValue::Scalar(atr) => Some(atr),
            IndicatorValue::Multi(_) => None,
        }))
        .collect()
}
