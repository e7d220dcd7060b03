//! 전략 실행기.
//!
//! 기준 타임프레임 캔들마다 지표/변수/조건을 평가해 신호 시퀀스를
//! 생성합니다. 포지션 상태는 소유하지 않으며, 엔진이 `set_position`으로
//! 알려줍니다. 상위 타임프레임 지표는 마지막으로 *마감된* 상위 캔들에
//! 정렬됩니다.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use quantlab_core::{Candle, Side, SignalKind, Timeframe};
use quantlab_indicators::{IndicatorRegistry, IndicatorValue, Params};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::context::EvalContext;
use crate::error::{Result, StrategyError};
use crate::expr::Expr;
use crate::schema::{IndicatorDef, SignalDef, StrategySchema};
use crate::validate::validate_schema;

/// 캔들 하나의 실행 결과.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    /// 캔들 시각
    pub timestamp: DateTime<Utc>,
    /// 신호 가격 (종가)
    pub price: Decimal,
    /// 발행된 신호
    pub signal: SignalKind,
    /// 평가 컨텍스트 (지표/변수 값 포함)
    pub context: EvalContext,
}

/// 선언적 전략 실행기.
pub struct StrategyExecutor {
    schema: StrategySchema,
    registry: IndicatorRegistry,
    /// 사전 컴파일된 계산 변수
    variables: Vec<(String, Expr)>,
    /// 심볼별 현재 포지션 방향 (엔진이 동기화)
    positions: HashMap<String, Side>,
}

impl StrategyExecutor {
    /// 스키마를 검증하고 실행기를 생성합니다.
    pub fn new(schema: StrategySchema, registry: IndicatorRegistry) -> Result<Self> {
        validate_schema(&schema, &registry)?;
        let variables = schema
            .variables
            .iter()
            .map(|v| Expr::parse(&v.expression).map(|expr| (v.id.clone(), expr)))
            .collect::<std::result::Result<Vec<_>, StrategyError>>()?;
        Ok(Self {
            schema,
            registry,
            variables,
            positions: HashMap::new(),
        })
    }

    /// 전략 스키마 참조.
    pub fn schema(&self) -> &StrategySchema {
        &self.schema
    }

    /// 전략 워밍업 = max(lookback, 지표별 워밍업 최대값).
    pub fn required_warmup(&self) -> usize {
        let indicator_max = self
            .schema
            .indicators
            .iter()
            .filter_map(|def| {
                let indicator = self.registry.get(&def.kind)?;
                Some(indicator.required_warmup(&indicator_params(def)))
            })
            .max()
            .unwrap_or(0);
        self.schema.data.lookback.max(indicator_max)
    }

    /// 엔진이 포지션 상태 변화를 알립니다.
    pub fn set_position(&mut self, symbol: &str, side: Option<Side>) {
        match side {
            Some(side) => {
                self.positions.insert(symbol.to_string(), side);
            }
            None => {
                self.positions.remove(symbol);
            }
        }
    }

    /// 심볼의 현재 포지션 방향.
    pub fn position_side(&self, symbol: &str) -> Option<Side> {
        self.positions.get(symbol).copied()
    }

    /// 전체 시퀀스를 평가합니다.
    ///
    /// `mtf`는 추가 타임프레임 → 해당 캔들 시퀀스 매핑입니다.
    /// 신호 생성은 내부 포지션 상태 기계로 진행합니다 (진입 신호는
    /// 체결을 가정). 호출 후 실행기의 포지션 상태는 변하지 않습니다.
    pub fn execute(
        &self,
        series: &[Candle],
        symbol: &str,
        mtf: &HashMap<Timeframe, Vec<Candle>>,
    ) -> Vec<ExecutionRecord> {
        let sequences = self.indicator_sequences(series, mtf);

        let mut records = Vec::with_capacity(series.len());
        let mut state = self.positions.clone();
        let mut prev_ctx: Option<EvalContext> = None;

        for (i, candle) in series.iter().enumerate() {
            let mut ctx = EvalContext {
                indicators: sequences
                    .iter()
                    .map(|(id, values)| (id.clone(), values[i].clone()))
                    .collect(),
                variables: HashMap::new(),
                prices: candle.into(),
                previous: prev_ctx.take().map(Box::new),
            };

            for (id, expr) in &self.variables {
                let value = expr.eval(&ctx);
                if value.is_none() {
                    debug!(variable = %id, index = i, "변수 평가 실패 (null 처리)");
                }
                ctx.variables.insert(id.clone(), value);
            }

            let signal = self.generate_signal(symbol, &ctx, &mut state);
            records.push(ExecutionRecord {
                timestamp: candle.open_time,
                price: candle.close,
                signal,
                context: ctx.clone(),
            });

            // 다음 캔들의 previous로 사용 (중첩은 한 단계만)
            ctx.previous = None;
            prev_ctx = Some(ctx);
        }
        records
    }

    /// 지표 ID → 기준 타임프레임에 정렬된 값 시퀀스.
    fn indicator_sequences(
        &self,
        series: &[Candle],
        mtf: &HashMap<Timeframe, Vec<Candle>>,
    ) -> Vec<(String, Vec<Option<IndicatorValue>>)> {
        let primary = self.schema.data.primary_timeframe;
        let mut sequences = Vec::with_capacity(self.schema.indicators.len());

        for def in &self.schema.indicators {
            let Some(indicator) = self.registry.get(&def.kind) else {
                warn!(indicator = %def.id, kind = %def.kind, "등록되지 않은 지표 종류, 건너뜀");
                sequences.push((def.id.clone(), vec![None; series.len()]));
                continue;
            };
            let params = indicator_params(def);
            let tf = def.timeframe.unwrap_or(primary);

            let values = if tf == primary {
                indicator.calculate(series, &params)
            } else if let Some(htf_series) = mtf.get(&tf) {
                let htf_values = indicator.calculate(htf_series, &params);
                align_to_primary(series, htf_series, &htf_values, tf)
            } else {
                warn!(indicator = %def.id, timeframe = %tf, "상위 타임프레임 데이터 없음");
                vec![None; series.len()]
            };
            sequences.push((def.id.clone(), values));
        }
        sequences
    }

    /// 신호 우선순위: 청산 신호 → 롱 진입 → 숏 진입.
    fn generate_signal(
        &self,
        symbol: &str,
        ctx: &EvalContext,
        state: &mut HashMap<String, Side>,
    ) -> SignalKind {
        if let Some(side) = state.get(symbol).copied() {
            if let Some(exit) = &self.schema.exit.signal_exit {
                if signal_matches(exit, ctx) {
                    state.remove(symbol);
                    return match side {
                        Side::Long => SignalKind::ExitLong,
                        Side::Short => SignalKind::ExitShort,
                    };
                }
            }
            return SignalKind::None;
        }

        if let Some(long) = &self.schema.entry.long {
            if signal_matches(long, ctx) {
                state.insert(symbol.to_string(), Side::Long);
                return SignalKind::EntryLong;
            }
        }
        if let Some(short) = &self.schema.entry.short {
            if signal_matches(short, ctx) {
                state.insert(symbol.to_string(), Side::Short);
                return SignalKind::EntryShort;
            }
        }
        SignalKind::None
    }
}

/// 지표 정의의 파라미터에 가격 소스 오버라이드를 병합합니다.
fn indicator_params(def: &IndicatorDef) -> Params {
    let params = Params::from_value(&def.params);
    match &def.source {
        Some(source) if params.get("source").is_none() => {
            params.with("source", source.as_str())
        }
        _ => params,
    }
}

/// 조건이 참이고 (있다면) 필터도 참인지 확인합니다.
fn signal_matches(def: &SignalDef, ctx: &EvalContext) -> bool {
    if !def.conditions.evaluate(ctx) {
        return false;
    }
    def.filters.as_ref().map_or(true, |f| f.evaluate(ctx))
}

/// 상위 타임프레임 값을 기준 캔들에 정렬합니다.
///
/// 기준 캔들 i에는 시작 시각이 `align(tᵢ) − Δhtf` 이하인 가장 최근
/// (= 마지막으로 마감된) 상위 캔들의 값이 매핑됩니다. 포인터를 한 번만
/// 전진시키므로 전체 O(n)입니다.
fn align_to_primary(
    series: &[Candle],
    htf_series: &[Candle],
    htf_values: &[Option<IndicatorValue>],
    tf: Timeframe,
) -> Vec<Option<IndicatorValue>> {
    let step = tf.duration_ms();
    let mut out = Vec::with_capacity(series.len());
    let mut last: Option<usize> = None;
    let mut next = 0usize;

    for candle in series {
        let cutoff = tf.align_down(candle.open_time).timestamp_millis() - step;
        while next < htf_series.len() && htf_series[next].open_time_ms() <= cutoff {
            last = Some(next);
            next += 1;
        }
        out.push(last.and_then(|idx| htf_values[idx].clone()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, ConditionNode, Operand, Relation};
    use crate::schema::{
        DataRequirements, EntrySignals, ExitPolicy, IndicatorDef, SignalDef, StrategySchema,
    };
    use chrono::TimeZone;
    use rust_decimal::prelude::FromPrimitive;

    fn minute_candles(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let c = Decimal::from_f64(close).unwrap();
                Candle::new(
                    start + chrono::Duration::minutes(i as i64),
                    c,
                    c,
                    c,
                    c,
                    Decimal::from(100),
                )
            })
            .collect()
    }

    fn always_long_schema() -> StrategySchema {
        StrategySchema {
            id: "always-long".to_string(),
            name: "상시 롱".to_string(),
            version: "1.0.0".to_string(),
            status: Default::default(),
            data: DataRequirements {
                primary_timeframe: Timeframe::M1,
                additional_timeframes: vec![],
                lookback: 1,
                symbols: vec!["BTCUSDT".to_string()],
            },
            indicators: vec![],
            variables: vec![],
            entry: EntrySignals {
                long: Some(SignalDef {
                    conditions: ConditionNode::Leaf(Condition {
                        relation: Relation::GreaterThan,
                        left: "close".to_string(),
                        right: Some(Operand::Number(0.0)),
                        params: None,
                    }),
                    filters: None,
                }),
                short: None,
            },
            exit: ExitPolicy::default(),
            risk: Default::default(),
        }
    }

    #[test]
    fn test_always_long_emits_single_entry() {
        let executor =
            StrategyExecutor::new(always_long_schema(), IndicatorRegistry::with_builtins())
                .unwrap();
        let series = minute_candles(&[1.0, 2.0, 3.0, 4.0]);
        let records = executor.execute(&series, "BTCUSDT", &HashMap::new());

        assert_eq!(records[0].signal, SignalKind::EntryLong);
        // 내부 상태 기계가 체결을 가정하므로 이후에는 신호 없음
        assert!(records[1..].iter().all(|r| r.signal == SignalKind::None));
    }

    #[test]
    fn test_executor_position_state_suppresses_entry() {
        let mut executor =
            StrategyExecutor::new(always_long_schema(), IndicatorRegistry::with_builtins())
                .unwrap();
        executor.set_position("BTCUSDT", Some(Side::Long));
        let series = minute_candles(&[1.0, 2.0]);
        let records = executor.execute(&series, "BTCUSDT", &HashMap::new());
        assert!(records.iter().all(|r| r.signal == SignalKind::None));
    }

    #[test]
    fn test_warmup_uses_max_of_lookback_and_indicators() {
        let mut schema = always_long_schema();
        schema.indicators.push(IndicatorDef {
            id: "slow".to_string(),
            kind: "sma".to_string(),
            params: serde_json::json!({ "period": 50 }),
            timeframe: None,
            source: None,
        });

        // lookback이 지표 워밍업보다 크면 lookback이 워밍업
        schema.data.lookback = 60;
        let executor =
            StrategyExecutor::new(schema.clone(), IndicatorRegistry::with_builtins()).unwrap();
        assert_eq!(executor.required_warmup(), 60);

        // lookback이 지표 워밍업보다 작은 스키마는 생성 단계에서 거부
        schema.data.lookback = 10;
        assert!(StrategyExecutor::new(schema, IndicatorRegistry::with_builtins()).is_err());
    }

    #[test]
    fn test_htf_alignment_uses_last_closed_candle() {
        // 기준 1분, 상위 5분. SMA(1) = 해당 캔들 종가
        let mut schema = always_long_schema();
        schema.data.additional_timeframes = vec![Timeframe::M5];
        schema.indicators.push(IndicatorDef {
            id: "htf_close".to_string(),
            kind: "sma".to_string(),
            params: serde_json::json!({ "period": 1 }),
            timeframe: Some(Timeframe::M5),
            source: None,
        });
        let executor =
            StrategyExecutor::new(schema, IndicatorRegistry::with_builtins()).unwrap();

        let series = minute_candles(&[1.0; 12]);
        let htf = {
            let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            vec![
                Candle::new(
                    start,
                    Decimal::from(10),
                    Decimal::from(10),
                    Decimal::from(10),
                    Decimal::from(10),
                    Decimal::from(1),
                ),
                Candle::new(
                    start + chrono::Duration::minutes(5),
                    Decimal::from(20),
                    Decimal::from(20),
                    Decimal::from(20),
                    Decimal::from(20),
                    Decimal::from(1),
                ),
            ]
        };
        let mtf = HashMap::from([(Timeframe::M5, htf)]);
        let records = executor.execute(&series, "BTCUSDT", &mtf);

        // 첫 5분 구간: 마감된 상위 캔들 없음
        for record in &records[..5] {
            assert_eq!(record.context.resolve("htf_close"), None);
        }
        // 두 번째 구간: 00:00 캔들이 마감됨 → 10
        for record in &records[5..10] {
            assert_eq!(record.context.resolve("htf_close"), Some(10.0));
        }
        // 세 번째 구간: 00:05 캔들 값
        for record in &records[10..] {
            assert_eq!(record.context.resolve("htf_close"), Some(20.0));
        }
    }
}
