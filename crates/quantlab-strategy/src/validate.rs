//! 전략 스키마 검증.

use std::collections::HashSet;

use quantlab_indicators::{IndicatorRegistry, Params};

use crate::condition::ConditionNode;
use crate::error::StrategyError;
use crate::expr::Expr;
use crate::schema::{SignalDef, StrategySchema};

const PRICE_FIELDS: &[&str] = &["open", "high", "low", "close", "volume"];

/// 스키마를 레지스트리에 대해 검증합니다.
///
/// 실패 시 모든 문제를 모아 하나의 `Invalid` 오류로 반환합니다.
pub fn validate_schema(
    schema: &StrategySchema,
    registry: &IndicatorRegistry,
) -> Result<(), StrategyError> {
    let mut errors: Vec<String> = Vec::new();

    // 지표 ID 유일성 + 종류/파라미터/타임프레임 검증
    let mut indicator_ids: HashSet<&str> = HashSet::new();
    let mut max_warmup = 0usize;
    for def in &schema.indicators {
        if !indicator_ids.insert(&def.id) {
            errors.push(format!("지표 ID 중복: {}", def.id));
        }
        match registry.get(&def.kind) {
            Some(indicator) => {
                let params = Params::from_value(&def.params);
                if let Err(param_errors) = indicator.validate(&params) {
                    for e in param_errors {
                        errors.push(format!("지표 {}: {e}", def.id));
                    }
                }
                max_warmup = max_warmup.max(indicator.required_warmup(&params));
            }
            None => errors.push(format!("알 수 없는 지표 종류: {} ({})", def.kind, def.id)),
        }
        if let Some(tf) = def.timeframe {
            let allowed = tf == schema.data.primary_timeframe
                || schema.data.additional_timeframes.contains(&tf);
            if !allowed {
                errors.push(format!(
                    "지표 {}의 타임프레임 {tf}이(가) 데이터 요구 사항에 없습니다",
                    def.id
                ));
            }
        }
    }

    // lookback은 지표 워밍업 최대값 이상이어야 함
    if schema.data.lookback < max_warmup {
        errors.push(format!(
            "lookback({})이 지표 최대 워밍업({max_warmup})보다 작습니다",
            schema.data.lookback
        ));
    }

    // 변수 ID 유일성 + 표현식 파싱/참조 검증 (앞서 정의된 심볼만 사용)
    let mut known: HashSet<String> = indicator_ids.iter().map(|s| s.to_string()).collect();
    for field in PRICE_FIELDS {
        known.insert(field.to_string());
    }
    let mut variable_ids: HashSet<&str> = HashSet::new();
    for var in &schema.variables {
        if !variable_ids.insert(&var.id) || indicator_ids.contains(var.id.as_str()) {
            errors.push(format!("변수 ID 중복: {}", var.id));
        }
        match Expr::parse(&var.expression) {
            Ok(expr) => {
                for reference in expr.references() {
                    if !known.contains(reference) {
                        errors.push(format!(
                            "변수 {}: 정의되지 않은 심볼 '{reference}'",
                            var.id
                        ));
                    }
                }
            }
            Err(e) => errors.push(format!("변수 {}: {e}", var.id)),
        }
        known.insert(var.id.clone());
    }

    // 신호 조건 참조 검증
    let mut check_signal = |label: &str, def: &SignalDef| {
        check_node(label, &def.conditions, &known, &mut errors);
        if let Some(filters) = &def.filters {
            check_node(label, filters, &known, &mut errors);
        }
    };
    if let Some(long) = &schema.entry.long {
        check_signal("entry.long", long);
    }
    if let Some(short) = &schema.entry.short {
        check_signal("entry.short", short);
    }
    if let Some(exit) = &schema.exit.signal_exit {
        check_signal("exit.signal", exit);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(StrategyError::Invalid(errors.join("; ")))
    }
}

fn check_node(
    label: &str,
    node: &ConditionNode,
    known: &HashSet<String>,
    errors: &mut Vec<String>,
) {
    for reference in node.references() {
        let base = reference.split('.').next().unwrap_or(reference);
        if base.parse::<f64>().is_ok() {
            continue;
        }
        if !known.contains(base) {
            errors.push(format!("{label}: 정의되지 않은 심볼 '{base}'"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, Operand, Relation};
    use crate::schema::{DataRequirements, EntrySignals, IndicatorDef, VariableDef};
    use quantlab_core::Timeframe;

    fn base_schema() -> StrategySchema {
        StrategySchema {
            id: "s1".to_string(),
            name: "테스트".to_string(),
            version: "1.0.0".to_string(),
            status: Default::default(),
            data: DataRequirements {
                primary_timeframe: Timeframe::H1,
                additional_timeframes: vec![Timeframe::H4],
                lookback: 100,
                symbols: vec!["BTCUSDT".to_string()],
            },
            indicators: vec![IndicatorDef {
                id: "rsi14".to_string(),
                kind: "rsi".to_string(),
                params: serde_json::json!({ "period": 14 }),
                timeframe: None,
                source: None,
            }],
            variables: vec![],
            entry: EntrySignals::default(),
            exit: Default::default(),
            risk: Default::default(),
        }
    }

    #[test]
    fn test_valid_schema_passes() {
        let registry = IndicatorRegistry::with_builtins();
        assert!(validate_schema(&base_schema(), &registry).is_ok());
    }

    #[test]
    fn test_unknown_indicator_kind_rejected() {
        let registry = IndicatorRegistry::with_builtins();
        let mut schema = base_schema();
        schema.indicators[0].kind = "supertrend".to_string();
        let err = validate_schema(&schema, &registry).unwrap_err();
        assert!(err.to_string().contains("알 수 없는 지표 종류"));
    }

    #[test]
    fn test_lookback_below_indicator_warmup_rejected() {
        let registry = IndicatorRegistry::with_builtins();
        let mut schema = base_schema();
        // rsi14 워밍업은 15
        schema.data.lookback = 10;
        let err = validate_schema(&schema, &registry).unwrap_err();
        assert!(err.to_string().contains("lookback"));
    }

    #[test]
    fn test_undeclared_timeframe_rejected() {
        let registry = IndicatorRegistry::with_builtins();
        let mut schema = base_schema();
        schema.indicators[0].timeframe = Some(Timeframe::D1);
        assert!(validate_schema(&schema, &registry).is_err());
    }

    #[test]
    fn test_variable_with_unknown_symbol_rejected() {
        let registry = IndicatorRegistry::with_builtins();
        let mut schema = base_schema();
        schema.variables.push(VariableDef {
            id: "v1".to_string(),
            expression: "rsi14 - missing".to_string(),
        });
        let err = validate_schema(&schema, &registry).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_condition_number_literal_allowed() {
        let registry = IndicatorRegistry::with_builtins();
        let mut schema = base_schema();
        schema.entry.long = Some(crate::schema::SignalDef {
            conditions: ConditionNode::Leaf(Condition {
                relation: Relation::GreaterThan,
                left: "close".to_string(),
                right: Some(Operand::Number(0.0)),
                params: None,
            }),
            filters: None,
        });
        assert!(validate_schema(&schema, &registry).is_ok());
    }
}
