//! 조건 트리와 관계 술어 평가.
//!
//! 피연산자가 하나라도 None이면 술어는 false입니다. AND/OR 그룹은
//! 단락 평가하며 빈 그룹은 true입니다.

use serde::{Deserialize, Serialize};

use crate::context::EvalContext;

/// 관계 술어.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    GreaterThan,
    LessThan,
    Equals,
    NotEquals,
    Between,
    CrossesAbove,
    CrossesBelow,
    IsRising,
    IsFalling,
}

/// 오른쪽 피연산자: 숫자 리터럴 또는 참조.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Number(f64),
    Reference(String),
}

impl Operand {
    fn resolve(&self, ctx: &EvalContext) -> Option<f64> {
        match self {
            Operand::Number(n) => Some(*n),
            Operand::Reference(r) => ctx.resolve(r),
        }
    }

    fn resolve_previous(&self, ctx: &EvalContext) -> Option<f64> {
        match self {
            Operand::Number(n) => Some(*n),
            Operand::Reference(r) => ctx.resolve_previous(r),
        }
    }
}

/// between 술어 파라미터.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeParams {
    pub min: f64,
    pub max: f64,
}

/// 단일 조건.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// 술어
    pub relation: Relation,
    /// 왼쪽 참조
    pub left: String,
    /// 오른쪽 참조 또는 숫자 (방향 술어에서는 불필요)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<Operand>,
    /// between 전용 범위
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<RangeParams>,
}

/// 논리 연산자.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOp {
    And,
    Or,
}

/// 조건 그룹.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroup {
    /// 논리 연산자
    pub operator: LogicalOp,
    /// 하위 조건/그룹 (순서 유지)
    #[serde(default)]
    pub conditions: Vec<ConditionNode>,
}

/// 조건 트리 노드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionNode {
    Group(ConditionGroup),
    Leaf(Condition),
}

impl ConditionNode {
    /// 컨텍스트에 대해 트리를 평가합니다.
    pub fn evaluate(&self, ctx: &EvalContext) -> bool {
        match self {
            ConditionNode::Leaf(condition) => condition.evaluate(ctx),
            ConditionNode::Group(group) => group.evaluate(ctx),
        }
    }

    /// 트리에 등장하는 모든 참조 (검증용).
    pub fn references(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, refs: &mut Vec<&'a str>) {
        match self {
            ConditionNode::Leaf(condition) => {
                refs.push(&condition.left);
                if let Some(Operand::Reference(r)) = &condition.right {
                    refs.push(r);
                }
            }
            ConditionNode::Group(group) => {
                for child in &group.conditions {
                    child.collect_references(refs);
                }
            }
        }
    }
}

impl ConditionGroup {
    /// AND: 전부 참, OR: 하나라도 참. 빈 그룹은 참.
    pub fn evaluate(&self, ctx: &EvalContext) -> bool {
        match self.operator {
            LogicalOp::And => self.conditions.iter().all(|c| c.evaluate(ctx)),
            LogicalOp::Or => {
                self.conditions.is_empty() || self.conditions.iter().any(|c| c.evaluate(ctx))
            }
        }
    }
}

impl Condition {
    /// 단일 조건 평가.
    pub fn evaluate(&self, ctx: &EvalContext) -> bool {
        let Some(left) = ctx.resolve(&self.left) else {
            return false;
        };

        match self.relation {
            Relation::GreaterThan => self.right_value(ctx).is_some_and(|r| left > r),
            Relation::LessThan => self.right_value(ctx).is_some_and(|r| left < r),
            Relation::Equals => self.right_value(ctx).is_some_and(|r| left == r),
            Relation::NotEquals => self.right_value(ctx).is_some_and(|r| left != r),
            Relation::Between => self.evaluate_between(left, ctx),
            Relation::CrossesAbove => self.evaluate_cross(left, ctx, true),
            Relation::CrossesBelow => self.evaluate_cross(left, ctx, false),
            Relation::IsRising => ctx
                .resolve_previous(&self.left)
                .is_some_and(|prev| left > prev),
            Relation::IsFalling => ctx
                .resolve_previous(&self.left)
                .is_some_and(|prev| left < prev),
        }
    }

    fn right_value(&self, ctx: &EvalContext) -> Option<f64> {
        self.right.as_ref()?.resolve(ctx)
    }

    /// between: right가 있고 0이 아니면 비율(left/right)을, 아니면 left를
    /// [min, max]로 검사합니다.
    fn evaluate_between(&self, left: f64, ctx: &EvalContext) -> bool {
        let Some(RangeParams { min, max }) = self.params else {
            return false;
        };
        let value = match self.right_value(ctx) {
            Some(right) if right != 0.0 => left / right,
            _ => left,
        };
        value >= min && value <= max
    }

    /// 교차: `prev_left ≤ prev_right ∧ left > right` (above),
    /// 미러링 (below). 직전 값이 없으면 false.
    fn evaluate_cross(&self, left: f64, ctx: &EvalContext, above: bool) -> bool {
        let Some(right_op) = self.right.as_ref() else {
            return false;
        };
        let (Some(right), Some(prev_left), Some(prev_right)) = (
            right_op.resolve(ctx),
            ctx.resolve_previous(&self.left),
            right_op.resolve_previous(ctx),
        ) else {
            return false;
        };
        if above {
            prev_left <= prev_right && left > right
        } else {
            prev_left >= prev_right && left < right
        }
    }
}
