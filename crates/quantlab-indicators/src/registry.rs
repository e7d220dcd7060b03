//! 지표 레지스트리.
//!
//! 이름(대소문자 무관)으로 지표를 찾습니다. 전역 싱글턴이 아니라
//! 명시적 의존성으로 주입됩니다. 런타임 등록은 호출자가 외부에서
//! 동기화해야 합니다.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    Adx, Atr, Bollinger, Ema, Indicator, Macd, Obv, PivotPoints, Rsi, Sma, Smma, Stochastic,
    VolumeSma,
};

/// 이름 → 지표 매핑.
#[derive(Clone)]
pub struct IndicatorRegistry {
    map: HashMap<String, Arc<dyn Indicator>>,
}

impl IndicatorRegistry {
    /// 빈 레지스트리.
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// 내장 지표 전체가 등록된 레지스트리.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Sma));
        registry.register(Arc::new(Ema));
        registry.register(Arc::new(Smma));
        registry.register(Arc::new(Rsi));
        registry.register(Arc::new(Atr));
        registry.register(Arc::new(Macd));
        registry.register(Arc::new(Bollinger));
        registry.register(Arc::new(PivotPoints));
        registry.register(Arc::new(Adx));
        registry.register(Arc::new(Stochastic));
        registry.register(Arc::new(Obv));
        registry.register(Arc::new(VolumeSma));
        registry
    }

    /// 지표 등록. 같은 이름이 있으면 교체합니다.
    pub fn register(&mut self, indicator: Arc<dyn Indicator>) {
        self.map
            .insert(indicator.name().to_uppercase(), indicator);
    }

    /// 이름으로 조회 (대소문자 무관).
    pub fn get(&self, name: &str) -> Option<Arc<dyn Indicator>> {
        self.map.get(&name.to_uppercase()).cloned()
    }

    /// 등록된 지표 이름 목록.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.map.values().map(|i| i.name()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for IndicatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
