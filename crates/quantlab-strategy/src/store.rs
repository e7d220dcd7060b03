//! 인메모리 전략 저장소.
//!
//! 전략은 ID로 조회하며, 수정할 때마다 버전의 PATCH가 올라가고 버전
//! 이력이 누적됩니다. 등록/수정 시점에 스키마를 검증해 유효하지 않은
//! 전략은 거부합니다. 영속화는 비목표이므로 프로세스 수명 동안만
//! 유지됩니다.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use quantlab_indicators::IndicatorRegistry;
use uuid::Uuid;

use crate::error::{Result, StrategyError};
use crate::schema::{StrategySchema, StrategyStatus};
use crate::validate::validate_schema;

/// 버전 이력 레코드.
#[derive(Debug, Clone)]
pub struct VersionRecord {
    /// 버전 문자열
    pub version: String,
    /// 해당 버전의 스키마
    pub schema: StrategySchema,
    /// 기록 시각
    pub created_at: DateTime<Utc>,
}

/// 저장된 전략.
#[derive(Debug, Clone)]
pub struct StoredStrategy {
    /// 현재 스키마
    pub schema: StrategySchema,
    /// 버전 이력 (오래된 것부터)
    pub versions: Vec<VersionRecord>,
}

/// 인메모리 전략 저장소.
#[derive(Default)]
pub struct StrategyStore {
    /// 스키마 검증에 사용하는 지표 레지스트리
    registry: IndicatorRegistry,
    strategies: HashMap<String, StoredStrategy>,
}

impl StrategyStore {
    /// 지표 레지스트리로 빈 저장소를 생성합니다.
    pub fn new(registry: IndicatorRegistry) -> Self {
        Self {
            registry,
            strategies: HashMap::new(),
        }
    }

    /// 전략 등록. 스키마가 유효하지 않거나 같은 ID가 있으면 오류.
    pub fn insert(&mut self, schema: StrategySchema) -> Result<()> {
        validate_schema(&schema, &self.registry)?;
        if self.strategies.contains_key(&schema.id) {
            return Err(StrategyError::Invalid(format!(
                "이미 존재하는 전략 ID: {}",
                schema.id
            )));
        }
        let record = VersionRecord {
            version: schema.version.clone(),
            schema: schema.clone(),
            created_at: Utc::now(),
        };
        self.strategies.insert(
            schema.id.clone(),
            StoredStrategy {
                schema,
                versions: vec![record],
            },
        );
        Ok(())
    }

    /// ID로 조회.
    pub fn get(&self, id: &str) -> Result<&StoredStrategy> {
        self.strategies
            .get(id)
            .ok_or_else(|| StrategyError::NotFound(id.to_string()))
    }

    /// 전략 수정. 스키마를 검증한 뒤 PATCH 버전을 올리고 버전 이력에
    /// 추가합니다.
    pub fn update(&mut self, id: &str, mut schema: StrategySchema) -> Result<String> {
        validate_schema(&schema, &self.registry)?;
        let stored = self
            .strategies
            .get_mut(id)
            .ok_or_else(|| StrategyError::NotFound(id.to_string()))?;

        let next_version = bump_patch(&stored.schema.version)?;
        schema.id = id.to_string();
        schema.version = next_version.clone();
        stored.versions.push(VersionRecord {
            version: next_version.clone(),
            schema: schema.clone(),
            created_at: Utc::now(),
        });
        stored.schema = schema;
        Ok(next_version)
    }

    /// 전략 복제: 새 ID, 이름 뒤 "(Copy)", 버전 1.0.0, 상태 draft.
    pub fn clone_strategy(&mut self, id: &str) -> Result<String> {
        let source = self.get(id)?.schema.clone();
        let mut copied = source;
        copied.id = Uuid::new_v4().to_string();
        copied.name = format!("{} (Copy)", copied.name);
        copied.version = "1.0.0".to_string();
        copied.status = StrategyStatus::Draft;
        let new_id = copied.id.clone();
        self.insert(copied)?;
        Ok(new_id)
    }

    /// 삭제.
    pub fn remove(&mut self, id: &str) -> Result<StoredStrategy> {
        self.strategies
            .remove(id)
            .ok_or_else(|| StrategyError::NotFound(id.to_string()))
    }

    /// 전체 전략 목록 (ID 정렬).
    pub fn list(&self) -> Vec<&StoredStrategy> {
        let mut all: Vec<&StoredStrategy> = self.strategies.values().collect();
        all.sort_by(|a, b| a.schema.id.cmp(&b.schema.id));
        all
    }
}

/// `MAJOR.MINOR.PATCH`의 PATCH를 올립니다.
fn bump_patch(version: &str) -> Result<String> {
    let parts: Vec<&str> = version.split('.').collect();
    let [major, minor, patch] = parts.as_slice() else {
        return Err(StrategyError::Invalid(format!(
            "버전 형식 오류: {version}"
        )));
    };
    let patch: u64 = patch
        .parse()
        .map_err(|_| StrategyError::Invalid(format!("버전 형식 오류: {version}")))?;
    Ok(format!("{major}.{minor}.{}", patch + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataRequirements, IndicatorDef};
    use quantlab_core::Timeframe;

    fn store() -> StrategyStore {
        StrategyStore::new(IndicatorRegistry::with_builtins())
    }

    fn sample(id: &str) -> StrategySchema {
        StrategySchema {
            id: id.to_string(),
            name: "피봇 전략".to_string(),
            version: "1.0.0".to_string(),
            status: StrategyStatus::Active,
            data: DataRequirements {
                primary_timeframe: Timeframe::H4,
                additional_timeframes: vec![],
                lookback: 100,
                symbols: vec![],
            },
            indicators: vec![],
            variables: vec![],
            entry: Default::default(),
            exit: Default::default(),
            risk: Default::default(),
        }
    }

    #[test]
    fn test_update_bumps_patch_and_appends_history() {
        let mut store = store();
        store.insert(sample("s1")).unwrap();

        let version = store.update("s1", sample("s1")).unwrap();
        assert_eq!(version, "1.0.1");

        let stored = store.get("s1").unwrap();
        assert_eq!(stored.schema.version, "1.0.1");
        assert_eq!(stored.versions.len(), 2);
    }

    #[test]
    fn test_clone_resets_version_and_status() {
        let mut store = store();
        store.insert(sample("s1")).unwrap();

        let new_id = store.clone_strategy("s1").unwrap();
        let cloned = store.get(&new_id).unwrap();
        assert_eq!(cloned.schema.name, "피봇 전략 (Copy)");
        assert_eq!(cloned.schema.version, "1.0.0");
        assert_eq!(cloned.schema.status, StrategyStatus::Draft);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut store = store();
        store.insert(sample("s1")).unwrap();
        assert!(store.insert(sample("s1")).is_err());
    }

    #[test]
    fn test_invalid_schema_rejected_at_insert_and_update() {
        let mut store = store();

        // lookback(10) < smma144 워밍업(144) → 등록 거부
        let mut invalid = sample("s1");
        invalid.data.lookback = 10;
        invalid.indicators.push(IndicatorDef {
            id: "smma144".to_string(),
            kind: "smma".to_string(),
            params: serde_json::json!({ "period": 144 }),
            timeframe: None,
            source: None,
        });
        let err = store.insert(invalid.clone()).unwrap_err();
        assert!(err.to_string().contains("lookback"));

        // 유효한 전략을 유효하지 않은 스키마로 수정해도 거부
        store.insert(sample("s1")).unwrap();
        assert!(store.update("s1", invalid).is_err());
        assert_eq!(store.get("s1").unwrap().schema.version, "1.0.0");
    }
}
