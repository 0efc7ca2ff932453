//! 内存仓储实现
//!
//! 使用 DashMap 提供线程安全的内存存储，适用于 CLI、测试和开发环境。

use crate::error::Result;
use crate::models::{Feature, MaterialLineItem};
use crate::repository::{FeatureRepository, MaterialRepository, RuleSetRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

/// 原始规则集存储
#[derive(Clone, Default)]
pub struct InMemoryRuleSetStore {
    rule_sets: Arc<DashMap<String, Value>>,
}

impl InMemoryRuleSetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存原始规则集（不校验）
    #[instrument(skip(self, raw))]
    pub fn insert(&self, rule_set_id: &str, raw: Value) {
        self.rule_sets.insert(rule_set_id.to_string(), raw);
        info!("规则集已保存: {}", rule_set_id);
    }

    pub fn remove(&self, rule_set_id: &str) -> Option<Value> {
        self.rule_sets.remove(rule_set_id).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.rule_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rule_sets.is_empty()
    }
}

#[async_trait]
impl RuleSetRepository for InMemoryRuleSetStore {
    async fn get_by_id(&self, rule_set_id: &str) -> Result<Option<Value>> {
        Ok(self.rule_sets.get(rule_set_id).map(|r| r.value().clone()))
    }
}

/// 构件存储，按作业分组
#[derive(Clone, Default)]
pub struct InMemoryFeatureStore {
    jobs: Arc<DashMap<String, Vec<Feature>>>,
}

impl InMemoryFeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加构件到作业，保持插入顺序
    #[instrument(skip(self, features), fields(count = features.len()))]
    pub fn extend(&self, job_id: &str, features: Vec<Feature>) {
        self.jobs
            .entry(job_id.to_string())
            .or_default()
            .extend(features);
        info!("构件已写入作业: {}", job_id);
    }

    pub fn count(&self, job_id: &str) -> usize {
        self.jobs.get(job_id).map(|f| f.len()).unwrap_or(0)
    }
}

#[async_trait]
impl FeatureRepository for InMemoryFeatureStore {
    async fn list_by_job(&self, job_id: &str) -> Result<Vec<Feature>> {
        Ok(self
            .jobs
            .get(job_id)
            .map(|f| f.value().clone())
            .unwrap_or_default())
    }
}

/// 某作业的物料清单快照
#[derive(Debug, Clone)]
pub struct JobMaterials {
    pub items: Vec<MaterialLineItem>,
    pub replaced_at: DateTime<Utc>,
}

/// 物料清单存储
#[derive(Clone, Default)]
pub struct InMemoryMaterialStore {
    jobs: Arc<DashMap<String, JobMaterials>>,
}

impl InMemoryMaterialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, job_id: &str) -> Option<JobMaterials> {
        self.jobs.get(job_id).map(|m| m.clone())
    }

    pub fn list_job_ids(&self) -> Vec<String> {
        self.jobs.iter().map(|m| m.key().clone()).collect()
    }
}

#[async_trait]
impl MaterialRepository for InMemoryMaterialStore {
    #[instrument(skip(self, items), fields(count = items.len()))]
    async fn replace_all(&self, job_id: &str, items: &[MaterialLineItem]) -> Result<()> {
        // insert 覆盖旧值，等价于先删后插
        self.jobs.insert(
            job_id.to_string(),
            JobMaterials {
                items: items.to_vec(),
                replaced_at: Utc::now(),
            },
        );
        info!("物料清单已替换: {}", job_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(sku: &str, qty: f64) -> MaterialLineItem {
        MaterialLineItem {
            sku: sku.to_string(),
            qty,
            uom: "ea".to_string(),
            description: None,
            source_rule_id: "rule-0123456789abcdef".to_string(),
            source_feature_ids: vec!["f1".to_string()],
        }
    }

    #[test]
    fn test_rule_set_store() {
        let store = InMemoryRuleSetStore::new();
        assert!(tokio_test::block_on(store.get_by_id("rs-1")).unwrap().is_none());

        store.insert("rs-1", json!({ "version": 1 }));
        assert_eq!(store.len(), 1);
        assert_eq!(
            tokio_test::block_on(store.get_by_id("rs-1")).unwrap(),
            Some(json!({ "version": 1 }))
        );

        assert!(store.remove("rs-1").is_some());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_feature_store_keeps_order() {
        let store = InMemoryFeatureStore::new();
        store.extend("job-1", vec![Feature::new("a", "wall"), Feature::new("b", "pipe")]);
        store.extend("job-1", vec![Feature::new("c", "door")]);

        let ids: Vec<String> = store
            .list_by_job("job-1")
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(store.count("job-1"), 3);
        assert!(store.list_by_job("job-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_all_overwrites() {
        let store = InMemoryMaterialStore::new();
        store
            .replace_all("job-1", &[item("A", 1.0), item("B", 2.0)])
            .await
            .unwrap();
        store.replace_all("job-1", &[item("C", 3.0)]).await.unwrap();

        let materials = store.get("job-1").unwrap();
        assert_eq!(materials.items.len(), 1);
        assert_eq!(materials.items[0].sku, "C");
        assert_eq!(store.list_job_ids(), vec!["job-1".to_string()]);
    }
}
