//! 物料计算服务
//!
//! 作业级用例：
//!
//! 1. 读取原始规则集（不存在则失败）
//! 2. 校验并编译规则集（失败则不写入任何结果）
//! 3. 列出作业构件
//! 4. 运行引擎
//! 5. 整体替换作业的物料清单

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::compiler::load_rule_set;
use crate::engine::MaterialEngine;
use crate::error::{Result, RuleError};
use crate::models::RunResult;
use crate::repository::{FeatureRepository, MaterialRepository, RuleSetRepository};

/// 物料计算服务
pub struct TakeoffService<F, R, M>
where
    F: FeatureRepository,
    R: RuleSetRepository,
    M: MaterialRepository,
{
    feature_repo: Arc<F>,
    rule_set_repo: Arc<R>,
    material_repo: Arc<M>,
    engine: MaterialEngine,
}

impl<F, R, M> TakeoffService<F, R, M>
where
    F: FeatureRepository,
    R: RuleSetRepository,
    M: MaterialRepository,
{
    pub fn new(
        feature_repo: Arc<F>,
        rule_set_repo: Arc<R>,
        material_repo: Arc<M>,
        engine: MaterialEngine,
    ) -> Self {
        Self {
            feature_repo,
            rule_set_repo,
            material_repo,
            engine,
        }
    }

    /// 计算作业物料清单并写回
    #[instrument(skip(self))]
    pub async fn compute_job(&self, job_id: &str, rule_set_id: &str) -> Result<RunResult> {
        let raw = self
            .rule_set_repo
            .get_by_id(rule_set_id)
            .await?
            .ok_or_else(|| RuleError::RuleSetNotFound(rule_set_id.to_string()))?;

        let rule_set = load_rule_set(&raw).inspect_err(|e| {
            warn!(error = %e, code = "RULE_SET_INVALID", "规则集校验失败，未写入物料清单");
        })?;

        let features = self.feature_repo.list_by_job(job_id).await?;
        let result = self.engine.run(&rule_set, &features);

        self.material_repo
            .replace_all(job_id, &result.line_items)
            .await?;

        info!(
            features = features.len(),
            line_items = result.line_items.len(),
            warnings = result.warnings.len(),
            "作业物料清单已更新"
        );

        Ok(result)
    }
}
