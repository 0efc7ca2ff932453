//! 仓储 Trait 定义
//!
//! 引擎本身不做持久化；服务层通过这些接口读取构件与规则集、写回物料清单，
//! 便于依赖抽象并支持 mock 测试。

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::models::{Feature, MaterialLineItem};

/// 构件仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeatureRepository: Send + Sync {
    /// 按作业列出构件，保持提取顺序
    async fn list_by_job(&self, job_id: &str) -> Result<Vec<Feature>>;
}

/// 规则集仓储接口
///
/// 返回未经校验的原始规则集，校验由引擎负责。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RuleSetRepository: Send + Sync {
    async fn get_by_id(&self, rule_set_id: &str) -> Result<Option<Value>>;
}

/// 物料清单仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MaterialRepository: Send + Sync {
    /// 整体替换某作业的物料清单（先删后插）
    async fn replace_all(&self, job_id: &str, items: &[MaterialLineItem]) -> Result<()>;
}
