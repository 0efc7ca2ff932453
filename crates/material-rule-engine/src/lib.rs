//! 物料规则引擎
//!
//! 将建筑构件（墙体、管线等）按规则集转换为物料清单行：
//! - 规则集校验与编译（JSON / YAML）
//! - 条件匹配（直接字段优先，其次 props）
//! - 数量表达式求值（递归下降解析的四则运算 DSL）
//! - 模板解析与单位推断
//! - 按 SKU 合并
//!
//! ```ignore
//! use material_rules::{MaterialEngine, RuleSet};
//!
//! let rule_set = RuleSet::from_json(json)?;
//! let result = MaterialEngine::default().run(&rule_set, &features);
//! ```

pub mod cli;
pub mod compiler;
pub mod consolidator;
pub mod engine;
pub mod error;
pub mod expression;
pub mod matcher;
pub mod models;
pub mod repository;
pub mod resolver;
pub mod service;
pub mod store;

pub use compiler::{CompiledRule, CompiledTemplate, RuleSet, RuleSetStats, derive_rule_id, load_rule_set};
pub use consolidator::Consolidator;
pub use engine::{EngineOptions, MaterialEngine};
pub use error::{ExpressionError, Result, RuleError, RuleSetValidationError};
pub use expression::{Expression, ValueEnvironment};
pub use matcher::{ConditionMatcher, FeatureEnvironment, FeatureValueResolver};
pub use models::{
    CandidateLineItem, EngineState, EvaluationWarning, Feature, MaterialLineItem,
    MaterialTemplate, RuleDefinition, RuleSetDocument, RunResult, Units,
};
pub use repository::{FeatureRepository, MaterialRepository, RuleSetRepository};
pub use resolver::{TemplateResolver, infer_uom};
pub use service::TakeoffService;
pub use store::{InMemoryFeatureStore, InMemoryMaterialStore, InMemoryRuleSetStore};
