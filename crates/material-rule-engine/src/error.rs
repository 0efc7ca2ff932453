//! 规则引擎错误类型
//!
//! 分为三类：
//! - [`RuleSetValidationError`]：规则集结构不合法，整个运行失败
//! - [`ExpressionError`]：数量表达式求值失败，仅跳过当前物料模板
//! - [`RuleError`]：对外统一错误（加载、仓储、规则集未找到）

use serde::Serialize;
use thiserror::Error;

/// 规则集校验错误
///
/// 总是指向第一个出错的位置（规则下标 / 物料下标），不做部分接受。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleSetValidationError {
    #[error("规则集格式错误: 顶层必须是对象")]
    NotAnObject,

    #[error("规则集缺少必填字段: {0}")]
    MissingField(&'static str),

    #[error("规则集字段 {field} 类型错误: 期望 {expected}")]
    InvalidField {
        field: String,
        expected: &'static str,
    },

    #[error("规则集 rules 必须是数组")]
    RulesNotList,

    #[error("规则集 rules 不能为空")]
    EmptyRules,

    #[error("变量 {name} 必须是数值")]
    NonNumericVar { name: String },

    #[error("规则 #{rule_index} 的 when 不能为空")]
    EmptyWhen { rule_index: usize },

    #[error("规则 #{rule_index} 的 when.{key} 必须是标量（字符串/数值/布尔）")]
    NonScalarCondition { rule_index: usize, key: String },

    #[error("规则 #{rule_index} 的 materials 不能为空")]
    EmptyMaterials { rule_index: usize },

    #[error("规则 #{rule_index} 物料 #{material_index} 缺少 sku")]
    MissingSku {
        rule_index: usize,
        material_index: usize,
    },

    #[error("规则 #{rule_index} 物料 #{material_index} 缺少 qty")]
    MissingQty {
        rule_index: usize,
        material_index: usize,
    },

    #[error("规则 #{rule_index} 物料 #{material_index} 的字段 {field} 必须是字符串")]
    InvalidMaterialField {
        rule_index: usize,
        material_index: usize,
        field: &'static str,
    },
}

impl RuleSetValidationError {
    /// 出错规则的下标（如有）
    pub fn rule_index(&self) -> Option<usize> {
        match self {
            Self::EmptyWhen { rule_index }
            | Self::NonScalarCondition { rule_index, .. }
            | Self::EmptyMaterials { rule_index }
            | Self::MissingSku { rule_index, .. }
            | Self::MissingQty { rule_index, .. }
            | Self::InvalidMaterialField { rule_index, .. } => Some(*rule_index),
            _ => None,
        }
    }

    /// 出错物料的下标（如有）
    pub fn material_index(&self) -> Option<usize> {
        match self {
            Self::MissingSku { material_index, .. }
            | Self::MissingQty { material_index, .. }
            | Self::InvalidMaterialField { material_index, .. } => Some(*material_index),
            _ => None,
        }
    }
}

/// 表达式求值错误
///
/// 在运行中被就地恢复：跳过当前物料模板，记录为警告。
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ExpressionError {
    #[error("未知变量: {name}")]
    UnknownVariable { name: String },

    #[error("变量 {name} 的值不是数值")]
    NonNumericValue { name: String },

    #[error("除数为零")]
    DivisionByZero,

    #[error("计算结果不是有限数值")]
    NonFiniteResult,

    #[error("表达式解析失败 (位置 {position}): {message}")]
    ParseError { position: usize, message: String },
}

impl ExpressionError {
    pub(crate) fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            position,
            message: message.into(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownVariable { .. } => "UNKNOWN_VARIABLE",
            Self::NonNumericValue { .. } => "NON_NUMERIC_VALUE",
            Self::DivisionByZero => "DIVISION_BY_ZERO",
            Self::NonFiniteResult => "NON_FINITE_RESULT",
            Self::ParseError { .. } => "PARSE_ERROR",
        }
    }
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("规则集校验失败: {0}")]
    Validation(#[from] RuleSetValidationError),

    #[error("规则集未找到: {0}")]
    RuleSetNotFound(String),

    #[error("JSON 解析错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML 解析错误: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("仓储错误: {0}")]
    Repository(String),
}

impl RuleError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "RULE_SET_INVALID",
            Self::RuleSetNotFound(_) => "RULE_SET_NOT_FOUND",
            Self::JsonError(_) => "JSON_ERROR",
            Self::YamlError(_) => "YAML_ERROR",
            Self::Repository(_) => "REPOSITORY_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;
