//! 条件匹配
//!
//! 构件取值采用固定的两级查找：先查直接字段（`id` / `type` / `length` / `area` / `count`），
//! 再查 `props`。字段缺失视为不匹配，而不是错误。

use crate::error::ExpressionError;
use crate::expression::ValueEnvironment;
use crate::models::Feature;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// 从构件中解析出的取值
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedValue<'a> {
    Text(&'a str),
    Number(f64),
    Bool(bool),
    /// 数组或对象，只可能来自 props
    Structured(&'a Value),
}

impl<'a> ResolvedValue<'a> {
    /// 从 JSON 值转换，null 视为缺失
    fn from_json(value: &'a Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n.as_f64().map(Self::Number),
            Value::String(s) => Some(Self::Text(s)),
            Value::Array(_) | Value::Object(_) => Some(Self::Structured(value)),
        }
    }

    /// 严格相等：同类型比较，数值按数值比较（10 == 10.0），不跨类型
    pub fn equals(&self, expected: &Value) -> bool {
        match (self, expected) {
            (Self::Text(s), Value::String(e)) => *s == e.as_str(),
            (Self::Number(n), Value::Number(e)) => e.as_f64().is_some_and(|e| *n == e),
            (Self::Bool(b), Value::Bool(e)) => b == e,
            (Self::Structured(v), e) => *v == e,
            _ => false,
        }
    }

    /// 作为数值使用，数字字符串同样接受
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }
}

/// 构件取值解析器
#[derive(Debug, Clone, Copy)]
pub struct FeatureValueResolver<'a> {
    feature: &'a Feature,
}

impl<'a> FeatureValueResolver<'a> {
    pub fn new(feature: &'a Feature) -> Self {
        Self { feature }
    }

    /// 按 直接字段 -> props 的顺序解析
    pub fn resolve(&self, key: &str) -> Option<ResolvedValue<'a>> {
        self.direct_field(key).or_else(|| self.prop(key))
    }

    fn direct_field(&self, key: &str) -> Option<ResolvedValue<'a>> {
        let feature = self.feature;
        match key {
            "id" => Some(ResolvedValue::Text(&feature.id)),
            "type" => Some(ResolvedValue::Text(&feature.feature_type)),
            "length" => feature.length.map(ResolvedValue::Number),
            "area" => feature.area.map(ResolvedValue::Number),
            "count" => feature.count.map(ResolvedValue::Number),
            _ => None,
        }
    }

    fn prop(&self, key: &str) -> Option<ResolvedValue<'a>> {
        self.feature
            .props
            .get(key)
            .and_then(ResolvedValue::from_json)
    }
}

/// 条件匹配器
pub struct ConditionMatcher;

impl ConditionMatcher {
    /// 判断 `when` 中所有条件是否都被构件满足
    pub fn matches(when: &Map<String, Value>, feature: &Feature) -> bool {
        let resolver = FeatureValueResolver::new(feature);
        when.iter().all(|(key, expected)| {
            resolver
                .resolve(key)
                .is_some_and(|actual| actual.equals(expected))
        })
    }
}

/// 表达式求值环境：规则集变量优先，其次是构件取值
///
/// 同名时变量覆盖构件字段。
pub struct FeatureEnvironment<'a> {
    vars: &'a BTreeMap<String, f64>,
    resolver: FeatureValueResolver<'a>,
}

impl<'a> FeatureEnvironment<'a> {
    pub fn new(vars: &'a BTreeMap<String, f64>, feature: &'a Feature) -> Self {
        Self {
            vars,
            resolver: FeatureValueResolver::new(feature),
        }
    }
}

impl ValueEnvironment for FeatureEnvironment<'_> {
    fn lookup(&self, name: &str) -> Result<f64, ExpressionError> {
        if let Some(value) = self.vars.get(name) {
            return Ok(*value);
        }

        match self.resolver.resolve(name) {
            Some(value) => value.as_number().ok_or_else(|| ExpressionError::NonNumericValue {
                name: name.to_string(),
            }),
            None => Err(ExpressionError::UnknownVariable {
                name: name.to_string(),
            }),
        }
    }
}
