//! 规则集校验与编译
//!
//! 将原始规则集（JSON / YAML 归一化后的 `serde_json::Value`）校验并编译为不可变的 [`RuleSet`]：
//! - 按固定顺序校验结构，遇到第一个错误立即失败，不做部分接受
//! - 为每条规则根据 `when` 内容生成稳定的规则 ID
//! - 预先解析每个 `qty` 表达式；解析失败不影响加载，只在求值时作为警告报告

use crate::error::{ExpressionError, Result, RuleSetValidationError};
use crate::expression::Expression;
use crate::models::{MaterialTemplate, RuleDefinition, RuleSetDocument, Units};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

type ValidationResult<T> = std::result::Result<T, RuleSetValidationError>;

/// 编译后的物料模板
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    pub template: MaterialTemplate,
    /// 预解析的数量表达式，解析失败时保留错误
    pub expression: std::result::Result<Expression, ExpressionError>,
}

impl CompiledTemplate {
    fn new(template: MaterialTemplate) -> Self {
        let expression = Expression::parse(&template.qty);
        Self {
            template,
            expression,
        }
    }

    /// 表达式引用的标识符，解析失败时为空
    pub fn variables(&self) -> BTreeSet<String> {
        self.expression
            .as_ref()
            .map(Expression::variables)
            .unwrap_or_default()
    }
}

/// 编译后的规则
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// 由 `when` 内容派生的稳定 ID
    pub id: String,
    /// 在规则集中的下标
    pub index: usize,
    pub when: Map<String, Value>,
    pub materials: Vec<CompiledTemplate>,
}

impl CompiledRule {
    /// 规则条件中使用的所有字段
    pub fn condition_fields(&self) -> BTreeSet<&str> {
        self.when.keys().map(String::as_str).collect()
    }
}

/// 已校验、不可变的规则集
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub version: i64,
    pub units: Units,
    pub vars: BTreeMap<String, f64>,
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// 从 JSON 文本加载
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(json)?;
        Ok(load_rule_set(&raw)?)
    }

    /// 从 YAML 文本加载（先归一化为 JSON 值再校验）
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: Value = serde_yaml::from_str(yaml)?;
        Ok(load_rule_set(&raw)?)
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// 获取规则集统计信息
    pub fn stats(&self) -> RuleSetStats {
        let templates_count = self.rules.iter().map(|r| r.materials.len()).sum();
        let invalid_expressions = self
            .rules
            .iter()
            .flat_map(|r| r.materials.iter())
            .filter(|t| t.expression.is_err())
            .count();

        RuleSetStats {
            version: self.version,
            rules_count: self.rules.len(),
            templates_count,
            vars_count: self.vars.len(),
            invalid_expressions,
        }
    }

    /// 转回持久化形态
    pub fn to_document(&self) -> RuleSetDocument {
        RuleSetDocument {
            version: self.version,
            units: self.units.clone(),
            vars: self.vars.clone(),
            rules: self
                .rules
                .iter()
                .map(|rule| RuleDefinition {
                    when: rule.when.clone(),
                    materials: rule.materials.iter().map(|t| t.template.clone()).collect(),
                })
                .collect(),
        }
    }
}

impl TryFrom<RuleSetDocument> for RuleSet {
    type Error = crate::error::RuleError;

    fn try_from(document: RuleSetDocument) -> Result<Self> {
        let raw = serde_json::to_value(&document)?;
        Ok(load_rule_set(&raw)?)
    }
}

/// 规则集统计信息
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSetStats {
    pub version: i64,
    pub rules_count: usize,
    pub templates_count: usize,
    pub vars_count: usize,
    /// 无法解析的数量表达式个数（运行时会产生警告）
    pub invalid_expressions: usize,
}

/// 校验并编译原始规则集
pub fn load_rule_set(raw: &Value) -> ValidationResult<RuleSet> {
    let root = raw.as_object().ok_or(RuleSetValidationError::NotAnObject)?;

    let version = required(root, "version")?;
    let units = required(root, "units")?;
    let rules = required(root, "rules")?;

    let version = version
        .as_i64()
        .ok_or_else(|| invalid_field("version", "integer"))?;
    let units = parse_units(units)?;
    let vars = parse_vars(root.get("vars"))?;

    let rules = rules.as_array().ok_or(RuleSetValidationError::RulesNotList)?;
    if rules.is_empty() {
        return Err(RuleSetValidationError::EmptyRules);
    }

    let rules = rules
        .iter()
        .enumerate()
        .map(|(index, rule)| compile_rule(index, rule))
        .collect::<ValidationResult<Vec<_>>>()?;

    debug!(
        version,
        rules = rules.len(),
        vars = vars.len(),
        "规则集编译完成"
    );

    Ok(RuleSet {
        version,
        units,
        vars,
        rules,
    })
}

/// 根据 `when` 内容生成稳定的规则 ID
///
/// 键按字典序排列后做 SHA-256，与键的书写顺序无关。
pub fn derive_rule_id(when: &Map<String, Value>) -> String {
    let mut keys: Vec<&String> = when.keys().collect();
    keys.sort();

    let mut hasher = Sha256::new();
    for key in keys {
        hasher.update(key.as_bytes());
        hasher.update([0x1f]);
        hasher.update(when[key.as_str()].to_string().as_bytes());
        hasher.update([0x1e]);
    }

    let digest = hasher.finalize();
    let hex: String = digest[..8].iter().map(|b| format!("{:02x}", b)).collect();
    format!("rule-{}", hex)
}

fn required<'a>(root: &'a Map<String, Value>, field: &'static str) -> ValidationResult<&'a Value> {
    match root.get(field) {
        None | Some(Value::Null) => Err(RuleSetValidationError::MissingField(field)),
        Some(value) => Ok(value),
    }
}

fn invalid_field(field: impl Into<String>, expected: &'static str) -> RuleSetValidationError {
    RuleSetValidationError::InvalidField {
        field: field.into(),
        expected,
    }
}

fn parse_units(units: &Value) -> ValidationResult<Units> {
    let units = units
        .as_object()
        .ok_or_else(|| invalid_field("units", "object"))?;

    let unit = |name: &'static str| -> ValidationResult<Option<String>> {
        match units.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(Some(s.clone())),
            Some(_) => Err(invalid_field(format!("units.{}", name), "non-empty string")),
        }
    };

    Ok(Units {
        linear: unit("linear")?.ok_or(RuleSetValidationError::MissingField("units.linear"))?,
        area: unit("area")?.ok_or(RuleSetValidationError::MissingField("units.area"))?,
        volume: unit("volume")?,
    })
}

fn parse_vars(vars: Option<&Value>) -> ValidationResult<BTreeMap<String, f64>> {
    let vars = match vars {
        None | Some(Value::Null) => return Ok(BTreeMap::new()),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(invalid_field("vars", "object")),
    };

    vars.iter()
        .map(|(name, value)| {
            value
                .as_f64()
                .filter(|v| v.is_finite())
                .map(|v| (name.clone(), v))
                .ok_or_else(|| RuleSetValidationError::NonNumericVar { name: name.clone() })
        })
        .collect()
}

fn compile_rule(rule_index: usize, raw: &Value) -> ValidationResult<CompiledRule> {
    let rule = raw
        .as_object()
        .ok_or_else(|| invalid_field(format!("rules[{}]", rule_index), "object"))?;

    let when = match rule.get("when") {
        Some(Value::Object(when)) if !when.is_empty() => when,
        _ => return Err(RuleSetValidationError::EmptyWhen { rule_index }),
    };

    for (key, value) in when {
        if !matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_)) {
            return Err(RuleSetValidationError::NonScalarCondition {
                rule_index,
                key: key.clone(),
            });
        }
    }

    let materials = match rule.get("materials") {
        Some(Value::Array(materials)) if !materials.is_empty() => materials,
        _ => return Err(RuleSetValidationError::EmptyMaterials { rule_index }),
    };

    let materials = materials
        .iter()
        .enumerate()
        .map(|(material_index, material)| {
            parse_template(rule_index, material_index, material).map(CompiledTemplate::new)
        })
        .collect::<ValidationResult<Vec<_>>>()?;

    let id = derive_rule_id(when);
    for template in &materials {
        if let Err(e) = &template.expression {
            debug!(rule_id = %id, sku = %template.template.sku, error = %e, "数量表达式无法解析，运行时将跳过");
        }
    }

    Ok(CompiledRule {
        id,
        index: rule_index,
        when: when.clone(),
        materials,
    })
}

fn parse_template(
    rule_index: usize,
    material_index: usize,
    raw: &Value,
) -> ValidationResult<MaterialTemplate> {
    let material = raw.as_object().ok_or_else(|| {
        invalid_field(
            format!("rules[{}].materials[{}]", rule_index, material_index),
            "object",
        )
    })?;

    let invalid = |field: &'static str| RuleSetValidationError::InvalidMaterialField {
        rule_index,
        material_index,
        field,
    };

    let sku = match material.get("sku") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.trim()).filter(|s| !s.is_empty()),
        Some(_) => return Err(invalid("sku")),
    }
    .ok_or(RuleSetValidationError::MissingSku {
        rule_index,
        material_index,
    })?;

    // YAML 中常见 `qty: 4` 这种纯数字写法，归一化为表达式文本
    let qty = match material.get("qty") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(_) => return Err(invalid("qty")),
    }
    .ok_or(RuleSetValidationError::MissingQty {
        rule_index,
        material_index,
    })?;

    let optional_text = |field: &'static str| -> ValidationResult<Option<String>> {
        match material.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(invalid(field)),
        }
    };

    Ok(MaterialTemplate {
        sku: sku.to_string(),
        qty,
        uom: optional_text("uom")?,
        description: optional_text("description")?,
    })
}
