//! 规则引擎领域模型
//!
//! 规则集的持久化形态（JSON / YAML）、建筑构件（Feature）以及输出的物料清单行。

use crate::error::ExpressionError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// 计量单位配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Units {
    /// 线性单位，如 "ft"
    pub linear: String,
    /// 面积单位，如 "ft2"
    pub area: String,
    /// 体积单位，可选
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
}

/// 物料模板
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialTemplate {
    pub sku: String,
    /// 数量表达式，如 "length * (1 + waste_pct)"
    pub qty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MaterialTemplate {
    pub fn new(sku: impl Into<String>, qty: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            qty: qty.into(),
            uom: None,
            description: None,
        }
    }

    pub fn with_uom(mut self, uom: impl Into<String>) -> Self {
        self.uom = Some(uom.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// 规则定义（持久化形态）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// 匹配条件：字段名 -> 期望的标量值，全部满足才匹配
    pub when: Map<String, Value>,
    pub materials: Vec<MaterialTemplate>,
}

/// 规则集文档（持久化形态）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSetDocument {
    pub version: i64,
    pub units: Units,
    #[serde(default)]
    pub vars: BTreeMap<String, f64>,
    pub rules: Vec<RuleDefinition>,
}

/// 建筑构件
///
/// 由外部特征提取流程产出，引擎只读。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    #[serde(rename = "type")]
    pub feature_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<f64>,
    #[serde(default)]
    pub props: Map<String, Value>,
}

impl Feature {
    pub fn new(id: impl Into<String>, feature_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            feature_type: feature_type.into(),
            length: None,
            area: None,
            count: None,
            props: Map::new(),
        }
    }

    pub fn with_length(mut self, length: f64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_area(mut self, area: f64) -> Self {
        self.area = Some(area);
        self
    }

    pub fn with_count(mut self, count: f64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }
}

/// 候选物料行（单个构件 × 单条规则 × 单个模板）
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateLineItem {
    pub sku: String,
    pub qty: f64,
    pub uom: String,
    pub description: Option<String>,
    pub source_rule_id: String,
    pub source_feature_id: String,
}

/// 合并后的物料清单行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialLineItem {
    pub sku: String,
    pub qty: f64,
    pub uom: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub source_rule_id: String,
    /// 按出现顺序追加，同一构件多次贡献会重复出现
    pub source_feature_ids: Vec<String>,
}

impl From<CandidateLineItem> for MaterialLineItem {
    fn from(candidate: CandidateLineItem) -> Self {
        Self {
            sku: candidate.sku,
            qty: candidate.qty,
            uom: candidate.uom,
            description: candidate.description,
            source_rule_id: candidate.source_rule_id,
            source_feature_ids: vec![candidate.source_feature_id],
        }
    }
}

/// 表达式求值警告：对应一个被跳过的物料模板
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationWarning {
    pub rule_id: String,
    pub feature_id: String,
    pub sku: String,
    pub expression: String,
    pub error: ExpressionError,
}

impl fmt::Display for EvaluationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rule={} feature={} sku={} qty='{}': {}",
            self.rule_id, self.feature_id, self.sku, self.expression, self.error
        )
    }
}

/// 引擎运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Validating,
    Matching,
    Resolving,
    Consolidating,
    Done,
    Failed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Matching => "matching",
            Self::Resolving => "resolving",
            Self::Consolidating => "consolidating",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// 运行结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub line_items: Vec<MaterialLineItem>,
    pub warnings: Vec<EvaluationWarning>,
    /// 状态流转记录，仅在启用追踪时填充
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub state_trace: Vec<EngineState>,
}

impl RunResult {
    /// 按 SKU 查找物料行
    pub fn item(&self, sku: &str) -> Option<&MaterialLineItem> {
        self.line_items.iter().find(|item| item.sku == sku)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_set_document_deserialization() {
        let json = r#"
        {
            "version": 1,
            "units": { "linear": "ft", "area": "ft2", "volume": "ft3" },
            "vars": { "height_ft": 10, "waste_pct": 0.07 },
            "rules": [
                {
                    "when": { "feature": "wall", "partitionType": "Interior" },
                    "materials": [
                        {
                            "sku": "STUD-362-20GA",
                            "qty": "length * 0.75",
                            "uom": "ea",
                            "description": "3-5/8\" Interior Stud, 20 GA"
                        }
                    ]
                }
            ]
        }
        "#;

        let doc: RuleSetDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.version, 1);
        assert_eq!(doc.units.volume.as_deref(), Some("ft3"));
        assert_eq!(doc.vars["waste_pct"], 0.07);
        assert_eq!(doc.rules[0].when["partitionType"], json!("Interior"));
        assert_eq!(doc.rules[0].materials[0].uom.as_deref(), Some("ea"));
    }

    #[test]
    fn test_feature_type_field_name() {
        let feature: Feature = serde_json::from_value(json!({
            "id": "w-1",
            "type": "wall",
            "length": 42.5,
            "props": { "partitionType": "Interior" }
        }))
        .unwrap();

        assert_eq!(feature.feature_type, "wall");
        assert_eq!(feature.length, Some(42.5));
        assert_eq!(feature.area, None);

        let back = serde_json::to_value(&feature).unwrap();
        assert_eq!(back["type"], "wall");
        assert!(back.get("area").is_none());
    }

    #[test]
    fn test_line_item_camel_case() {
        let item = MaterialLineItem::from(CandidateLineItem {
            sku: "PVC-2IN".to_string(),
            qty: 12.0,
            uom: "ft".to_string(),
            description: None,
            source_rule_id: "rule-abc".to_string(),
            source_feature_id: "p-1".to_string(),
        });

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["sourceRuleId"], "rule-abc");
        assert_eq!(json["sourceFeatureIds"], json!(["p-1"]));
        assert!(json.get("description").is_none());
    }
}
