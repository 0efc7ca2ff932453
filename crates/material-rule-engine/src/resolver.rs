//! 物料模板解析
//!
//! 对一个已匹配的 (规则, 构件) 对，逐个模板求值数量表达式并生成候选物料行。
//! 单个模板求值失败只跳过该模板，并以警告形式报告。

use crate::compiler::{CompiledRule, RuleSet};
use crate::matcher::FeatureEnvironment;
use crate::models::{CandidateLineItem, EvaluationWarning, Feature, Units};
use tracing::{debug, warn};

/// 未指定单位且无法推断时的默认单位
pub const DEFAULT_UOM: &str = "ea";

/// 单个 (规则, 构件) 对的解析结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub candidates: Vec<CandidateLineItem>,
    pub warnings: Vec<EvaluationWarning>,
}

/// 物料模板解析器
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    default_uom: String,
}

impl Default for TemplateResolver {
    fn default() -> Self {
        Self::new(DEFAULT_UOM)
    }
}

impl TemplateResolver {
    pub fn new(default_uom: impl Into<String>) -> Self {
        Self {
            default_uom: default_uom.into(),
        }
    }

    /// 解析规则下的全部物料模板
    pub fn resolve(&self, rule: &CompiledRule, feature: &Feature, rule_set: &RuleSet) -> Resolution {
        let env = FeatureEnvironment::new(&rule_set.vars, feature);
        let mut resolution = Resolution::default();

        for compiled in &rule.materials {
            let template = &compiled.template;
            let qty = compiled
                .expression
                .as_ref()
                .map_err(Clone::clone)
                .and_then(|expr| expr.evaluate(&env));

            let qty = match qty {
                Ok(qty) => qty,
                Err(error) => {
                    warn!(
                        rule_id = %rule.id,
                        feature_id = %feature.id,
                        sku = %template.sku,
                        qty = %template.qty,
                        error = %error,
                        "物料数量计算失败，已跳过"
                    );
                    resolution.warnings.push(EvaluationWarning {
                        rule_id: rule.id.clone(),
                        feature_id: feature.id.clone(),
                        sku: template.sku.clone(),
                        expression: template.qty.clone(),
                        error,
                    });
                    continue;
                }
            };

            if qty <= 0.0 {
                debug!(sku = %template.sku, feature_id = %feature.id, qty, "数量非正，丢弃");
                continue;
            }

            let uom = template
                .uom
                .clone()
                .unwrap_or_else(|| infer_uom(&template.qty, &rule_set.units, &self.default_uom));

            resolution.candidates.push(CandidateLineItem {
                sku: template.sku.clone(),
                qty,
                uom,
                description: template.description.clone(),
                source_rule_id: rule.id.clone(),
                source_feature_id: feature.id.clone(),
            });
        }

        resolution
    }
}

/// 根据数量表达式文本推断计量单位
///
/// 只看表达式中是否出现 `area` / `length` / `volume` 字样，按此顺序取第一个命中。
/// 这是文本层面的近似，`area_factor` 这样的变量名同样会命中。
pub fn infer_uom(qty: &str, units: &Units, default_uom: &str) -> String {
    if qty.contains("area") {
        units.area.clone()
    } else if qty.contains("length") {
        units.linear.clone()
    } else if qty.contains("volume") {
        units
            .volume
            .clone()
            .unwrap_or_else(|| default_uom.to_string())
    } else {
        default_uom.to_string()
    }
}
