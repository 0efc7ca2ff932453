//! 引擎编排
//!
//! 一次运行的状态流转：
//!
//! ```text
//! Idle -> Validating -> Matching -> Resolving -> Consolidating -> Done
//!              \
//!               -> Failed（规则集校验失败，终态）
//! ```
//!
//! 匹配与解析可按构件并行（rayon），合并始终是按构件顺序的单线程折叠，
//! 因此并行与串行的输出完全一致。

use crate::compiler::{CompiledRule, RuleSet, load_rule_set};
use crate::consolidator::Consolidator;
use crate::error::RuleSetValidationError;
use crate::matcher::ConditionMatcher;
use crate::models::{EngineState, Feature, RunResult};
use crate::resolver::{DEFAULT_UOM, Resolution, TemplateResolver};
use rayon::prelude::*;
use serde_json::Value;
use std::time::Instant;
use takeoff_shared::config::EngineConfig;
use tracing::{debug, info, warn};

/// 引擎选项
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    /// 是否并行执行匹配与解析
    pub parallel: bool,
    /// 无法推断单位时使用的默认单位
    pub default_uom: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            parallel: false,
            default_uom: DEFAULT_UOM.to_string(),
        }
    }
}

impl From<&EngineConfig> for EngineOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            parallel: config.parallel,
            default_uom: config.default_uom.clone(),
        }
    }
}

/// 物料规则引擎
pub struct MaterialEngine {
    options: EngineOptions,
    resolver: TemplateResolver,
    /// 是否记录状态流转
    trace_enabled: bool,
}

impl Default for MaterialEngine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl MaterialEngine {
    pub fn new(options: EngineOptions) -> Self {
        let resolver = TemplateResolver::new(options.default_uom.clone());
        Self {
            options,
            resolver,
            trace_enabled: false,
        }
    }

    /// 启用状态追踪，结果中的 `state_trace` 会被填充
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// 对原始规则集执行完整流程（含校验）
    pub fn run_raw(
        &self,
        raw: &Value,
        features: &[Feature],
    ) -> Result<RunResult, RuleSetValidationError> {
        let mut states = StateTracker::new(self.trace_enabled);
        states.transition(EngineState::Validating);

        let rule_set = match load_rule_set(raw) {
            Ok(rule_set) => rule_set,
            Err(e) => {
                states.transition(EngineState::Failed);
                warn!(error = %e, "规则集校验失败，终止运行");
                return Err(e);
            }
        };

        Ok(self.execute(&rule_set, features, states))
    }

    /// 对已校验的规则集执行
    ///
    /// `RuleSet` 只能经由校验构造，校验阶段在此直接通过。
    pub fn run(&self, rule_set: &RuleSet, features: &[Feature]) -> RunResult {
        let mut states = StateTracker::new(self.trace_enabled);
        states.transition(EngineState::Validating);
        self.execute(rule_set, features, states)
    }

    fn execute(&self, rule_set: &RuleSet, features: &[Feature], mut states: StateTracker) -> RunResult {
        let start = Instant::now();

        states.transition(EngineState::Matching);
        let matched = self.match_features(rule_set, features);
        let pairs: usize = matched.iter().map(|(_, rules)| rules.len()).sum();

        states.transition(EngineState::Resolving);
        let resolutions = self.resolve_pairs(rule_set, &matched);

        states.transition(EngineState::Consolidating);
        let mut consolidator = Consolidator::new();
        let mut warnings = Vec::new();
        for resolution in resolutions {
            resolution
                .candidates
                .into_iter()
                .for_each(|candidate| consolidator.push(candidate));
            warnings.extend(resolution.warnings);
        }
        let line_items = consolidator.finish();

        states.transition(EngineState::Done);

        info!(
            features = features.len(),
            rules = rule_set.rules().len(),
            matched_pairs = pairs,
            line_items = line_items.len(),
            warnings = warnings.len(),
            parallel = self.options.parallel,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "物料计算完成"
        );

        RunResult {
            line_items,
            warnings,
            state_trace: states.finish(),
        }
    }

    /// 每个构件命中的规则，保持构件顺序与规则顺序
    fn match_features<'a>(
        &self,
        rule_set: &'a RuleSet,
        features: &'a [Feature],
    ) -> Vec<(&'a Feature, Vec<&'a CompiledRule>)> {
        let match_one = |feature: &'a Feature| {
            let rules = rule_set
                .rules()
                .iter()
                .filter(|rule| ConditionMatcher::matches(&rule.when, feature))
                .collect::<Vec<_>>();
            (feature, rules)
        };

        if self.options.parallel {
            features.par_iter().map(match_one).collect()
        } else {
            features.iter().map(match_one).collect()
        }
    }

    fn resolve_pairs(
        &self,
        rule_set: &RuleSet,
        matched: &[(&Feature, Vec<&CompiledRule>)],
    ) -> Vec<Resolution> {
        let resolve_one = |(feature, rules): &(&Feature, Vec<&CompiledRule>)| {
            rules
                .iter()
                .map(|rule| self.resolver.resolve(rule, feature, rule_set))
                .collect::<Vec<_>>()
        };

        let nested: Vec<Vec<Resolution>> = if self.options.parallel {
            matched.par_iter().map(resolve_one).collect()
        } else {
            matched.iter().map(resolve_one).collect()
        };

        nested.into_iter().flatten().collect()
    }
}

/// 运行状态记录
struct StateTracker {
    current: EngineState,
    trace: Option<Vec<EngineState>>,
}

impl StateTracker {
    fn new(trace_enabled: bool) -> Self {
        Self {
            current: EngineState::Idle,
            trace: trace_enabled.then(|| vec![EngineState::Idle]),
        }
    }

    fn transition(&mut self, next: EngineState) {
        debug!(from = %self.current, to = %next, "引擎状态变更");
        self.current = next;
        if let Some(trace) = self.trace.as_mut() {
            trace.push(next);
        }
    }

    fn finish(self) -> Vec<EngineState> {
        self.trace.unwrap_or_default()
    }
}
