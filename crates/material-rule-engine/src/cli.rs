//! CLI 命令定义与执行
//!
//! `takeoff compute` 对构件文件运行规则集并输出物料清单，
//! `takeoff validate` 只校验规则集。JSON / YAML 按文件扩展名区分。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use takeoff_shared::config::EngineConfig;
use tracing::{info, warn};

use crate::compiler::load_rule_set;
use crate::engine::{EngineOptions, MaterialEngine};
use crate::models::{Feature, RunResult};
use crate::service::TakeoffService;
use crate::store::{InMemoryFeatureStore, InMemoryMaterialStore, InMemoryRuleSetStore};

/// 物料计算命令行工具
#[derive(Parser, Debug)]
#[command(name = "takeoff")]
#[command(version, about = "按规则集将建筑构件转换为物料清单")]
#[command(propagate_version = true)]
pub struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)，覆盖配置文件
    #[arg(short, long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// 子命令枚举
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 计算物料清单
    Compute {
        /// 规则集文件（.json / .yaml / .yml）
        #[arg(short, long)]
        rules: PathBuf,

        /// 构件文件，内容为构件数组
        #[arg(short, long)]
        features: PathBuf,

        /// 输出文件，缺省时写到标准输出
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 并行计算（覆盖配置文件）
        #[arg(long)]
        parallel: bool,
    },

    /// 校验规则集
    Validate {
        /// 规则集文件（.json / .yaml / .yml）
        #[arg(short, long)]
        rules: PathBuf,
    },
}

/// 命令执行器
pub struct CommandRunner {
    engine_config: EngineConfig,
}

impl CommandRunner {
    pub fn new(engine_config: EngineConfig) -> Self {
        Self { engine_config }
    }

    /// 执行 compute 子命令，返回运行结果
    pub async fn run_compute(
        &self,
        rules: &Path,
        features: &Path,
        output: Option<&Path>,
        parallel: bool,
    ) -> Result<RunResult> {
        let raw = read_document(rules)?;
        let features: Vec<Feature> = serde_json::from_value(read_document(features)?)
            .with_context(|| format!("构件文件格式错误: {}", features.display()))?;

        let mut options = EngineOptions::from(&self.engine_config);
        options.parallel |= parallel;

        let rule_set_id = rules
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "rules".to_string());
        let job_id = "cli";

        let rule_sets = InMemoryRuleSetStore::new();
        rule_sets.insert(&rule_set_id, raw);
        let feature_store = InMemoryFeatureStore::new();
        feature_store.extend(job_id, features);

        let service = TakeoffService::new(
            Arc::new(feature_store),
            Arc::new(rule_sets),
            Arc::new(InMemoryMaterialStore::new()),
            MaterialEngine::new(options),
        );
        let result = service.compute_job(job_id, &rule_set_id).await?;

        for warning in &result.warnings {
            warn!("{}", warning);
        }

        let json = serde_json::to_string_pretty(&result)?;
        match output {
            Some(path) => {
                std::fs::write(path, json)
                    .with_context(|| format!("无法写入输出文件: {}", path.display()))?;
                info!("物料清单已写入: {}", path.display());
            }
            None => println!("{}", json),
        }

        Ok(result)
    }

    /// 执行 validate 子命令
    pub fn run_validate(&self, rules: &Path) -> Result<()> {
        let raw = read_document(rules)?;
        let rule_set = load_rule_set(&raw)
            .with_context(|| format!("规则集校验失败: {}", rules.display()))?;

        let stats = rule_set.stats();
        if stats.invalid_expressions > 0 {
            warn!(
                invalid = stats.invalid_expressions,
                "存在无法解析的数量表达式，运行时对应物料将被跳过"
            );
        }
        println!("{}", serde_json::to_string_pretty(&stats)?);
        Ok(())
    }
}

/// 读取 JSON / YAML 文件为 JSON 值
pub fn read_document(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("无法读取文件: {}", path.display()))?;

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    let value = if is_yaml {
        serde_yaml::from_str(&text).with_context(|| format!("YAML 解析失败: {}", path.display()))?
    } else {
        serde_json::from_str(&text).with_context(|| format!("JSON 解析失败: {}", path.display()))?
    };
    Ok(value)
}
