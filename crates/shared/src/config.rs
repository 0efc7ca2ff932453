//! 配置管理模块
//!
//! 支持多层配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "TAKEOFF";

/// 引擎配置
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 是否按构件并行计算
    pub parallel: bool,
    /// 无法推断单位时的默认单位
    pub default_uom: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            default_uom: "ea".to_string(),
        }
    }
}

/// 可观测性配置
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// 应用配置
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub engine: EngineConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 配置目录取 `CONFIG_DIR`，默认 `config`。
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
        Self::load_from(Path::new(&config_dir), service_name)
    }

    /// 从指定目录加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. 代码内默认值
    /// 2. {dir}/default.toml
    /// 3. {dir}/{environment}.toml（环境取 TAKEOFF_ENV，默认 development）
    /// 4. {dir}/{service_name}.toml
    /// 5. 环境变量（TAKEOFF_ 前缀，层级用双下划线，如 TAKEOFF_ENGINE__DEFAULT_UOM -> engine.default_uom）
    pub fn load_from(config_dir: &Path, service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("TAKEOFF_ENV").unwrap_or_else(|_| "development".to_string());
        let defaults = Self::default();

        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env.clone())?
            .set_default("engine.parallel", defaults.engine.parallel)?
            .set_default("engine.default_uom", defaults.engine.default_uom)?
            .set_default("observability.log_level", defaults.observability.log_level)?
            .set_default("observability.log_format", defaults.observability.log_format)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_config_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("takeoff-config-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(!config.engine.parallel);
        assert_eq!(config.engine.default_uom, "ea");
        assert!(!config.observability.json_logs());
    }

    #[test]
    fn test_load_without_files_uses_defaults() {
        let dir = temp_config_dir("empty");
        let config = AppConfig::load_from(&dir, "takeoff").unwrap();

        assert_eq!(config.service_name, "takeoff");
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_service_file_overrides_default_file() {
        let dir = temp_config_dir("layered");
        fs::write(
            dir.join("default.toml"),
            "[engine]\nparallel = true\ndefault_uom = \"pcs\"\n\n[observability]\nlog_format = \"json\"\n",
        )
        .unwrap();
        fs::write(dir.join("takeoff-cli.toml"), "[engine]\ndefault_uom = \"each\"\n").unwrap();

        let config = AppConfig::load_from(&dir, "takeoff-cli").unwrap();
        assert!(config.engine.parallel);
        assert_eq!(config.engine.default_uom, "each");
        assert!(config.observability.json_logs());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_is_production() {
        let config = AppConfig {
            environment: "production".to_string(),
            ..Default::default()
        };
        assert!(config.is_production());
    }
}
