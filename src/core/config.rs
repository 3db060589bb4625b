//! 编排器配置
//!
//! 定义日志、注册表、事件总线三部分配置以及文件加载、合并与校验逻辑。
//!
//! ```yaml
//! logging:
//!   level: debug
//! registry:
//!   health_check_interval_ms: 10000
//!   auto_load: ["storage", "editor"]
//! event_bus:
//!   slow_handler_threshold_ms: 50
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::events::EventBusConfig;
use crate::utils::{CoreError, Result};

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出到文件
    #[serde(default)]
    pub file_output: bool,

    /// 日志文件目录
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json_format: bool,

    /// 日志轮转策略
    #[serde(default = "default_rotation")]
    pub rotation: String,

    /// 保留日志文件数
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

fn default_max_files() -> usize {
    7
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: false,
            log_dir: None,
            json_format: false,
            rotation: default_rotation(),
            max_files: default_max_files(),
        }
    }
}

/// 模块注册表配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// 健康检查间隔（毫秒）
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,

    /// 是否为已加载模块启动周期健康检查
    #[serde(default = "default_true")]
    pub health_checks_enabled: bool,

    /// 内核启动时自动加载的模块
    #[serde(default)]
    pub auto_load: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_health_check_interval_ms() -> u64 {
    30_000
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            health_check_interval_ms: default_health_check_interval_ms(),
            health_checks_enabled: true,
            auto_load: vec![],
        }
    }
}

/// 编排器配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// 配置文件路径
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// 日志配置
    #[serde(default)]
    pub logging: LogConfig,

    /// 注册表配置
    #[serde(default)]
    pub registry: RegistryConfig,

    /// 事件总线配置
    #[serde(default)]
    pub event_bus: EventBusConfig,
}

impl OrchestratorConfig {
    /// 创建配置构建器
    pub fn builder() -> OrchestratorConfigBuilder {
        OrchestratorConfigBuilder::new()
    }

    /// 从文件加载配置，`.json` 按 JSON 解析，其余按 YAML 解析
    pub async fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            CoreError::ConfigLoadFailed(format!("读取 {} 失败: {}", path.display(), e))
        })?;

        let mut config: OrchestratorConfig =
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                serde_json::from_str(&content)?
            } else {
                serde_yaml::from_str(&content)?
            };

        config.validate()?;
        config.config_path = Some(path);
        Ok(config)
    }

    /// 校验配置值
    pub fn validate(&self) -> Result<()> {
        if self.registry.health_check_interval_ms == 0 {
            return Err(CoreError::InvalidConfigValue {
                key: "registry.health_check_interval_ms".into(),
                reason: "必须大于 0".into(),
            });
        }
        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(CoreError::InvalidConfigValue {
                key: "logging.level".into(),
                reason: format!("未知的日志级别 '{}'", self.logging.level),
            });
        }
        if self.registry.auto_load.iter().any(|id| id.trim().is_empty()) {
            return Err(CoreError::InvalidConfigValue {
                key: "registry.auto_load".into(),
                reason: "模块 ID 不能为空".into(),
            });
        }
        Ok(())
    }

    /// 合并另一个配置（用于覆盖）
    pub fn merge(&mut self, other: OrchestratorConfig) {
        // 只覆盖非默认值的配置
        if other.logging.level != default_log_level() {
            self.logging.level = other.logging.level;
        }
        if other.logging.file_output {
            self.logging.file_output = true;
            self.logging.log_dir = other.logging.log_dir;
        }
        if other.logging.json_format {
            self.logging.json_format = true;
        }
        if other.registry.health_check_interval_ms != default_health_check_interval_ms() {
            self.registry.health_check_interval_ms = other.registry.health_check_interval_ms;
        }
        if !other.registry.health_checks_enabled {
            self.registry.health_checks_enabled = false;
        }
        for id in other.registry.auto_load {
            if !self.registry.auto_load.contains(&id) {
                self.registry.auto_load.push(id);
            }
        }
        if other.event_bus.slow_handler_threshold_ms
            != EventBusConfig::default().slow_handler_threshold_ms
        {
            self.event_bus.slow_handler_threshold_ms = other.event_bus.slow_handler_threshold_ms;
        }
        if other.config_path.is_some() {
            self.config_path = other.config_path;
        }
    }
}

/// 配置构建器
#[derive(Debug, Default)]
pub struct OrchestratorConfigBuilder {
    config: OrchestratorConfig,
}

impl OrchestratorConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置配置文件路径
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.config_path = Some(path.into());
        self
    }

    /// 设置日志级别
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// 启用文件日志
    pub fn file_logging(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.config.logging.file_output = true;
        self.config.logging.log_dir = Some(log_dir.into());
        self
    }

    /// 启用 JSON 格式日志
    pub fn json_logging(mut self) -> Self {
        self.config.logging.json_format = true;
        self
    }

    /// 设置健康检查间隔（毫秒）
    pub fn health_check_interval_ms(mut self, interval_ms: u64) -> Self {
        self.config.registry.health_check_interval_ms = interval_ms;
        self
    }

    /// 关闭周期健康检查
    pub fn disable_health_checks(mut self) -> Self {
        self.config.registry.health_checks_enabled = false;
        self
    }

    /// 添加启动时自动加载的模块
    pub fn auto_load(mut self, module_id: impl Into<String>) -> Self {
        self.config.registry.auto_load.push(module_id.into());
        self
    }

    /// 设置慢处理器告警阈值（毫秒）
    pub fn slow_handler_threshold_ms(mut self, threshold_ms: u64) -> Self {
        self.config.event_bus.slow_handler_threshold_ms = threshold_ms;
        self
    }

    /// 构建配置
    pub fn build(self) -> OrchestratorConfig {
        self.config
    }
}
