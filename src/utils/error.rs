//! 模块编排内核错误类型定义
//!
//! 所有可变操作都返回携带错误类别（[`ErrorKind`]）和可重试标记的 [`CoreError`]，
//! 调用方据此决定是提示重试还是直接报告失败。

use serde::Serialize;
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// 错误类别
///
/// 对外暴露的稳定名称见 [`ErrorKind::as_str`]。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// 注册或实例化阶段的结构性问题
    Load,
    /// 依赖缺失、无法解析或存在阻塞依赖者
    Dependency,
    /// 生命周期钩子执行失败
    Execution,
    /// 配置错误
    Config,
    /// 内部错误
    Internal,
}

impl ErrorKind {
    /// 错误类别名称
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Load => "LOAD_ERROR",
            ErrorKind::Dependency => "DEPENDENCY_ERROR",
            ErrorKind::Execution => "EXECUTION_ERROR",
            ErrorKind::Config => "CONFIG_ERROR",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }

    /// 该类别默认是否可重试
    pub fn default_retryable(&self) -> bool {
        matches!(self, ErrorKind::Execution)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 内核核心错误类型
///
/// 实现了 `Clone`，同一次实例化的失败结果可以分发给所有并发等待者。
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    // ==================== 模块生命周期错误 ====================
    /// 模块加载失败
    #[error("模块加载失败: '{module_id}' - {reason}")]
    Load {
        module_id: String,
        reason: String,
        retryable: bool,
    },

    /// 依赖关系错误
    #[error("依赖错误: '{module_id}' - {reason}")]
    Dependency {
        module_id: String,
        reason: String,
        /// 阻塞当前操作的依赖者
        blocking: Vec<String>,
        retryable: bool,
    },

    /// 生命周期钩子执行失败
    #[error("模块执行失败: '{module_id}' - {reason}")]
    Execution {
        module_id: String,
        reason: String,
        retryable: bool,
    },

    /// 循环依赖
    #[error("检测到循环依赖: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),

    /// 无效的模块定义
    #[error("无效的模块定义: {0}")]
    InvalidDefinition(String),

    // ==================== 配置错误 ====================
    /// 配置加载失败
    #[error("配置加载失败: {0}")]
    ConfigLoadFailed(String),

    /// 配置值无效
    #[error("配置值无效: '{key}' - {reason}")]
    InvalidConfigValue { key: String, reason: String },

    // ==================== 通用错误 ====================
    /// 初始化失败
    #[error("初始化失败: {0}")]
    InitFailed(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 内核操作结果类型别名
pub type Result<T> = std::result::Result<T, CoreError>;

/// 错误码常量
#[allow(missing_docs)]
pub mod error_code {
    // 核心错误 (CORE-xxx)
    pub const CORE_INIT_FAILED: &str = "CORE-003";
    pub const CORE_INTERNAL: &str = "CORE-004";

    // 模块错误 (MODULE-xxx)
    pub const MODULE_EXECUTION_ERROR: &str = "MODULE-002";
    pub const MODULE_LOAD_FAILED: &str = "MODULE-003";
    pub const MODULE_CIRCULAR_DEPENDENCY: &str = "MODULE-005";
    pub const MODULE_DEPENDENCY_ERROR: &str = "MODULE-006";
    pub const MODULE_INVALID_DEFINITION: &str = "MODULE-007";

    // 配置错误 (CONFIG-xxx)
    pub const CONFIG_INVALID_VALUE: &str = "CONFIG-002";
    pub const CONFIG_LOAD_FAILED: &str = "CONFIG-003";
}

impl CoreError {
    /// 构造加载错误（默认不可重试）
    pub fn load(module_id: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::Load {
            module_id: module_id.into(),
            reason: reason.into(),
            retryable: ErrorKind::Load.default_retryable(),
        }
    }

    /// 构造依赖错误（默认不可重试）
    pub fn dependency(module_id: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::Dependency {
            module_id: module_id.into(),
            reason: reason.into(),
            blocking: Vec::new(),
            retryable: ErrorKind::Dependency.default_retryable(),
        }
    }

    /// 构造"存在依赖者"的依赖错误
    pub fn blocked_by_dependents(module_id: impl Into<String>, dependents: Vec<String>) -> Self {
        CoreError::Dependency {
            module_id: module_id.into(),
            reason: format!("被以下模块依赖，无法卸载: {:?}", dependents),
            blocking: dependents,
            retryable: false,
        }
    }

    /// 构造执行错误（默认可重试）
    pub fn execution(module_id: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::Execution {
            module_id: module_id.into(),
            reason: reason.into(),
            retryable: ErrorKind::Execution.default_retryable(),
        }
    }

    /// 覆盖可重试标记
    ///
    /// 对没有可重试标记的变体不产生影响。
    pub fn with_retryable(mut self, value: bool) -> Self {
        match &mut self {
            CoreError::Load { retryable, .. }
            | CoreError::Dependency { retryable, .. }
            | CoreError::Execution { retryable, .. } => *retryable = value,
            _ => {}
        }
        self
    }

    /// 获取错误类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Load { .. } | CoreError::InvalidDefinition(_) => ErrorKind::Load,
            CoreError::Dependency { .. } | CoreError::CircularDependency(_) => {
                ErrorKind::Dependency
            }
            CoreError::Execution { .. } => ErrorKind::Execution,
            CoreError::ConfigLoadFailed(_) | CoreError::InvalidConfigValue { .. } => {
                ErrorKind::Config
            }
            CoreError::InitFailed(_) | CoreError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// 是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Load { retryable, .. }
            | CoreError::Dependency { retryable, .. }
            | CoreError::Execution { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// 阻塞操作的依赖者列表，仅依赖错误可能非空
    pub fn blocking_dependents(&self) -> &[String] {
        match self {
            CoreError::Dependency { blocking, .. } => blocking,
            _ => &[],
        }
    }

    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::Load { .. } => error_code::MODULE_LOAD_FAILED,
            CoreError::Dependency { .. } => error_code::MODULE_DEPENDENCY_ERROR,
            CoreError::Execution { .. } => error_code::MODULE_EXECUTION_ERROR,
            CoreError::CircularDependency(_) => error_code::MODULE_CIRCULAR_DEPENDENCY,
            CoreError::InvalidDefinition(_) => error_code::MODULE_INVALID_DEFINITION,
            CoreError::ConfigLoadFailed(_) => error_code::CONFIG_LOAD_FAILED,
            CoreError::InvalidConfigValue { .. } => error_code::CONFIG_INVALID_VALUE,
            CoreError::InitFailed(_) => error_code::CORE_INIT_FAILED,
            CoreError::Internal(_) => error_code::CORE_INTERNAL,
        }
    }

    /// 转换为事件负载中的错误描述
    pub fn to_event_data(&self) -> serde_json::Value {
        json!({
            "kind": self.kind().as_str(),
            "code": self.error_code(),
            "retryable": self.is_retryable(),
            "message": self.to_string(),
            "blocking": self.blocking_dependents(),
        })
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::ConfigLoadFailed(format!("IO 错误: {}", err))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::ConfigLoadFailed(format!("JSON 错误: {}", err))
    }
}

impl From<serde_yaml::Error> for CoreError {
    fn from(err: serde_yaml::Error) -> Self {
        CoreError::ConfigLoadFailed(format!("YAML 错误: {}", err))
    }
}

impl From<semver::Error> for CoreError {
    fn from(err: semver::Error) -> Self {
        CoreError::InvalidDefinition(format!("版本解析错误: {}", err))
    }
}
