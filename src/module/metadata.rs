//! 模块定义与运行时实例
//!
//! - [`ModuleDefinition`]：注册时提交的静态描述，注册后不可变
//! - [`ModuleInstance`]：工厂产出的运行时对象，携带启用标记与生命周期钩子
//! - [`HealthRecord`]：按需推导的健康记录

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use super::lifecycle::{ModuleLifecycle, NoopLifecycle};
use crate::utils::{CoreError, Result};

// ============================================================================
// 模块分类
// ============================================================================

/// 模块分类（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleCategory {
    /// 核心模块
    Core,
    /// 业务功能
    Feature,
    /// 外部集成
    Integration,
    /// 界面
    Ui,
    /// 基础设施
    Infrastructure,
    /// 插件
    Plugin,
}

impl ModuleCategory {
    /// 分类名称
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleCategory::Core => "core",
            ModuleCategory::Feature => "feature",
            ModuleCategory::Integration => "integration",
            ModuleCategory::Ui => "ui",
            ModuleCategory::Infrastructure => "infrastructure",
            ModuleCategory::Plugin => "plugin",
        }
    }
}

impl FromStr for ModuleCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "core" => Ok(ModuleCategory::Core),
            "feature" => Ok(ModuleCategory::Feature),
            "integration" => Ok(ModuleCategory::Integration),
            "ui" => Ok(ModuleCategory::Ui),
            "infrastructure" => Ok(ModuleCategory::Infrastructure),
            "plugin" => Ok(ModuleCategory::Plugin),
            other => Err(CoreError::InvalidDefinition(format!(
                "未知的模块分类: '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ModuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// 工厂与上下文
// ============================================================================

/// 传给工厂的加载上下文
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleContext {
    /// 正在加载的模块 ID
    pub module_id: String,
    /// 加载开始时间
    pub timestamp: DateTime<Utc>,
}

impl ModuleContext {
    pub(crate) fn new(module_id: impl Into<String>) -> Self {
        Self {
            module_id: module_id.into(),
            timestamp: Utc::now(),
        }
    }
}

/// 模块工厂
pub type ModuleFactory =
    Arc<dyn Fn(ModuleContext) -> BoxFuture<'static, anyhow::Result<ModuleInstance>> + Send + Sync>;

/// 由异步闭包构造 [`ModuleFactory`]
///
/// ```
/// use chips_orchestrator::module::{factory, ModuleInstance};
///
/// let f = factory(|ctx| async move {
///     Ok(ModuleInstance::new(ctx.module_id, "编辑器", "1.0.0"))
/// });
/// # let _ = f;
/// ```
pub fn factory<F, Fut>(f: F) -> ModuleFactory
where
    F: Fn(ModuleContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<ModuleInstance>> + Send + 'static,
{
    Arc::new(move |ctx| f(ctx).boxed())
}

// ============================================================================
// 模块定义
// ============================================================================

/// 模块定义
#[derive(Clone)]
pub struct ModuleDefinition {
    /// 模块唯一标识
    pub id: String,
    /// 显示名称
    pub name: String,
    /// 版本号
    pub version: String,
    /// 分类
    pub category: Option<ModuleCategory>,
    /// 描述
    pub description: String,
    /// 依赖的模块 ID
    pub dependencies: Vec<String>,
    /// 提供的能力标识
    pub provides: Vec<String>,
    /// 实例工厂
    pub factory: ModuleFactory,
}

impl ModuleDefinition {
    /// 创建模块定义
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        factory: ModuleFactory,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            category: None,
            description: String::new(),
            dependencies: Vec::new(),
            provides: Vec::new(),
            factory,
        }
    }

    /// 设置分类
    pub fn with_category(mut self, category: ModuleCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// 设置描述
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// 声明依赖
    pub fn depends_on(mut self, module_id: impl Into<String>) -> Self {
        self.dependencies.push(module_id.into());
        self
    }

    /// 声明提供的能力
    pub fn provides(mut self, capability: impl Into<String>) -> Self {
        self.provides.push(capability.into());
        self
    }

    /// 校验必填字段
    pub fn validate(&self) -> Result<()> {
        let mut errors = vec![];

        if self.id.trim().is_empty() {
            errors.push("模块 ID 不能为空".to_string());
        }
        if self.name.trim().is_empty() {
            errors.push("模块名称不能为空".to_string());
        }
        if self.version.trim().is_empty() {
            errors.push("模块版本不能为空".to_string());
        }
        if self.dependencies.iter().any(|d| d.trim().is_empty()) {
            errors.push("依赖 ID 不能为空".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::InvalidDefinition(errors.join("; ")))
        }
    }

    /// 可序列化的摘要，用于事件负载
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "name": self.name,
            "version": self.version,
            "category": self.category,
            "dependencies": self.dependencies,
            "provides": self.provides,
        })
    }
}

impl fmt::Debug for ModuleDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("category", &self.category)
            .field("dependencies", &self.dependencies)
            .field("provides", &self.provides)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// 运行时实例
// ============================================================================

/// 模块运行时实例
///
/// 加载后以 `Arc<ModuleInstance>` 共享，启用标记可在不持有锁的情况下翻转。
pub struct ModuleInstance {
    /// 模块 ID
    pub id: String,
    /// 显示名称
    pub name: String,
    /// 版本号
    pub version: String,
    enabled: AtomicBool,
    lifecycle: Arc<dyn ModuleLifecycle>,
}

impl ModuleInstance {
    /// 创建无钩子的实例，默认启用
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            enabled: AtomicBool::new(true),
            lifecycle: Arc::new(NoopLifecycle),
        }
    }

    /// 注册阶段的占位实例
    pub(crate) fn placeholder(definition: &ModuleDefinition) -> Self {
        Self::new(&definition.id, &definition.name, &definition.version)
    }

    /// 挂载生命周期实现
    pub fn with_lifecycle(mut self, lifecycle: impl ModuleLifecycle + 'static) -> Self {
        self.lifecycle = Arc::new(lifecycle);
        self
    }

    /// 挂载共享的生命周期实现
    pub fn with_shared_lifecycle(mut self, lifecycle: Arc<dyn ModuleLifecycle>) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// 是否启用
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// 生命周期钩子
    pub fn lifecycle(&self) -> &dyn ModuleLifecycle {
        self.lifecycle.as_ref()
    }
}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// 健康状态
// ============================================================================

/// 健康状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// 已加载且启用
    Healthy,
    /// 已加载但禁用
    Degraded,
    /// 未加载
    Unknown,
    /// 已加载但健康检查失败或依赖缺失
    Unhealthy,
}

impl HealthStatus {
    /// 由加载与启用状态推导
    pub fn from_state(loaded: bool, enabled: bool) -> Self {
        match (loaded, enabled) {
            (false, _) => HealthStatus::Unknown,
            (true, true) => HealthStatus::Healthy,
            (true, false) => HealthStatus::Degraded,
        }
    }

    /// 是否为错误状态
    pub fn is_error(&self) -> bool {
        matches!(self, HealthStatus::Unhealthy)
    }

    /// 状态名称
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unknown => "unknown",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个依赖的健康汇总
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyHealth {
    /// 依赖模块 ID
    pub module_id: String,
    /// 依赖自身的状态
    pub status: HealthStatus,
}

/// 健康记录
#[derive(Debug, Clone, Serialize)]
pub struct HealthRecord {
    /// 模块 ID
    pub module_id: String,
    /// 汇总状态
    pub status: HealthStatus,
    /// 是否已加载
    pub loaded: bool,
    /// 是否启用
    pub enabled: bool,
    /// 各依赖状态
    pub dependencies: Vec<DependencyHealth>,
    /// 错误状态的原因
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// 检查时间
    pub checked_at: DateTime<Utc>,
}

impl HealthRecord {
    /// 是否健康
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}
