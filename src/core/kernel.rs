//! 模块内核
//!
//! 编排器的对外入口。组合事件总线与模块注册表，管理整体启动与关闭：
//!
//! 1. `new()` - 校验配置并创建子系统
//! 2. `start()` - 加载 `auto_load` 中的模块，发布 `KERNEL_STARTED`
//! 3. `shutdown()` - 发布 `KERNEL_SHUTTING_DOWN`，销毁注册表
//!
//! ```rust,no_run
//! use chips_orchestrator::{ModuleKernel, OrchestratorConfig};
//!
//! #[tokio::main]
//! async fn main() -> chips_orchestrator::Result<()> {
//!     let config = OrchestratorConfig::builder().log_level("info").build();
//!     let kernel = ModuleKernel::new(config)?;
//!
//!     kernel.start().await?;
//!     // ... 注册并加载模块 ...
//!     kernel.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::config::OrchestratorConfig;
use crate::events::{lifecycle_events, Event, EventBus};
use crate::module::{LoadOutcome, ModuleDefinition, ModuleRegistry};
use crate::utils::{CoreError, Result};

// ============================================================================
// 内核状态
// ============================================================================

/// 内核状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelState {
    /// 已创建，尚未启动
    Initialized,
    /// 运行中
    Running,
    /// 正在关闭
    ShuttingDown,
    /// 已关闭
    Shutdown,
}

impl KernelState {
    /// 检查是否可以启动
    pub fn can_start(&self) -> bool {
        matches!(self, KernelState::Initialized)
    }

    /// 检查是否可以关闭
    pub fn can_shutdown(&self) -> bool {
        matches!(self, KernelState::Initialized | KernelState::Running)
    }

    /// 检查是否正在运行
    pub fn is_running(&self) -> bool {
        matches!(self, KernelState::Running)
    }
}

// ============================================================================
// ModuleKernel
// ============================================================================

/// 模块内核
pub struct ModuleKernel {
    config: OrchestratorConfig,
    state: RwLock<KernelState>,
    event_bus: EventBus,
    registry: Arc<ModuleRegistry>,
    started_at: RwLock<Option<Instant>>,
}

impl ModuleKernel {
    /// 创建内核
    ///
    /// 配置校验失败时返回 `CONFIG_ERROR`。
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        config.validate()?;
        info!("初始化模块内核 v{}", crate::VERSION);

        let event_bus = EventBus::with_config(config.event_bus.clone());
        debug!("事件总线初始化完成");

        let registry = Arc::new(ModuleRegistry::with_config(
            event_bus.clone(),
            config.registry.clone(),
        ));
        debug!("模块注册表初始化完成");

        Ok(Self {
            config,
            state: RwLock::new(KernelState::Initialized),
            event_bus,
            registry,
            started_at: RwLock::new(None),
        })
    }

    /// 启动内核
    ///
    /// 依次加载 `auto_load` 中的模块，单个模块失败只记录日志。
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.can_start() {
            return Err(CoreError::InitFailed(format!(
                "内核当前状态 {:?} 不允许启动",
                *state
            )));
        }

        info!("启动模块内核...");

        let mut loaded = Vec::new();
        let mut failed = Vec::new();
        for module_id in &self.config.registry.auto_load {
            match self.registry.load_module(module_id, false).await {
                Ok(_) => loaded.push(module_id.clone()),
                Err(e) => {
                    warn!(module_id = %module_id, error = %e, "自动加载模块失败");
                    failed.push(module_id.clone());
                }
            }
        }

        self.event_bus
            .publish(Event::new(
                lifecycle_events::KERNEL_STARTED,
                json!({
                    "version": crate::VERSION,
                    "auto_loaded": loaded,
                    "failed": failed,
                }),
            ))
            .await;

        *state = KernelState::Running;
        *self.started_at.write().await = Some(Instant::now());

        info!("模块内核已启动");
        Ok(())
    }

    /// 关闭内核，重复调用无副作用
    pub async fn shutdown(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.can_shutdown() {
            return Ok(());
        }

        info!("正在关闭模块内核...");
        *state = KernelState::ShuttingDown;

        self.event_bus
            .publish(Event::new(
                lifecycle_events::KERNEL_SHUTTING_DOWN,
                json!({ "uptime_secs": self.uptime_secs().await }),
            ))
            .await;

        self.registry.destroy().await;
        debug!("模块注册表已销毁");

        *state = KernelState::Shutdown;
        info!("模块内核已关闭");
        Ok(())
    }

    // ========================================================================
    // 便捷模块 API
    // ========================================================================

    /// 注册模块
    pub async fn register_module(&self, definition: ModuleDefinition) -> Result<()> {
        self.registry.register_module(definition).await
    }

    /// 加载模块
    pub async fn load_module(&self, module_id: &str) -> Result<LoadOutcome> {
        self.registry.load_module(module_id, false).await
    }

    /// 卸载模块（非强制）
    pub async fn unload_module(&self, module_id: &str) -> Result<bool> {
        self.registry.unload_module(module_id, false).await
    }

    // ========================================================================
    // 访问器
    // ========================================================================

    /// 内核状态
    pub async fn state(&self) -> KernelState {
        *self.state.read().await
    }

    /// 检查内核是否正在运行
    pub async fn is_running(&self) -> bool {
        self.state.read().await.is_running()
    }

    /// 配置
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// 事件总线
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// 模块注册表
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    async fn uptime_secs(&self) -> Option<u64> {
        self.started_at.read().await.map(|t| t.elapsed().as_secs())
    }

    /// 获取健康状态
    pub async fn health(&self) -> KernelHealth {
        let event_stats = self.event_bus.stats().await;

        KernelHealth {
            state: self.state().await,
            uptime_secs: self.uptime_secs().await,
            registered: self.registry.registered_count().await,
            loaded: self.registry.loaded_count().await,
            event_subscriptions: self.event_bus.subscription_count().await,
            events_dispatched: event_stats.total_dispatched,
        }
    }
}

impl Drop for ModuleKernel {
    fn drop(&mut self) {
        debug!("模块内核实例被释放");
    }
}

// ============================================================================
// 健康信息
// ============================================================================

/// 内核健康信息
#[derive(Debug, Clone, Serialize)]
pub struct KernelHealth {
    /// 内核状态
    pub state: KernelState,
    /// 运行时间（秒）
    pub uptime_secs: Option<u64>,
    /// 已注册模块数
    pub registered: usize,
    /// 已加载模块数
    pub loaded: usize,
    /// 事件订阅数
    pub event_subscriptions: usize,
    /// 已分发事件数
    pub events_dispatched: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::handler;
    use crate::module::{factory, ModuleInstance};
    use std::sync::Mutex;

    fn simple_module(id: &str) -> ModuleDefinition {
        ModuleDefinition::new(
            id,
            id,
            "1.0.0",
            factory(|ctx| async move { Ok(ModuleInstance::new(ctx.module_id, "简单模块", "1.0.0")) }),
        )
    }

    #[tokio::test]
    async fn test_kernel_creation() {
        let kernel = ModuleKernel::new(OrchestratorConfig::default()).unwrap();
        assert_eq!(kernel.state().await, KernelState::Initialized);
        assert!(!kernel.is_running().await);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = OrchestratorConfig::builder()
            .health_check_interval_ms(0)
            .build();
        assert!(ModuleKernel::new(config).is_err());
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let kernel = ModuleKernel::new(OrchestratorConfig::default()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for name in [
            lifecycle_events::KERNEL_STARTED,
            lifecycle_events::KERNEL_SHUTTING_DOWN,
        ] {
            let sink = seen.clone();
            kernel
                .event_bus()
                .subscribe(
                    name,
                    handler(move |e| {
                        sink.lock().unwrap().push(e.event_type.clone());
                        Ok(())
                    }),
                )
                .await;
        }

        kernel.start().await.unwrap();
        assert!(kernel.is_running().await);
        assert!(kernel.start().await.is_err());

        kernel.shutdown().await.unwrap();
        assert_eq!(kernel.state().await, KernelState::Shutdown);
        kernel.shutdown().await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["KERNEL_STARTED", "KERNEL_SHUTTING_DOWN"]
        );
    }

    #[tokio::test]
    async fn test_auto_load_and_health() {
        let config = OrchestratorConfig::builder()
            .auto_load("editor")
            .auto_load("missing")
            .build();
        let kernel = ModuleKernel::new(config).unwrap();
        kernel.register_module(simple_module("storage")).await.unwrap();
        kernel
            .register_module(simple_module("editor").depends_on("storage"))
            .await
            .unwrap();

        // 缺失的模块不影响启动
        kernel.start().await.unwrap();

        let health = kernel.health().await;
        assert_eq!(health.state, KernelState::Running);
        assert_eq!(health.registered, 2);
        assert_eq!(health.loaded, 2);

        kernel.shutdown().await.unwrap();
        assert_eq!(kernel.health().await.loaded, 0);
    }
}
