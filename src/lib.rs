//! # Chips Orchestrator - 模块生命周期编排
//!
//! 为宿主应用提供模块生命周期编排能力：
//!
//! - **事件总线**: 按事件名称的进程内发布/订阅，处理器错误与 panic 相互隔离
//! - **模块加载器**: 把模块定义实例化为驻留实例，并发加载共享同一次实例化
//! - **模块注册表**: 注册、依赖解析、加载、启用/禁用、卸载、健康检查与销毁
//! - **配置管理**: YAML/JSON 配置加载、合并与校验
//! - **日志系统**: 基于 tracing 的结构化日志
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use chips_orchestrator::module::{factory, ModuleDefinition, ModuleInstance};
//! use chips_orchestrator::{ModuleKernel, OrchestratorConfig};
//!
//! #[tokio::main]
//! async fn main() -> chips_orchestrator::Result<()> {
//!     let kernel = ModuleKernel::new(OrchestratorConfig::default())?;
//!
//!     kernel
//!         .register_module(ModuleDefinition::new(
//!             "storage",
//!             "存储",
//!             "1.0.0",
//!             factory(|ctx| async move {
//!                 Ok(ModuleInstance::new(ctx.module_id, "存储", "1.0.0"))
//!             }),
//!         ))
//!         .await?;
//!
//!     kernel.start().await?;
//!     kernel.load_module("storage").await?;
//!     kernel.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## 模块结构
//!
//! - `events` - 事件与事件总线
//! - `module` - 模块定义、加载器、注册表
//! - `core` - 配置与内核入口
//! - `utils` - 错误类型、日志与 ID 工具

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod core;
pub mod events;
pub mod module;
pub mod utils;

// 重导出常用类型，方便使用
pub use events::{lifecycle_events, handler, Event, EventBus, EventHandler, SubscriptionToken};

pub use module::{
    factory, Conflict, HealthRecord, HealthStatus, LoadOutcome, ModuleCategory,
    ModuleDefinition, ModuleInstance, ModuleLifecycle, ModuleLoader, ModuleRegistry,
};

pub use utils::{error_code, generate_token, generate_uuid, CoreError, ErrorKind, Result};
pub use utils::logger::{fields, LogGuard, Logger, LoggerConfig, LoggerConfigBuilder, RotationStrategy};

pub use self::core::{
    KernelHealth, KernelState, LogConfig, ModuleKernel, OrchestratorConfig,
    OrchestratorConfigBuilder, RegistryConfig,
};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
