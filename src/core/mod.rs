//! 核心模块
//!
//! 包含编排器配置与内核入口。

pub mod config;
pub mod kernel;

pub use config::{LogConfig, OrchestratorConfig, OrchestratorConfigBuilder, RegistryConfig};
pub use kernel::{KernelHealth, KernelState, ModuleKernel};
