//! 模块管理
//!
//! 包含模块生命周期编排的核心组件：
//! - 模块定义、实例与健康记录
//! - 生命周期钩子
//! - 依赖图
//! - 加载器（并发去重）
//! - 注册表（生命周期编排）
//! - 清单解析

pub mod dependency;
pub mod lifecycle;
pub mod loader;
pub mod metadata;
pub mod parser;
pub mod registry;

// 重导出常用类型
pub use dependency::DependencyGraph;
pub use lifecycle::{Hook, ModuleLifecycle, NoopLifecycle};
pub use loader::ModuleLoader;
pub use metadata::{
    factory, DependencyHealth, HealthRecord, HealthStatus, ModuleCategory, ModuleContext,
    ModuleDefinition, ModuleFactory, ModuleInstance,
};
pub use parser::{ModuleManifest, ModuleParser};
pub use registry::{Conflict, LoadOutcome, ModuleRegistry};
