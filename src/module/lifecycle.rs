//! 模块生命周期钩子
//!
//! 模块实现方通过 [`ModuleLifecycle`] 接入内核，所有钩子都有空实现的默认值。
//! 内核只经由 [`invoke`] 调用钩子，统一记录日志与耗时。

use std::fmt;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::metadata::ModuleInstance;

/// 生命周期钩子接口
#[async_trait]
pub trait ModuleLifecycle: Send + Sync {
    /// 实例创建后、启动前调用
    async fn initialize(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// 启动
    async fn start(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// 停止，卸载时先于 `destroy` 调用
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// 销毁
    async fn destroy(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// 启用
    async fn on_enable(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// 禁用
    async fn on_disable(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// 周期健康检查，返回错误表示模块不健康
    async fn health_check(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// 空生命周期，注册阶段的占位实例使用
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLifecycle;

impl ModuleLifecycle for NoopLifecycle {}

/// 生命周期钩子
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    /// [`ModuleLifecycle::initialize`]
    Initialize,
    /// [`ModuleLifecycle::start`]
    Start,
    /// [`ModuleLifecycle::stop`]
    Stop,
    /// [`ModuleLifecycle::destroy`]
    Destroy,
    /// [`ModuleLifecycle::on_enable`]
    Enable,
    /// [`ModuleLifecycle::on_disable`]
    Disable,
    /// [`ModuleLifecycle::health_check`]
    HealthCheck,
}

impl Hook {
    /// 钩子名称
    pub fn name(&self) -> &'static str {
        match self {
            Hook::Initialize => "initialize",
            Hook::Start => "start",
            Hook::Stop => "stop",
            Hook::Destroy => "destroy",
            Hook::Enable => "on_enable",
            Hook::Disable => "on_disable",
            Hook::HealthCheck => "health_check",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 调用模块的某个钩子
pub async fn invoke(module: &ModuleInstance, hook: Hook) -> anyhow::Result<()> {
    let lifecycle = module.lifecycle();
    let started = Instant::now();

    let result = match hook {
        Hook::Initialize => lifecycle.initialize().await,
        Hook::Start => lifecycle.start().await,
        Hook::Stop => lifecycle.stop().await,
        Hook::Destroy => lifecycle.destroy().await,
        Hook::Enable => lifecycle.on_enable().await,
        Hook::Disable => lifecycle.on_disable().await,
        Hook::HealthCheck => lifecycle.health_check().await,
    };

    let duration_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok(()) => debug!(module_id = %module.id, hook = %hook, duration_ms, "钩子调用成功"),
        Err(e) => warn!(
            module_id = %module.id,
            hook = %hook,
            duration_ms,
            error = %e,
            "钩子调用失败"
        ),
    }
    result
}
