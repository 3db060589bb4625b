//! 基本使用示例
//!
//! 本示例展示了模块编排内核的基本使用方法，包括：
//!
//! - 创建并启动内核
//! - 订阅生命周期事件
//! - 注册带依赖的模块并加载
//! - 启用/禁用、健康检查与冲突检测
//! - 关闭内核
//!
//! # 运行示例
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use async_trait::async_trait;
use chips_orchestrator::module::{
    factory, ModuleCategory, ModuleDefinition, ModuleInstance, ModuleLifecycle,
};
use chips_orchestrator::{
    handler, lifecycle_events, Logger, LoggerConfig, ModuleKernel, OrchestratorConfig,
};

/// 带启动/停止输出的存储模块
struct Storage;

#[async_trait]
impl ModuleLifecycle for Storage {
    async fn start(&self) -> anyhow::Result<()> {
        println!("   [storage] 已连接");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        println!("   [storage] 已断开");
        Ok(())
    }
}

fn simple(id: &str, name: &str) -> ModuleDefinition {
    let display = name.to_string();
    ModuleDefinition::new(
        id,
        name,
        "1.0.0",
        factory(move |ctx| {
            let display = display.clone();
            async move { Ok(ModuleInstance::new(ctx.module_id, display, "1.0.0")) }
        }),
    )
}

/// 主函数
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = OrchestratorConfig::builder()
        .log_level("warn")
        .health_check_interval_ms(5_000)
        .auto_load("storage")
        .build();
    let _guard = Logger::init(LoggerConfig::from_log_config(&config.logging))?;

    println!("=== 模块编排内核基本使用示例 ===\n");

    // -------------------------------------------------------------------------
    // 1. 创建内核
    // -------------------------------------------------------------------------
    println!("1. 创建内核...");
    let kernel = ModuleKernel::new(config)?;

    for name in lifecycle_events::ALL_MODULE_EVENTS {
        kernel
            .event_bus()
            .subscribe(
                *name,
                handler(|e| {
                    println!(
                        "   事件 {} -> {}",
                        e.event_type,
                        e.module_id.as_deref().unwrap_or("-")
                    );
                    Ok(())
                }),
            )
            .await;
    }
    println!("   ✅ 内核创建成功\n");

    // -------------------------------------------------------------------------
    // 2. 注册模块
    // -------------------------------------------------------------------------
    println!("2. 注册模块...");
    kernel
        .register_module(
            ModuleDefinition::new(
                "storage",
                "存储",
                "1.0.0",
                factory(|ctx| async move {
                    Ok(ModuleInstance::new(ctx.module_id, "存储", "1.0.0").with_lifecycle(Storage))
                }),
            )
            .with_category(ModuleCategory::Infrastructure)
            .provides("kv"),
        )
        .await?;
    kernel
        .register_module(
            simple("editor", "编辑器")
                .with_category(ModuleCategory::Feature)
                .depends_on("storage"),
        )
        .await?;
    kernel
        .register_module(simple("cache", "缓存").provides("kv"))
        .await?;
    println!();

    // -------------------------------------------------------------------------
    // 3. 启动并加载
    // -------------------------------------------------------------------------
    println!("3. 启动内核并加载 editor...");
    kernel.start().await?;
    kernel.load_module("editor").await?;
    println!(
        "   初始化顺序: {:?}\n",
        kernel.registry().get_initialization_order().await
    );

    // -------------------------------------------------------------------------
    // 4. 依赖保护
    // -------------------------------------------------------------------------
    println!("4. 尝试卸载仍被依赖的 storage...");
    if let Err(e) = kernel.unload_module("storage").await {
        println!("   预期的失败: {} (code={})\n", e, e.error_code());
    }

    // -------------------------------------------------------------------------
    // 5. 健康与冲突
    // -------------------------------------------------------------------------
    println!("5. 禁用 editor 并查看健康状态...");
    kernel.registry().disable_module("editor").await?;
    let record = kernel.registry().get_module_health("editor").await;
    println!("   editor: {}", record.status);
    for conflict in kernel.registry().find_conflicts().await {
        println!(
            "   能力冲突: '{}' 同时由 {} 和 {} 提供",
            conflict.capability, conflict.first, conflict.second
        );
    }
    println!();

    // -------------------------------------------------------------------------
    // 6. 关闭
    // -------------------------------------------------------------------------
    println!("6. 关闭内核...");
    let health = kernel.health().await;
    println!(
        "   已注册 {} 个模块，已加载 {} 个，已分发 {} 次事件",
        health.registered, health.loaded, health.events_dispatched
    );
    kernel.shutdown().await?;
    println!("   ✅ 内核已关闭");

    Ok(())
}
