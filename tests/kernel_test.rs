//! 模块内核端到端测试
//!
//! 从配置文件启动内核，自动加载模块，运行期操作，最后关闭

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chips_orchestrator::events::handler;
use chips_orchestrator::module::{factory, ModuleDefinition, ModuleInstance, ModuleLifecycle};
use chips_orchestrator::{
    lifecycle_events, KernelState, LoadOutcome, Logger, LoggerConfig, ModuleKernel,
    OrchestratorConfig,
};
use tempfile::tempdir;

/// 记录 start/destroy 调用次数
struct Tracked {
    started: Arc<AtomicUsize>,
    destroyed: Arc<AtomicUsize>,
}

#[async_trait]
impl ModuleLifecycle for Tracked {
    async fn start(&self) -> anyhow::Result<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn destroy(&self) -> anyhow::Result<()> {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn tracked_module(
    id: &str,
    started: &Arc<AtomicUsize>,
    destroyed: &Arc<AtomicUsize>,
) -> ModuleDefinition {
    let started = started.clone();
    let destroyed = destroyed.clone();
    ModuleDefinition::new(
        id,
        id,
        "1.0.0",
        factory(move |ctx| {
            let lifecycle = Tracked {
                started: started.clone(),
                destroyed: destroyed.clone(),
            };
            async move {
                Ok(ModuleInstance::new(ctx.module_id, "追踪模块", "1.0.0").with_lifecycle(lifecycle))
            }
        }),
    )
}

#[tokio::test]
async fn test_kernel_full_lifecycle_from_config_file() {
    let _guard = Logger::try_init(LoggerConfig::builder().level("debug").build());

    let dir = tempdir().unwrap();
    let path = dir.path().join("kernel.yaml");
    tokio::fs::write(
        &path,
        "registry:\n  health_check_interval_ms: 60000\n  auto_load: [editor]\n",
    )
    .await
    .unwrap();

    let config = OrchestratorConfig::from_file(&path).await.unwrap();
    let kernel = ModuleKernel::new(config).unwrap();

    let kernel_events = Arc::new(Mutex::new(Vec::new()));
    for name in [
        lifecycle_events::KERNEL_STARTED,
        lifecycle_events::KERNEL_SHUTTING_DOWN,
        lifecycle_events::MODULE_UNLOADED,
    ] {
        let sink = kernel_events.clone();
        kernel
            .event_bus()
            .subscribe(
                name,
                handler(move |e| {
                    sink.lock().unwrap().push(e.clone());
                    Ok(())
                }),
            )
            .await;
    }

    let started = Arc::new(AtomicUsize::new(0));
    let destroyed = Arc::new(AtomicUsize::new(0));
    kernel
        .register_module(tracked_module("storage", &started, &destroyed))
        .await
        .unwrap();
    kernel
        .register_module(tracked_module("editor", &started, &destroyed).depends_on("storage"))
        .await
        .unwrap();
    kernel
        .register_module(tracked_module("preview", &started, &destroyed).depends_on("editor"))
        .await
        .unwrap();

    kernel.start().await.unwrap();
    assert_eq!(kernel.state().await, KernelState::Running);
    assert_eq!(started.load(Ordering::SeqCst), 2);

    {
        let events = kernel_events.lock().unwrap();
        assert_eq!(events[0].event_type, lifecycle_events::KERNEL_STARTED);
        assert_eq!(events[0].data["auto_loaded"][0], "editor");
        assert!(events[0].module_id.is_none());
    }

    // 运行期加载
    assert_eq!(
        kernel.load_module("preview").await.unwrap(),
        LoadOutcome::Loaded
    );
    assert_eq!(
        kernel.registry().get_initialization_order().await,
        vec!["storage", "editor", "preview"]
    );

    let health = kernel.health().await;
    assert_eq!(health.registered, 3);
    assert_eq!(health.loaded, 3);
    assert_eq!(health.event_subscriptions, 3);

    kernel.shutdown().await.unwrap();

    assert_eq!(destroyed.load(Ordering::SeqCst), 3);
    let events = kernel_events.lock().unwrap();
    let sequence: Vec<String> = events
        .iter()
        .map(|e| format!("{}:{}", e.event_type, e.module_id.clone().unwrap_or_default()))
        .collect();
    assert_eq!(
        sequence,
        vec![
            "KERNEL_STARTED:",
            "KERNEL_SHUTTING_DOWN:",
            "MODULE_UNLOADED:preview",
            "MODULE_UNLOADED:editor",
            "MODULE_UNLOADED:storage",
        ]
    );
}

#[tokio::test]
async fn test_shutdown_without_start() {
    let kernel = ModuleKernel::new(OrchestratorConfig::default()).unwrap();
    let started = Arc::new(AtomicUsize::new(0));
    let destroyed = Arc::new(AtomicUsize::new(0));
    kernel
        .register_module(tracked_module("solo", &started, &destroyed))
        .await
        .unwrap();
    kernel.load_module("solo").await.unwrap();

    kernel.shutdown().await.unwrap();

    assert_eq!(kernel.state().await, KernelState::Shutdown);
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    assert!(kernel.start().await.is_err());
}

#[tokio::test]
async fn test_bus_subscriptions_survive_shutdown() {
    let kernel = ModuleKernel::new(OrchestratorConfig::default()).unwrap();
    kernel
        .event_bus()
        .subscribe("custom.event", handler(|_| Ok(())))
        .await;

    kernel.start().await.unwrap();
    kernel.shutdown().await.unwrap();

    assert!(kernel.event_bus().has_handlers("custom.event").await);
    assert_eq!(kernel.registry().registered_count().await, 0);
}
