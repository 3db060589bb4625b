//! 事件总线与配置集成测试
//!
//! 测试事件发布订阅与配置文件加载的完整工作流程

use chips_orchestrator::events::{handler, Event, EventBus, EventBusConfig, SubscriptionToken};
use chips_orchestrator::{CoreError, OrchestratorConfig};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

// ============================================================================
// 事件总线集成测试
// ============================================================================

/// 测试完整的事件发布订阅流程
#[tokio::test]
async fn test_event_pub_sub_full_flow() {
    let bus = EventBus::new();
    let received = Arc::new(AtomicUsize::new(0));
    let received_clone = received.clone();

    let token = bus
        .subscribe(
            "user.created",
            handler(move |event| {
                assert_eq!(event.data["user_id"], "123");
                received_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
        .await;

    assert_eq!(
        bus.publish(Event::new("user.created", json!({"user_id": "123"})))
            .await,
        1
    );
    assert_eq!(received.load(Ordering::SeqCst), 1);

    // 取消订阅后不再收到
    assert!(bus.unsubscribe(&token).await);
    assert_eq!(bus.publish(Event::new("user.created", json!({}))).await, 0);
    assert_eq!(received.load(Ordering::SeqCst), 1);
    assert!(!bus.has_handlers("user.created").await);
}

/// 处理器按订阅顺序调用，失败与 panic 不影响其他处理器
#[tokio::test]
async fn test_handlers_isolated_and_ordered() {
    let bus = EventBus::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for label in ["first", "second", "third"] {
        let order = order.clone();
        bus.subscribe(
            "order.placed",
            handler(move |_| {
                order.lock().unwrap().push(label);
                match label {
                    "first" => anyhow::bail!("库存服务不可用"),
                    "second" => panic!("处理器崩溃"),
                    _ => Ok(()),
                }
            }),
        )
        .await;
    }

    let invoked = bus.publish(Event::new("order.placed", json!({}))).await;

    assert_eq!(invoked, 3);
    assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    let stats = bus.stats().await;
    assert_eq!(stats.successful, 1);
    assert_eq!(stats.failed, 2);
}

/// 分发期间的订阅变更不影响本次投递
#[tokio::test]
async fn test_subscription_changes_during_dispatch_use_snapshot() {
    let bus = EventBus::new();
    let late_calls = Arc::new(AtomicUsize::new(0));
    let victim_calls = Arc::new(AtomicUsize::new(0));
    let victim: Arc<Mutex<Option<SubscriptionToken>>> = Arc::new(Mutex::new(None));

    let bus_clone = bus.clone();
    let late = late_calls.clone();
    let target = victim.clone();
    bus.subscribe(
        "tick",
        handler(move |_| {
            let late = late.clone();
            futures::executor::block_on(bus_clone.subscribe(
                "tick",
                handler(move |_| {
                    late.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            ));
            if let Some(token) = target.lock().unwrap().take() {
                futures::executor::block_on(bus_clone.unsubscribe(&token));
            }
            Ok(())
        }),
    )
    .await;

    let counter = victim_calls.clone();
    let token = bus
        .subscribe(
            "tick",
            handler(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
        .await;
    *victim.lock().unwrap() = Some(token);

    assert_eq!(bus.publish(Event::new("tick", json!({}))).await, 2);
    assert_eq!(late_calls.load(Ordering::SeqCst), 0);
    assert_eq!(victim_calls.load(Ordering::SeqCst), 1);
    // 原处理器 + 新增处理器，被移除的处理器已不在列表中
    assert_eq!(bus.handler_count("tick").await, 2);
}

/// 清理事件与订阅
#[tokio::test]
async fn test_clear_events() {
    let bus = EventBus::new();
    for name in ["b.event", "a.event", "a.event"] {
        bus.subscribe(name, handler(|_| Ok(()))).await;
    }

    assert_eq!(bus.list_events().await, vec!["a.event", "b.event"]);
    assert_eq!(bus.subscription_count().await, 3);

    assert_eq!(bus.clear_event("a.event").await, 2);
    assert_eq!(bus.list_events().await, vec!["b.event"]);

    bus.clear_all().await;
    assert!(bus.list_events().await.is_empty());
    assert_eq!(bus.publish(Event::new("b.event", json!({}))).await, 0);
}

/// 高并发发布
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_publish() {
    let bus = EventBus::with_config(EventBusConfig {
        slow_handler_threshold_ms: 0,
    });
    let received = Arc::new(AtomicUsize::new(0));
    let counter = received.clone();
    bus.subscribe(
        "metric",
        handler(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    )
    .await;

    let mut tasks = Vec::new();
    for i in 0..50 {
        let bus = bus.clone();
        tasks.push(tokio::spawn(async move {
            bus.publish(Event::new("metric", json!({ "i": i }))).await
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), 1);
    }

    assert_eq!(received.load(Ordering::SeqCst), 50);
    assert_eq!(bus.stats().await.published, 50);
}

// ============================================================================
// 配置集成测试
// ============================================================================

/// 从 YAML 文件加载配置
#[tokio::test]
async fn test_load_yaml_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("orchestrator.yaml");
    tokio::fs::write(
        &path,
        r#"
logging:
  level: debug
  json_format: true
registry:
  health_check_interval_ms: 5000
  auto_load:
    - storage
    - editor
event_bus:
  slow_handler_threshold_ms: 20
"#,
    )
    .await
    .unwrap();

    let config = OrchestratorConfig::from_file(&path).await.unwrap();

    assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json_format);
    assert_eq!(config.registry.health_check_interval_ms, 5000);
    assert!(config.registry.health_checks_enabled);
    assert_eq!(config.registry.auto_load, vec!["storage", "editor"]);
    assert_eq!(config.event_bus.slow_handler_threshold_ms, 20);
}

/// 从 JSON 文件加载配置
#[tokio::test]
async fn test_load_json_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("orchestrator.json");
    tokio::fs::write(
        &path,
        r#"{"registry": {"health_checks_enabled": false}}"#,
    )
    .await
    .unwrap();

    let config = OrchestratorConfig::from_file(&path).await.unwrap();
    assert!(!config.registry.health_checks_enabled);
    assert_eq!(config.logging.level, "info");
}

/// 非法配置值在加载时被拒绝
#[tokio::test]
async fn test_invalid_config_file() {
    let dir = tempdir().unwrap();

    let zero = dir.path().join("zero.yaml");
    tokio::fs::write(&zero, "registry:\n  health_check_interval_ms: 0\n")
        .await
        .unwrap();
    let err = OrchestratorConfig::from_file(&zero).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidConfigValue { .. }));
    assert_eq!(err.error_code(), chips_orchestrator::error_code::CONFIG_INVALID_VALUE);

    let broken = dir.path().join("broken.yaml");
    tokio::fs::write(&broken, "registry: [not, a, map]\n")
        .await
        .unwrap();
    let err = OrchestratorConfig::from_file(&broken).await.unwrap_err();
    assert!(matches!(err, CoreError::ConfigLoadFailed(_)));
}

/// 文件配置与代码覆盖合并
#[tokio::test]
async fn test_file_config_merged_with_overrides() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("base.yaml");
    tokio::fs::write(&path, "registry:\n  auto_load: [storage]\n")
        .await
        .unwrap();

    let mut config = OrchestratorConfig::from_file(&path).await.unwrap();
    config.merge(
        OrchestratorConfig::builder()
            .log_level("warn")
            .auto_load("editor")
            .health_check_interval_ms(1_000)
            .build(),
    );

    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.registry.auto_load, vec!["storage", "editor"]);
    assert_eq!(config.registry.health_check_interval_ms, 1_000);
    assert!(config.validate().is_ok());
}
