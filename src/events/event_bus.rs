//! 事件总线
//!
//! 进程内发布-订阅代理：
//!
//! - 按事件名称精确订阅，订阅返回令牌，凭令牌取消
//! - 发布时先对处理器列表做快照，再按订阅顺序逐个调用
//! - 处理器返回错误或 panic 都只记录日志，不影响后续处理器，也不会传回发布方
//!
//! ```rust,no_run
//! use chips_orchestrator::events::{handler, Event, EventBus};
//!
//! #[tokio::main]
//! async fn main() {
//!     let bus = EventBus::new();
//!     let token = bus
//!         .subscribe("MODULE_LOADED", handler(|event: &Event| {
//!             println!("已加载: {:?}", event.module_id);
//!             Ok(())
//!         }))
//!         .await;
//!
//!     bus.publish(Event::for_module("MODULE_LOADED", "editor", serde_json::json!({}))).await;
//!     bus.unsubscribe(&token).await;
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

use crate::events::event::Event;
use crate::utils::generate_token;

/// 事件处理器
///
/// 处理器是同步调用的，返回的错误只会被记录。
pub type EventHandler = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

/// 由闭包构造 [`EventHandler`]
pub fn handler<F>(f: F) -> EventHandler
where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// 订阅令牌
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionToken {
    event_type: String,
    id: String,
}

impl SubscriptionToken {
    /// 订阅的事件名称
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// 令牌 ID
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.event_type, self.id)
    }
}

#[derive(Clone)]
struct HandlerEntry {
    id: String,
    handler: EventHandler,
    subscribed_at: DateTime<Utc>,
}

/// 分发统计
#[derive(Debug, Clone, Default)]
pub struct DispatchStats {
    /// 已发布事件数
    pub published: u64,
    /// 处理器调用总次数
    pub total_dispatched: u64,
    /// 成功次数
    pub successful: u64,
    /// 失败次数（含 panic）
    pub failed: u64,
    /// 超过慢处理阈值的次数
    pub slow: u64,
    /// 最后分发时间
    pub last_dispatch_at: Option<DateTime<Utc>>,
}

/// 事件总线配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBusConfig {
    /// 慢处理器告警阈值（毫秒），0 表示不检查
    #[serde(default = "default_slow_handler_threshold_ms")]
    pub slow_handler_threshold_ms: u64,
}

fn default_slow_handler_threshold_ms() -> u64 {
    100
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            slow_handler_threshold_ms: default_slow_handler_threshold_ms(),
        }
    }
}

enum DispatchResult {
    Success,
    Failed(String),
}

/// 事件总线
///
/// 内部状态由 `Arc<RwLock>` 持有，克隆得到的是同一条总线。
#[derive(Clone)]
pub struct EventBus {
    /// 事件名称 -> 按订阅顺序排列的处理器
    handlers: Arc<RwLock<HashMap<String, Vec<HandlerEntry>>>>,
    stats: Arc<RwLock<DispatchStats>>,
    config: EventBusConfig,
}

impl EventBus {
    /// 创建事件总线
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// 使用自定义配置创建事件总线
    pub fn with_config(config: EventBusConfig) -> Self {
        debug!(
            slow_handler_threshold_ms = config.slow_handler_threshold_ms,
            "创建事件总线"
        );
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(DispatchStats::default())),
            config,
        }
    }

    /// 订阅事件
    ///
    /// 同一个处理器重复订阅会得到相互独立的多次投递。
    pub async fn subscribe(
        &self,
        event_type: impl Into<String>,
        handler: EventHandler,
    ) -> SubscriptionToken {
        let event_type = event_type.into();
        let entry = HandlerEntry {
            id: generate_token(),
            handler,
            subscribed_at: Utc::now(),
        };
        let token = SubscriptionToken {
            event_type: event_type.clone(),
            id: entry.id.clone(),
        };

        self.handlers
            .write()
            .await
            .entry(event_type)
            .or_default()
            .push(entry);

        debug!(subscription = %token, "订阅事件");
        token
    }

    /// 取消订阅
    ///
    /// 未知令牌被静默忽略，返回是否确实移除了订阅。处理器列表清空后事件条目一并移除。
    pub async fn unsubscribe(&self, token: &SubscriptionToken) -> bool {
        let mut handlers = self.handlers.write().await;
        let Some(entries) = handlers.get_mut(&token.event_type) else {
            return false;
        };

        let removed = match entries.iter().position(|e| e.id == token.id) {
            Some(pos) => {
                let entry = entries.remove(pos);
                debug!(subscription = %token, subscribed_at = %entry.subscribed_at, "取消订阅");
                true
            }
            None => false,
        };

        if entries.is_empty() {
            handlers.remove(&token.event_type);
        }
        removed
    }

    /// 发布事件
    ///
    /// 返回被调用的处理器数量；没有处理器时返回 0。
    pub async fn publish(&self, event: Event) -> usize {
        // 快照：分发期间的订阅变更不影响本次投递
        let snapshot: Vec<HandlerEntry> = {
            let handlers = self.handlers.read().await;
            match handlers.get(&event.event_type) {
                Some(entries) => entries.clone(),
                None => Vec::new(),
            }
        };

        if snapshot.is_empty() {
            trace!(event_type = %event.event_type, "事件无订阅者");
            self.stats.write().await.published += 1;
            return 0;
        }

        let threshold = Duration::from_millis(self.config.slow_handler_threshold_ms);
        let mut successful = 0u64;
        let mut failed = 0u64;
        let mut slow = 0u64;

        for entry in &snapshot {
            let started = Instant::now();
            let result = Self::invoke_handler(&entry.handler, &event);
            let elapsed = started.elapsed();

            match result {
                DispatchResult::Success => successful += 1,
                DispatchResult::Failed(reason) => {
                    failed += 1;
                    warn!(
                        event_type = %event.event_type,
                        subscription = %entry.id,
                        error = %reason,
                        "事件处理失败"
                    );
                }
            }

            if !threshold.is_zero() && elapsed > threshold {
                slow += 1;
                warn!(
                    event_type = %event.event_type,
                    subscription = %entry.id,
                    duration_ms = elapsed.as_millis() as u64,
                    "事件处理器耗时过长"
                );
            }
        }

        let mut stats = self.stats.write().await;
        stats.published += 1;
        stats.total_dispatched += snapshot.len() as u64;
        stats.successful += successful;
        stats.failed += failed;
        stats.slow += slow;
        stats.last_dispatch_at = Some(Utc::now());

        snapshot.len()
    }

    fn invoke_handler(handler: &EventHandler, event: &Event) -> DispatchResult {
        let outcome =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(event)));

        match outcome {
            Ok(Ok(())) => DispatchResult::Success,
            Ok(Err(e)) => DispatchResult::Failed(format!("{:#}", e)),
            Err(_) => DispatchResult::Failed("处理器 panic".to_string()),
        }
    }

    /// 事件是否有处理器
    pub async fn has_handlers(&self, event_type: &str) -> bool {
        self.handlers
            .read()
            .await
            .get(event_type)
            .is_some_and(|v| !v.is_empty())
    }

    /// 当前有订阅的事件名称（字典序）
    pub async fn list_events(&self) -> Vec<String> {
        let mut events: Vec<String> = self.handlers.read().await.keys().cloned().collect();
        events.sort();
        events
    }

    /// 移除某个事件的全部订阅，返回移除数量
    pub async fn clear_event(&self, event_type: &str) -> usize {
        let removed = self
            .handlers
            .write()
            .await
            .remove(event_type)
            .map_or(0, |v| v.len());
        debug!(event_type, removed, "清空事件订阅");
        removed
    }

    /// 移除所有订阅
    pub async fn clear_all(&self) {
        self.handlers.write().await.clear();
        debug!("清空全部事件订阅");
    }

    /// 订阅总数
    pub async fn subscription_count(&self) -> usize {
        self.handlers.read().await.values().map(Vec::len).sum()
    }

    /// 某个事件的订阅数
    pub async fn handler_count(&self, event_type: &str) -> usize {
        self.handlers
            .read()
            .await
            .get(event_type)
            .map_or(0, Vec::len)
    }

    /// 分发统计副本
    pub async fn stats(&self) -> DispatchStats {
        self.stats.read().await.clone()
    }

    /// 重置统计
    pub async fn reset_stats(&self) {
        *self.stats.write().await = DispatchStats::default();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
