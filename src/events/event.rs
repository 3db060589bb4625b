//! 生命周期事件数据结构

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::generate_uuid;

/// 内核发布的事件名称
pub mod lifecycle_events {
    /// 模块注册完成
    pub const MODULE_REGISTERED: &str = "MODULE_REGISTERED";
    /// 模块加载完成
    pub const MODULE_LOADED: &str = "MODULE_LOADED";
    /// 模块注册或加载失败
    pub const MODULE_LOAD_ERROR: &str = "MODULE_LOAD_ERROR";
    /// 模块卸载完成
    pub const MODULE_UNLOADED: &str = "MODULE_UNLOADED";
    /// 模块卸载失败
    pub const MODULE_UNLOAD_ERROR: &str = "MODULE_UNLOAD_ERROR";
    /// 模块已启用
    pub const MODULE_ENABLED: &str = "MODULE_ENABLED";
    /// 启用钩子失败
    pub const MODULE_ENABLE_ERROR: &str = "MODULE_ENABLE_ERROR";
    /// 模块已禁用
    pub const MODULE_DISABLED: &str = "MODULE_DISABLED";
    /// 禁用钩子失败
    pub const MODULE_DISABLE_ERROR: &str = "MODULE_DISABLE_ERROR";
    /// 周期健康检查发现错误状态
    pub const MODULE_HEALTH_ERROR: &str = "MODULE_HEALTH_ERROR";
    /// 模块定义已注销
    pub const MODULE_UNREGISTERED: &str = "MODULE_UNREGISTERED";

    /// 内核启动完成
    pub const KERNEL_STARTED: &str = "KERNEL_STARTED";
    /// 内核开始关闭
    pub const KERNEL_SHUTTING_DOWN: &str = "KERNEL_SHUTTING_DOWN";

    /// 模块生命周期事件全集
    pub const ALL_MODULE_EVENTS: &[&str] = &[
        MODULE_REGISTERED,
        MODULE_LOADED,
        MODULE_LOAD_ERROR,
        MODULE_UNLOADED,
        MODULE_UNLOAD_ERROR,
        MODULE_ENABLED,
        MODULE_ENABLE_ERROR,
        MODULE_DISABLED,
        MODULE_DISABLE_ERROR,
        MODULE_HEALTH_ERROR,
        MODULE_UNREGISTERED,
    ];
}

/// 事件
///
/// 序列化后的负载形如 `{type, module_id, timestamp, data}`，另附唯一的 `event_id`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// 事件唯一标识
    pub event_id: String,

    /// 事件名称
    #[serde(rename = "type")]
    pub event_type: String,

    /// 相关模块 ID，内核级事件为空
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,

    /// 事件时间戳
    pub timestamp: DateTime<Utc>,

    /// 附加数据
    #[serde(default)]
    pub data: Value,
}

impl Event {
    /// 创建内核级事件
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_id: generate_uuid(),
            event_type: event_type.into(),
            module_id: None,
            timestamp: Utc::now(),
            data,
        }
    }

    /// 创建与某个模块相关的事件
    pub fn for_module(
        event_type: impl Into<String>,
        module_id: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            module_id: Some(module_id.into()),
            ..Self::new(event_type, data)
        }
    }

    /// 是否为错误类事件
    pub fn is_error(&self) -> bool {
        self.event_type.ends_with("_ERROR")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_module_event() {
        let event = Event::for_module(lifecycle_events::MODULE_LOADED, "editor", json!({"v": 1}));
        assert_eq!(event.event_type, "MODULE_LOADED");
        assert_eq!(event.module_id.as_deref(), Some("editor"));
        assert!(!event.event_id.is_empty());
        assert!(!event.is_error());
    }

    #[test]
    fn test_payload_shape() {
        let event = Event::for_module(lifecycle_events::MODULE_ENABLE_ERROR, "m", json!(null));
        assert!(event.is_error());

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "MODULE_ENABLE_ERROR");
        assert_eq!(value["module_id"], "m");
        assert!(value.get("timestamp").is_some());
        assert!(value.get("data").is_some());
    }

    #[test]
    fn test_kernel_event_omits_module() {
        let event = Event::new(lifecycle_events::KERNEL_STARTED, json!({}));
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("module_id").is_none());
    }
}
