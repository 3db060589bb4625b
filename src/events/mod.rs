//! 事件系统
//!
//! 生命周期事件的数据结构与进程内事件总线。

pub mod event;
pub mod event_bus;

pub use event::{lifecycle_events, Event};
pub use event_bus::{
    handler, DispatchStats, EventBus, EventBusConfig, EventHandler, SubscriptionToken,
};
