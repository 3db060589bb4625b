//! 模块注册表
//!
//! 编排模块的完整生命周期：注册 → 解析依赖 → 加载 → 启用/禁用 → 卸载 → 销毁。
//!
//! 注册表持有模块定义、依赖图、加载队列、初始化顺序和健康检查任务，
//! 组合 [`EventBus`] 与 [`ModuleLoader`] 完成工作。内部锁不会跨越工厂或钩子调用。
//!
//! ```rust,no_run
//! use chips_orchestrator::events::EventBus;
//! use chips_orchestrator::module::{factory, ModuleDefinition, ModuleInstance, ModuleRegistry};
//!
//! #[tokio::main]
//! async fn main() -> chips_orchestrator::Result<()> {
//!     let registry = ModuleRegistry::new(EventBus::new());
//!     let make = |id: &str| {
//!         ModuleDefinition::new(id, id, "1.0.0", factory(|ctx| async move {
//!             Ok(ModuleInstance::new(ctx.module_id.clone(), ctx.module_id, "1.0.0"))
//!         }))
//!     };
//!
//!     registry.register_module(make("storage")).await?;
//!     registry.register_module(make("editor").depends_on("storage")).await?;
//!     registry.load_module("editor", false).await?;
//!
//!     assert_eq!(registry.get_initialization_order().await, vec!["storage", "editor"]);
//!     registry.destroy().await;
//!     Ok(())
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, trace, warn};

use super::dependency::DependencyGraph;
use super::lifecycle::{self, Hook};
use super::loader::ModuleLoader;
use super::metadata::{
    DependencyHealth, HealthRecord, HealthStatus, ModuleDefinition, ModuleInstance,
};
use crate::core::config::RegistryConfig;
use crate::events::{lifecycle_events, Event, EventBus};
use crate::utils::{CoreError, Result};

/// `load_module` 的结果
///
/// 除 `Loaded` 外均为告警而非错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// 本次调用完成了加载
    Loaded,
    /// 模块已加载，未做任何事
    AlreadyLoaded,
    /// 模块正在加载中，未做任何事
    AlreadyLoading,
}

/// 能力冲突：两个已注册模块声明提供同一能力
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    /// 能力标识
    pub capability: String,
    /// 先注册的模块
    pub first: String,
    /// 后注册的模块
    pub second: String,
}

#[derive(Default)]
struct RegistryState {
    definitions: HashMap<String, ModuleDefinition>,
    /// 注册顺序
    registration_order: Vec<String>,
    /// 注册时创建的占位实例
    placeholders: HashMap<String, Arc<ModuleInstance>>,
    loaded: HashMap<String, Arc<ModuleInstance>>,
    initialization_order: Vec<String>,
    graph: DependencyGraph,
}

impl RegistryState {
    /// 由加载/启用状态推导健康记录，返回已加载实例供调用健康检查钩子
    fn derive_health(&self, module_id: &str) -> (HealthRecord, Option<Arc<ModuleInstance>>) {
        let instance = self.loaded.get(module_id).cloned();
        let loaded = instance.is_some();
        let enabled = instance.as_ref().is_some_and(|m| m.is_enabled());

        let dependencies: Vec<DependencyHealth> = self
            .graph
            .dependencies(module_id)
            .into_iter()
            .map(|dep| {
                let status = match self.loaded.get(&dep) {
                    Some(m) => HealthStatus::from_state(true, m.is_enabled()),
                    None => HealthStatus::Unknown,
                };
                DependencyHealth {
                    module_id: dep,
                    status,
                }
            })
            .collect();

        let mut status = HealthStatus::from_state(loaded, enabled);
        let mut reason = None;

        let missing: Vec<&str> = dependencies
            .iter()
            .filter(|d| d.status == HealthStatus::Unknown)
            .map(|d| d.module_id.as_str())
            .collect();
        if loaded && !missing.is_empty() {
            status = HealthStatus::Unhealthy;
            reason = Some(format!("依赖未加载: {:?}", missing));
        }

        let record = HealthRecord {
            module_id: module_id.to_string(),
            status,
            loaded,
            enabled,
            dependencies,
            reason,
            checked_at: Utc::now(),
        };
        (record, instance)
    }
}

/// 推导健康记录并调用模块的健康检查钩子
async fn evaluate_health(state: &RwLock<RegistryState>, module_id: &str) -> HealthRecord {
    let (mut record, instance) = state.read().await.derive_health(module_id);

    if let Some(instance) = instance {
        if !record.status.is_error() {
            if let Err(e) = lifecycle::invoke(&instance, Hook::HealthCheck).await {
                record.status = HealthStatus::Unhealthy;
                record.reason = Some(format!("健康检查失败: {:#}", e));
            }
        }
    }
    record
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 加载队列中的一个占位，丢弃时出队并唤醒等待者
struct QueueSlot {
    queue: Arc<Mutex<HashSet<String>>>,
    notify: Arc<Notify>,
    module_id: String,
}

impl Drop for QueueSlot {
    fn drop(&mut self) {
        lock(&self.queue).remove(&self.module_id);
        self.notify.notify_waiters();
    }
}

/// 模块注册表
pub struct ModuleRegistry {
    state: Arc<RwLock<RegistryState>>,
    /// 正在加载的模块 ID
    load_queue: Arc<Mutex<HashSet<String>>>,
    /// 任一加载结束时通知
    load_finished: Arc<Notify>,
    health_tasks: Mutex<HashMap<String, JoinHandle<()>>>,
    loader: ModuleLoader,
    bus: EventBus,
    config: RegistryConfig,
}

impl ModuleRegistry {
    /// 使用默认配置创建注册表
    pub fn new(bus: EventBus) -> Self {
        Self::with_config(bus, RegistryConfig::default())
    }

    /// 使用指定配置创建注册表
    pub fn with_config(bus: EventBus, config: RegistryConfig) -> Self {
        info!(
            health_check_interval_ms = config.health_check_interval_ms,
            health_checks_enabled = config.health_checks_enabled,
            "创建模块注册表"
        );
        Self {
            state: Arc::new(RwLock::new(RegistryState::default())),
            load_queue: Arc::new(Mutex::new(HashSet::new())),
            load_finished: Arc::new(Notify::new()),
            health_tasks: Mutex::new(HashMap::new()),
            loader: ModuleLoader::new(),
            bus,
            config,
        }
    }

    /// 事件总线
    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// 模块加载器
    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    /// 注册表配置
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // ==================== 注册 ====================

    /// 注册模块定义
    ///
    /// 失败时除返回错误外还会发布 `MODULE_LOAD_ERROR`（`phase = "register"`）。
    #[instrument(skip_all, fields(module_id = %definition.id))]
    pub async fn register_module(&self, definition: ModuleDefinition) -> Result<()> {
        let module_id = definition.id.clone();

        if let Err(e) = definition.validate() {
            return Err(self
                .report(lifecycle_events::MODULE_LOAD_ERROR, &module_id, "register", e)
                .await);
        }

        let registered = {
            let mut state = self.state.write().await;
            if state.definitions.contains_key(&module_id) {
                Err(CoreError::load(&module_id, "模块已注册"))
            } else if let Err(e) = state.graph.declare(&module_id, &definition.dependencies) {
                // 成环时依赖图保持不变
                Err(e)
            } else {
                let placeholder = Arc::new(ModuleInstance::placeholder(&definition));
                state.placeholders.insert(module_id.clone(), placeholder);
                state.registration_order.push(module_id.clone());
                state.definitions.insert(module_id.clone(), definition.clone());
                Ok(())
            }
        };

        if let Err(e) = registered {
            return Err(self
                .report(lifecycle_events::MODULE_LOAD_ERROR, &module_id, "register", e)
                .await);
        }

        info!(module_id = %module_id, version = %definition.version, "模块已注册");
        self.emit(
            lifecycle_events::MODULE_REGISTERED,
            &module_id,
            definition.summary(),
        )
        .await;
        Ok(())
    }

    /// 注销模块定义
    ///
    /// 模块已加载或正在加载时失败。只移除模块自身的依赖声明。
    #[instrument(skip(self))]
    pub async fn unregister_module(&self, module_id: &str) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if !state.definitions.contains_key(module_id) {
                return Err(CoreError::dependency(module_id, "模块未注册"));
            }
            if state.loaded.contains_key(module_id) || lock(&self.load_queue).contains(module_id)
            {
                return Err(
                    CoreError::execution(module_id, "模块已加载，需先卸载").with_retryable(false)
                );
            }

            state.definitions.remove(module_id);
            state.placeholders.remove(module_id);
            state.registration_order.retain(|id| id != module_id);
            state.graph.remove_declarations(module_id);
        }

        info!(module_id = %module_id, "模块已注销");
        self.emit(lifecycle_events::MODULE_UNREGISTERED, module_id, json!({}))
            .await;
        Ok(())
    }

    // ==================== 加载 ====================

    /// 加载模块及其依赖
    ///
    /// 已加载（且未要求强制重载）或正在加载时返回对应的告警结果，不视为错误。
    #[instrument(skip(self))]
    pub async fn load_module(&self, module_id: &str, force_reload: bool) -> Result<LoadOutcome> {
        self.load_inner(module_id.to_string(), force_reload).await
    }

    /// 强制重载：先卸载再加载
    pub async fn reload_module(&self, module_id: &str) -> Result<LoadOutcome> {
        self.load_module(module_id, true).await
    }

    fn load_inner(&self, module_id: String, force_reload: bool) -> BoxFuture<'_, Result<LoadOutcome>> {
        async move {
            let (definition, was_loaded, slot) = {
                let state = self.state.read().await;
                let was_loaded = state.loaded.contains_key(&module_id);

                if was_loaded && !force_reload {
                    warn!(module_id = %module_id, "模块已加载");
                    return Ok(LoadOutcome::AlreadyLoaded);
                }

                let Some(definition) = state.definitions.get(&module_id).cloned() else {
                    drop(state);
                    let err = CoreError::dependency(&module_id, "模块未注册");
                    return Err(self
                        .report(lifecycle_events::MODULE_LOAD_ERROR, &module_id, "load", err)
                        .await);
                };

                let queued = lock(&self.load_queue).insert(module_id.clone());
                if !queued {
                    warn!(module_id = %module_id, "模块正在加载中");
                    return Ok(LoadOutcome::AlreadyLoading);
                }

                let slot = QueueSlot {
                    queue: Arc::clone(&self.load_queue),
                    notify: Arc::clone(&self.load_finished),
                    module_id: module_id.clone(),
                };
                (definition, was_loaded, slot)
            };

            let result = async {
                if was_loaded {
                    self.unload_inner(module_id.clone(), false).await?;
                }
                self.load_queued(&definition).await
            }
            .await;

            // 出队并唤醒等待该模块的依赖方
            drop(slot);

            match result {
                Ok(()) => Ok(LoadOutcome::Loaded),
                Err(e) => Err(self
                    .report(lifecycle_events::MODULE_LOAD_ERROR, &module_id, "load", e)
                    .await),
            }
        }
        .boxed()
    }

    /// 已在加载队列中的模块：加载依赖、实例化、调用钩子、登记
    async fn load_queued(&self, definition: &ModuleDefinition) -> Result<()> {
        let module_id = definition.id.as_str();
        info!(module_id = %module_id, "开始加载模块");

        // 1. 深度优先加载依赖
        for dep in &definition.dependencies {
            if self.is_module_loaded(dep).await {
                continue;
            }
            debug!(module_id = %module_id, dependency = %dep, "加载依赖");
            match self.load_inner(dep.clone(), false).await {
                Ok(LoadOutcome::AlreadyLoading) => self.wait_for_dependency(module_id, dep).await?,
                Ok(_) => {}
                Err(e) => {
                    return Err(CoreError::dependency(
                        module_id,
                        format!("依赖 '{}' 加载失败: {}", dep, e),
                    ))
                }
            }
        }

        // 2. 实例化（工厂调用与实例校验）
        let instance = self.loader.load(definition).await?;

        // 3. 初始化并启动
        for hook in [Hook::Initialize, Hook::Start] {
            if let Err(e) = lifecycle::invoke(&instance, hook).await {
                self.loader.unload(module_id).await;
                return Err(
                    CoreError::load(module_id, format!("{} 钩子失败: {:#}", hook, e))
                        .with_retryable(true),
                );
            }
        }

        // 4. 登记
        let position = {
            let mut state = self.state.write().await;
            state.loaded.insert(module_id.to_string(), Arc::clone(&instance));
            state.initialization_order.retain(|id| id != module_id);
            state.initialization_order.push(module_id.to_string());
            state.initialization_order.len() - 1
        };

        self.start_health_timer(module_id);

        info!(module_id = %module_id, position, "模块加载完成");
        self.emit(
            lifecycle_events::MODULE_LOADED,
            module_id,
            json!({
                "name": instance.name,
                "version": instance.version,
                "dependencies": definition.dependencies,
                "initialization_index": position,
            }),
        )
        .await;
        Ok(())
    }

    /// 等待由其他调用链加载中的依赖
    async fn wait_for_dependency(&self, module_id: &str, dep: &str) -> Result<()> {
        loop {
            // 先登记再检查，避免错过通知
            let finished = self.load_finished.notified();

            if self.is_module_loaded(dep).await {
                return Ok(());
            }
            if !lock(&self.load_queue).contains(dep) {
                return Err(CoreError::dependency(
                    module_id,
                    format!("依赖 '{}' 加载失败", dep),
                ));
            }

            trace!(module_id = %module_id, dependency = %dep, "等待依赖加载");
            finished.await;
        }
    }

    // ==================== 卸载 ====================

    /// 卸载模块
    ///
    /// 存在依赖者时，非强制卸载返回 `DEPENDENCY_ERROR`；强制卸载先逐个卸载依赖者。
    /// 模块未加载时返回 `Ok(false)`。
    #[instrument(skip(self))]
    pub async fn unload_module(&self, module_id: &str, force: bool) -> Result<bool> {
        self.unload_inner(module_id.to_string(), force).await
    }

    fn unload_inner(&self, module_id: String, force: bool) -> BoxFuture<'_, Result<bool>> {
        async move {
            let (instance, dependents) = {
                let state = self.state.read().await;
                let Some(instance) = state.loaded.get(&module_id).cloned() else {
                    warn!(module_id = %module_id, "模块未加载，跳过卸载");
                    return Ok(false);
                };
                let dependents: Vec<String> = state
                    .graph
                    .dependents(&module_id)
                    .into_iter()
                    .filter(|id| state.definitions.contains_key(id))
                    .collect();
                (instance, dependents)
            };

            if !dependents.is_empty() {
                if !force {
                    let err = CoreError::blocked_by_dependents(&module_id, dependents);
                    return Err(self
                        .report(lifecycle_events::MODULE_UNLOAD_ERROR, &module_id, "unload", err)
                        .await);
                }
                for dependent in dependents {
                    debug!(module_id = %module_id, dependent = %dependent, "级联卸载依赖者");
                    self.unload_inner(dependent, true).await?;
                }
            }

            info!(module_id = %module_id, force, "开始卸载模块");

            // 停止钩子执行期间不再做健康检查
            self.cancel_health_timer(&module_id);

            if let Err(e) = lifecycle::invoke(&instance, Hook::Stop).await {
                warn!(module_id = %module_id, error = %e, "停止钩子失败，继续卸载");
            }
            if let Err(e) = lifecycle::invoke(&instance, Hook::Destroy).await {
                // 模块仍处于已加载状态，恢复健康检查
                self.start_health_timer(&module_id);
                let err = CoreError::execution(&module_id, format!("destroy 钩子失败: {:#}", e));
                return Err(self
                    .report(lifecycle_events::MODULE_UNLOAD_ERROR, &module_id, "unload", err)
                    .await);
            }

            {
                let mut state = self.state.write().await;
                state.loaded.remove(&module_id);
                state.initialization_order.retain(|id| id != &module_id);
            }
            self.loader.unload(&module_id).await;

            info!(module_id = %module_id, "模块卸载完成");
            self.emit(
                lifecycle_events::MODULE_UNLOADED,
                &module_id,
                json!({ "forced": force }),
            )
            .await;
            Ok(true)
        }
        .boxed()
    }

    // ==================== 启用 / 禁用 ====================

    /// 启用模块，已启用时返回 `Ok(false)`
    #[instrument(skip(self))]
    pub async fn enable_module(&self, module_id: &str) -> Result<bool> {
        self.set_enabled(module_id, true).await
    }

    /// 禁用模块，已禁用时返回 `Ok(false)`
    #[instrument(skip(self))]
    pub async fn disable_module(&self, module_id: &str) -> Result<bool> {
        self.set_enabled(module_id, false).await
    }

    async fn set_enabled(&self, module_id: &str, enable: bool) -> Result<bool> {
        let (hook, done_event, error_event) = if enable {
            (
                Hook::Enable,
                lifecycle_events::MODULE_ENABLED,
                lifecycle_events::MODULE_ENABLE_ERROR,
            )
        } else {
            (
                Hook::Disable,
                lifecycle_events::MODULE_DISABLED,
                lifecycle_events::MODULE_DISABLE_ERROR,
            )
        };

        let instance = self.state.read().await.loaded.get(module_id).cloned();
        let Some(instance) = instance else {
            return Err(CoreError::execution(module_id, "模块未加载").with_retryable(false));
        };

        if instance.is_enabled() == enable {
            warn!(module_id = %module_id, enabled = enable, "模块已处于目标状态");
            return Ok(false);
        }

        if let Err(e) = lifecycle::invoke(&instance, hook).await {
            let err = CoreError::execution(module_id, format!("{} 钩子失败: {:#}", hook, e));
            return Err(self.report(error_event, module_id, hook.name(), err).await);
        }

        instance.set_enabled(enable);
        info!(module_id = %module_id, enabled = enable, "模块启用状态已变更");
        self.emit(done_event, module_id, json!({ "enabled": enable }))
            .await;
        Ok(true)
    }

    // ==================== 查询 ====================

    /// 已注册的模块定义（注册顺序）
    pub async fn get_registered_modules(&self) -> Vec<ModuleDefinition> {
        let state = self.state.read().await;
        state
            .registration_order
            .iter()
            .filter_map(|id| state.definitions.get(id).cloned())
            .collect()
    }

    /// 已加载的模块（初始化顺序），取注册表与加载器驻留集合的交集
    pub async fn get_loaded_modules(&self) -> Vec<Arc<ModuleInstance>> {
        let resident = self.loader.resident_ids().await;
        let state = self.state.read().await;
        state
            .initialization_order
            .iter()
            .filter(|id| resident.contains(*id))
            .filter_map(|id| state.loaded.get(id).cloned())
            .collect()
    }

    /// 获取模块实例，未加载时返回注册阶段的占位实例
    pub async fn get_module(&self, module_id: &str) -> Option<Arc<ModuleInstance>> {
        let state = self.state.read().await;
        state
            .loaded
            .get(module_id)
            .or_else(|| state.placeholders.get(module_id))
            .cloned()
    }

    /// 模块是否已注册
    pub async fn is_registered(&self, module_id: &str) -> bool {
        self.state.read().await.definitions.contains_key(module_id)
    }

    /// 模块是否已加载
    pub async fn is_module_loaded(&self, module_id: &str) -> bool {
        self.state.read().await.loaded.contains_key(module_id)
    }

    /// 模块健康记录
    pub async fn get_module_health(&self, module_id: &str) -> HealthRecord {
        evaluate_health(&self.state, module_id).await
    }

    /// 所有已注册模块的健康记录
    pub async fn check_all_health(&self) -> HashMap<String, HealthRecord> {
        let ids = self.state.read().await.registration_order.clone();
        let mut records = HashMap::with_capacity(ids.len());
        for id in ids {
            let record = evaluate_health(&self.state, &id).await;
            records.insert(id, record);
        }
        records
    }

    /// 初始化顺序
    pub async fn get_initialization_order(&self) -> Vec<String> {
        self.state.read().await.initialization_order.clone()
    }

    /// 依赖图副本
    pub async fn get_dependency_graph(&self) -> HashMap<String, Vec<String>> {
        self.state.read().await.graph.snapshot()
    }

    /// 已注册的直接依赖者
    pub async fn get_dependents(&self, module_id: &str) -> Vec<String> {
        let state = self.state.read().await;
        state
            .graph
            .dependents(module_id)
            .into_iter()
            .filter(|id| state.definitions.contains_key(id))
            .collect()
    }

    /// 加载模块时的实际顺序：传递依赖在前，模块自身在最后
    pub async fn get_load_order(&self, module_id: &str) -> Result<Vec<String>> {
        let state = self.state.read().await;
        if !state.definitions.contains_key(module_id) {
            return Err(CoreError::dependency(module_id, "模块未注册"));
        }
        Ok(state.graph.load_order(module_id))
    }

    /// 能力冲突：每对声明了同一能力的模块报告一次
    pub async fn find_conflicts(&self) -> Vec<Conflict> {
        let state = self.state.read().await;
        let defs: Vec<&ModuleDefinition> = state
            .registration_order
            .iter()
            .filter_map(|id| state.definitions.get(id))
            .collect();

        let mut conflicts = Vec::new();
        for (i, first) in defs.iter().enumerate() {
            let mut seen = HashSet::new();
            for capability in first.provides.iter().filter(|c| seen.insert(c.as_str())) {
                for second in defs.iter().skip(i + 1) {
                    if second.provides.contains(capability) {
                        conflicts.push(Conflict {
                            capability: capability.clone(),
                            first: first.id.clone(),
                            second: second.id.clone(),
                        });
                    }
                }
            }
        }
        conflicts
    }

    /// 已注册模块数量
    pub async fn registered_count(&self) -> usize {
        self.state.read().await.definitions.len()
    }

    /// 已加载模块数量
    pub async fn loaded_count(&self) -> usize {
        self.state.read().await.loaded.len()
    }

    // ==================== 销毁 ====================

    /// 销毁注册表：取消全部健康检查，按初始化逆序强制卸载所有模块，清空状态
    ///
    /// 单个模块的卸载失败只记录日志。事件总线的订阅不受影响。
    #[instrument(skip(self))]
    pub async fn destroy(&self) {
        info!("开始销毁模块注册表");
        self.cancel_all_health_timers();

        let order: Vec<String> = {
            let state = self.state.read().await;
            state.initialization_order.iter().rev().cloned().collect()
        };

        for module_id in order {
            if let Err(e) = self.unload_inner(module_id.clone(), true).await {
                error!(module_id = %module_id, error = %e, "销毁时卸载模块失败");
            }
        }

        {
            let mut state = self.state.write().await;
            *state = RegistryState::default();
        }
        lock(&self.load_queue).clear();
        self.loader.clear().await;
        self.cancel_all_health_timers();

        info!("模块注册表已销毁");
    }

    // ==================== 健康检查任务 ====================

    fn start_health_timer(&self, module_id: &str) {
        if !self.config.health_checks_enabled {
            return;
        }

        let period = Duration::from_millis(self.config.health_check_interval_ms.max(1));
        let state = Arc::clone(&self.state);
        let bus = self.bus.clone();
        let id = module_id.to_string();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let record = evaluate_health(&state, &id).await;
                if !record.loaded {
                    break;
                }

                if record.status.is_error() {
                    warn!(
                        module_id = %id,
                        health_status = %record.status,
                        reason = record.reason.as_deref().unwrap_or(""),
                        "模块健康检查异常"
                    );
                    let data = serde_json::to_value(&record).unwrap_or(Value::Null);
                    bus.publish(Event::for_module(
                        lifecycle_events::MODULE_HEALTH_ERROR,
                        &id,
                        data,
                    ))
                    .await;
                } else {
                    trace!(module_id = %id, health_status = %record.status, "健康检查通过");
                }
            }
        });

        if let Some(previous) = lock(&self.health_tasks).insert(module_id.to_string(), handle) {
            previous.abort();
        }
    }

    fn cancel_health_timer(&self, module_id: &str) {
        if let Some(handle) = lock(&self.health_tasks).remove(module_id) {
            handle.abort();
            debug!(module_id = %module_id, "健康检查已取消");
        }
    }

    fn cancel_all_health_timers(&self) {
        for (_, handle) in lock(&self.health_tasks).drain() {
            handle.abort();
        }
    }

    /// 活跃的健康检查任务数
    pub fn active_health_checks(&self) -> usize {
        lock(&self.health_tasks)
            .values()
            .filter(|h| !h.is_finished())
            .count()
    }

    // ==================== 事件 ====================

    async fn emit(&self, event_type: &str, module_id: &str, data: Value) {
        self.bus
            .publish(Event::for_module(event_type, module_id, data))
            .await;
    }

    /// 记录并发布错误事件，返回原错误
    async fn report(
        &self,
        event_type: &str,
        module_id: &str,
        phase: &str,
        err: CoreError,
    ) -> CoreError {
        error!(
            module_id = %module_id,
            phase,
            error_kind = %err.kind(),
            error_code = err.error_code(),
            error = %err,
            "模块操作失败"
        );
        self.emit(
            event_type,
            module_id,
            json!({ "phase": phase, "error": err.to_event_data() }),
        )
        .await;
        err
    }
}

impl Drop for ModuleRegistry {
    fn drop(&mut self) {
        self.cancel_all_health_timers();
    }
}
