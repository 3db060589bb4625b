//! 模块加载器
//!
//! 负责把模块定义实例化为驻留实例，不关心依赖顺序（由注册表负责）。
//!
//! 同一模块 ID 的并发加载共享同一个挂起操作（`futures::future::Shared`），
//! 每个 ID 最多只实例化一次；无论成功还是失败，挂起项在结果产生时清除，
//! 失败后可以重试。

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::metadata::{ModuleContext, ModuleDefinition, ModuleInstance};
use crate::utils::{CoreError, Result};

type PendingLoad = Shared<BoxFuture<'static, Result<Arc<ModuleInstance>>>>;

#[derive(Default)]
struct LoaderState {
    /// 驻留实例
    resident: HashMap<String, Arc<ModuleInstance>>,
    /// 进行中的实例化
    pending: HashMap<String, PendingLoad>,
}

/// 模块加载器
#[derive(Clone, Default)]
pub struct ModuleLoader {
    state: Arc<Mutex<LoaderState>>,
    materializations: Arc<AtomicU64>,
}

impl ModuleLoader {
    /// 创建加载器
    pub fn new() -> Self {
        debug!("创建模块加载器");
        Self::default()
    }

    /// 加载模块，返回驻留实例
    ///
    /// 已驻留时直接返回；已有进行中的实例化时等待同一个结果。
    pub async fn load(&self, definition: &ModuleDefinition) -> Result<Arc<ModuleInstance>> {
        let module_id = definition.id.clone();

        let pending = {
            let mut state = self.state.lock().await;

            if let Some(instance) = state.resident.get(&module_id) {
                debug!(module_id = %module_id, "模块已驻留");
                return Ok(Arc::clone(instance));
            }

            match state.pending.get(&module_id) {
                Some(pending) => {
                    debug!(module_id = %module_id, "等待进行中的实例化");
                    pending.clone()
                }
                None => {
                    let pending = self.clone().materialize(definition.clone()).boxed().shared();
                    state.pending.insert(module_id.clone(), pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    /// 预加载：参与同样的去重，丢弃实例
    pub async fn preload(&self, definition: &ModuleDefinition) -> Result<()> {
        self.load(definition).await.map(|_| ())
    }

    /// 先卸载再加载
    pub async fn reload(&self, definition: &ModuleDefinition) -> Result<Arc<ModuleInstance>> {
        self.unload(&definition.id).await;
        self.load(definition).await
    }

    /// 移出驻留集合，幂等
    ///
    /// 返回模块此前是否驻留。
    pub async fn unload(&self, module_id: &str) -> bool {
        let removed = self.state.lock().await.resident.remove(module_id).is_some();
        if removed {
            debug!(module_id = %module_id, "模块移出驻留集合");
        }
        removed
    }

    /// 驻留实例快照（按 ID 排序）
    pub async fn get_loaded(&self) -> Vec<Arc<ModuleInstance>> {
        let state = self.state.lock().await;
        let mut loaded: Vec<_> = state.resident.values().cloned().collect();
        loaded.sort_by(|a, b| a.id.cmp(&b.id));
        loaded
    }

    /// 驻留的模块 ID
    pub async fn resident_ids(&self) -> HashSet<String> {
        self.state.lock().await.resident.keys().cloned().collect()
    }

    /// 模块是否驻留
    pub async fn is_resident(&self, module_id: &str) -> bool {
        self.state.lock().await.resident.contains_key(module_id)
    }

    /// 是否有进行中的实例化
    pub async fn is_pending(&self, module_id: &str) -> bool {
        self.state.lock().await.pending.contains_key(module_id)
    }

    /// 累计实例化次数
    pub fn materialization_count(&self) -> u64 {
        self.materializations.load(Ordering::SeqCst)
    }

    /// 清空驻留集合
    pub async fn clear(&self) {
        self.state.lock().await.resident.clear();
    }

    /// 调用工厂并校验实例，完成后清除挂起项
    async fn materialize(self, definition: ModuleDefinition) -> Result<Arc<ModuleInstance>> {
        let module_id = definition.id.clone();
        self.materializations.fetch_add(1, Ordering::SeqCst);
        info!(module_id = %module_id, "开始实例化模块");

        let context = ModuleContext::new(&module_id);
        let result = match (definition.factory)(context).await {
            Ok(instance) => Self::validate_instance(&module_id, instance).map(Arc::new),
            Err(e) => Err(CoreError::load(&module_id, format!("工厂执行失败: {:#}", e))),
        };

        let mut state = self.state.lock().await;
        state.pending.remove(&module_id);
        match &result {
            Ok(instance) => {
                state.resident.insert(module_id.clone(), Arc::clone(instance));
                info!(module_id = %module_id, "模块实例化完成");
            }
            Err(e) => warn!(module_id = %module_id, error = %e, "模块实例化失败"),
        }
        result
    }

    fn validate_instance(module_id: &str, instance: ModuleInstance) -> Result<ModuleInstance> {
        if instance.id.trim().is_empty() {
            return Err(CoreError::load(module_id, "工厂返回的实例缺少 ID"));
        }
        if instance.name.trim().is_empty() {
            return Err(CoreError::load(module_id, "工厂返回的实例缺少名称"));
        }
        if instance.id != module_id {
            warn!(
                module_id = %module_id,
                instance_id = %instance.id,
                "实例 ID 与定义不一致"
            );
        }
        Ok(instance)
    }
}
