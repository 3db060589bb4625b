//! 模块依赖图
//!
//! 记录注册时声明的依赖关系：模块 ID -> 依赖的模块 ID 列表。
//! 依赖声明描述的是注册结构而不是驻留状态，卸载模块不会移除它的声明。
//!
//! ```rust
//! use chips_orchestrator::module::dependency::DependencyGraph;
//!
//! let mut graph = DependencyGraph::new();
//! graph.declare("storage", &[]).unwrap();
//! graph.declare("editor", &["storage".to_string()]).unwrap();
//!
//! assert_eq!(graph.dependents("storage"), vec!["editor".to_string()]);
//! assert!(graph.declare("storage", &["editor".to_string()]).is_err());
//! ```

use std::collections::{HashMap, HashSet};

use crate::utils::{CoreError, Result};

/// 模块依赖关系图
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// 正向边：模块 ID -> 声明的依赖（保持声明顺序）
    edges: HashMap<String, Vec<String>>,
    /// 反向边：模块 ID -> 声明依赖它的模块（保持注册顺序）
    reverse_edges: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// 创建空图
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录模块的依赖声明
    ///
    /// 依赖可以尚未注册。若新声明会形成环（含自依赖），返回
    /// `CircularDependency` 且图保持不变。重复的依赖项只记录一次。
    pub fn declare(&mut self, module_id: &str, dependencies: &[String]) -> Result<()> {
        if let Some(cycle) = self.cycle_through(module_id, dependencies) {
            return Err(CoreError::CircularDependency(cycle));
        }

        self.remove_declarations(module_id);

        let mut deps: Vec<String> = Vec::with_capacity(dependencies.len());
        for dep in dependencies {
            if !deps.contains(dep) {
                deps.push(dep.clone());
            }
        }

        for dep in &deps {
            let dependents = self.reverse_edges.entry(dep.clone()).or_default();
            if !dependents.iter().any(|d| d == module_id) {
                dependents.push(module_id.to_string());
            }
        }
        self.edges.insert(module_id.to_string(), deps);
        Ok(())
    }

    /// 若给 `module_id` 声明 `dependencies` 会形成环，返回环路径
    ///
    /// 路径以 `module_id` 开始并以它结束，例如 `[a, b, a]`。
    pub fn cycle_through(&self, module_id: &str, dependencies: &[String]) -> Option<Vec<String>> {
        for dep in dependencies {
            let mut path = vec![module_id.to_string()];
            let mut visited = HashSet::new();
            if self.reaches(dep, module_id, &mut visited, &mut path) {
                return Some(path);
            }
        }
        None
    }

    /// DFS：从 `from` 沿正向边能否到达 `target`，成功时 `path` 为完整路径
    fn reaches(
        &self,
        from: &str,
        target: &str,
        visited: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> bool {
        path.push(from.to_string());
        if from == target {
            return true;
        }
        if visited.insert(from.to_string()) {
            if let Some(next) = self.edges.get(from) {
                for n in next {
                    if self.reaches(n, target, visited, path) {
                        return true;
                    }
                }
            }
        }
        path.pop();
        false
    }

    /// 移除模块自身的依赖声明
    ///
    /// 其他模块指向它的声明保留。
    pub fn remove_declarations(&mut self, module_id: &str) {
        let Some(deps) = self.edges.remove(module_id) else {
            return;
        };
        for dep in deps {
            if let Some(dependents) = self.reverse_edges.get_mut(&dep) {
                dependents.retain(|d| d != module_id);
                if dependents.is_empty() {
                    self.reverse_edges.remove(&dep);
                }
            }
        }
    }

    /// 直接依赖
    pub fn dependencies(&self, module_id: &str) -> Vec<String> {
        self.edges.get(module_id).cloned().unwrap_or_default()
    }

    /// 直接依赖者：声明依赖 `module_id` 的模块
    pub fn dependents(&self, module_id: &str) -> Vec<String> {
        self.reverse_edges.get(module_id).cloned().unwrap_or_default()
    }

    /// 加载顺序：全部传递依赖（依赖在前）后接模块自身
    pub fn load_order(&self, module_id: &str) -> Vec<String> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        self.collect_postorder(module_id, &mut visited, &mut order);
        order
    }

    fn collect_postorder(
        &self,
        module_id: &str,
        visited: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) {
        if !visited.insert(module_id.to_string()) {
            return;
        }
        if let Some(deps) = self.edges.get(module_id) {
            for dep in deps {
                self.collect_postorder(dep, visited, order);
            }
        }
        order.push(module_id.to_string());
    }

    /// 图中是否存在环
    ///
    /// `declare` 会拒绝成环的声明，正常情况下始终为 `None`。
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut ids: Vec<&String> = self.edges.keys().collect();
        ids.sort();
        for id in ids {
            let deps = &self.edges[id];
            let mut path = vec![id.clone()];
            for dep in deps {
                let mut visited = HashSet::new();
                if self.reaches(dep, id, &mut visited, &mut path) {
                    return Some(path);
                }
            }
        }
        None
    }

    /// 所有依赖声明的副本
    pub fn snapshot(&self) -> HashMap<String, Vec<String>> {
        self.edges.clone()
    }

    /// 是否记录了模块的声明
    pub fn contains(&self, module_id: &str) -> bool {
        self.edges.contains_key(module_id)
    }

    /// 已声明的模块数量
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// 图是否为空
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// 清空
    pub fn clear(&mut self) {
        self.edges.clear();
        self.reverse_edges.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_declare_with_unregistered_dependency() {
        let mut graph = DependencyGraph::new();
        graph.declare("editor", &deps(&["storage"])).unwrap();

        assert!(graph.contains("editor"));
        assert!(!graph.contains("storage"));
        assert_eq!(graph.dependents("storage"), deps(&["editor"]));
    }

    #[test]
    fn test_dependents_in_registration_order() {
        let mut graph = DependencyGraph::new();
        graph.declare("core", &[]).unwrap();
        graph.declare("b", &deps(&["core"])).unwrap();
        graph.declare("a", &deps(&["core", "core"])).unwrap();

        assert_eq!(graph.dependents("core"), deps(&["b", "a"]));
        assert_eq!(graph.dependencies("a"), deps(&["core"]));
    }

    #[test]
    fn test_self_dependency_rejected() {
        let mut graph = DependencyGraph::new();
        let err = graph.declare("a", &deps(&["a"])).unwrap_err();
        assert!(matches!(err, CoreError::CircularDependency(ref p) if p == &deps(&["a", "a"])));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_cycle_rejected_and_graph_untouched() {
        let mut graph = DependencyGraph::new();
        graph.declare("a", &deps(&["b"])).unwrap();
        graph.declare("b", &deps(&["c"])).unwrap();

        let err = graph.declare("c", &deps(&["a"])).unwrap_err();
        match err {
            CoreError::CircularDependency(path) => assert_eq!(path, deps(&["c", "a", "b", "c"])),
            other => panic!("意外的错误: {other:?}"),
        }
        assert!(!graph.contains("c"));
        assert!(graph.dependents("a").is_empty());
        assert!(graph.find_cycle().is_none());
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let mut graph = DependencyGraph::new();
        graph.declare("base", &[]).unwrap();
        graph.declare("left", &deps(&["base"])).unwrap();
        graph.declare("right", &deps(&["base"])).unwrap();
        graph.declare("top", &deps(&["left", "right"])).unwrap();

        assert_eq!(graph.load_order("top"), deps(&["base", "left", "right", "top"]));
    }

    #[test]
    fn test_remove_declarations_keeps_incoming() {
        let mut graph = DependencyGraph::new();
        graph.declare("core", &[]).unwrap();
        graph.declare("editor", &deps(&["core"])).unwrap();
        graph.declare("plugin", &deps(&["editor"])).unwrap();

        graph.remove_declarations("editor");

        assert!(!graph.contains("editor"));
        assert!(graph.dependents("core").is_empty());
        // plugin 对 editor 的声明仍在
        assert_eq!(graph.dependents("editor"), deps(&["plugin"]));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut graph = DependencyGraph::new();
        graph.declare("a", &deps(&["b"])).unwrap();

        let mut snapshot = graph.snapshot();
        snapshot.insert("x".into(), vec![]);
        assert_eq!(graph.len(), 1);

        graph.clear();
        assert!(graph.is_empty());
        assert!(graph.dependents("b").is_empty());
    }
}
