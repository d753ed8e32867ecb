//! 包围盒相交图
//!
//! 粗检测阶段的结果：包围盒重叠的两个节点之间有一条无向边，边上没有数据。
//! 只有相邻节点才需要做连接器配对检测。

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};

/// 线程安全的简单无向图
#[derive(Debug)]
pub struct IntersectionGraph<N> {
    adjacency: Mutex<HashMap<N, HashSet<N>>>,
}

impl<N> Default for IntersectionGraph<N> {
    fn default() -> Self {
        Self {
            adjacency: Mutex::new(HashMap::new()),
        }
    }
}

impl<N: Clone + Eq + Hash> IntersectionGraph<N> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<N, HashSet<N>>> {
        self.adjacency.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 添加边，自环被忽略
    pub fn add_edge(&self, a: &N, b: &N) {
        if a == b {
            return;
        }
        let mut adjacency = self.lock();
        adjacency.entry(a.clone()).or_default().insert(b.clone());
        adjacency.entry(b.clone()).or_default().insert(a.clone());
    }

    pub fn remove_edge(&self, a: &N, b: &N) {
        let mut adjacency = self.lock();
        remove_half(&mut adjacency, a, b);
        remove_half(&mut adjacency, b, a);
    }

    /// 删除节点及其所有边
    pub fn remove_node(&self, node: &N) {
        let mut adjacency = self.lock();
        remove_node_locked(&mut adjacency, node);
    }

    pub fn remove_all_nodes<'a>(&self, nodes: impl IntoIterator<Item = &'a N>)
    where
        N: 'a,
    {
        let mut adjacency = self.lock();
        for node in nodes {
            remove_node_locked(&mut adjacency, node);
        }
    }

    pub fn has_edge(&self, a: &N, b: &N) -> bool {
        self.lock().get(a).is_some_and(|n| n.contains(b))
    }

    /// 节点的所有邻居（快照）
    pub fn connected(&self, node: &N) -> HashSet<N> {
        self.lock().get(node).cloned().unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.lock().len()
    }

    pub fn edge_count(&self) -> usize {
        self.lock().values().map(HashSet::len).sum::<usize>() / 2
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

fn remove_half<N: Eq + Hash>(adjacency: &mut HashMap<N, HashSet<N>>, a: &N, b: &N) {
    if let Some(neighbors) = adjacency.get_mut(a) {
        neighbors.remove(b);
        if neighbors.is_empty() {
            adjacency.remove(a);
        }
    }
}

fn remove_node_locked<N: Eq + Hash>(adjacency: &mut HashMap<N, HashSet<N>>, node: &N) {
    if let Some(neighbors) = adjacency.remove(node) {
        for neighbor in &neighbors {
            remove_half(adjacency, neighbor, node);
        }
    }
}
