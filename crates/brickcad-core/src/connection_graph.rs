//! 连接图
//!
//! 已确认连接的无向多重图。节点是场景节点的标识，两个节点之间可以有多条连接；
//! 每条连接在 `a→b` 与 `b→a` 两个方向各存一份（同一个 `Arc`）。
//!
//! 所有操作都持有同一把锁，包括连通分量的遍历。读取接口返回快照。

use crate::connection::Connection;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

/// 图中的边
pub type Edge = Arc<Connection>;

/// 邻接表：节点 → 邻居 → 连接列表
pub type AdjacencyLists<N> = HashMap<N, HashMap<N, Vec<Edge>>>;

/// 线程安全的连接多重图
#[derive(Debug)]
pub struct ConnectionGraph<N> {
    adjacency: Mutex<AdjacencyLists<N>>,
}

impl<N> Default for ConnectionGraph<N> {
    fn default() -> Self {
        Self {
            adjacency: Mutex::new(HashMap::new()),
        }
    }
}

impl<N: Clone + Eq + Hash> ConnectionGraph<N> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AdjacencyLists<N>> {
        self.adjacency.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 添加一条连接，自连接被忽略
    pub fn add_connection(&self, a: &N, b: &N, edge: Edge) {
        if a == b {
            tracing::debug!("Ignoring self connection");
            return;
        }
        let mut adjacency = self.lock();
        adjacency
            .entry(a.clone())
            .or_default()
            .entry(b.clone())
            .or_default()
            .push(Arc::clone(&edge));
        adjacency
            .entry(b.clone())
            .or_default()
            .entry(a.clone())
            .or_default()
            .push(edge);
    }

    /// 删除一条与 `edge` 相等的连接（两个方向各删一份）
    pub fn remove_connection(&self, a: &N, b: &N, edge: &Connection) {
        let mut adjacency = self.lock();
        remove_one(&mut adjacency, a, b, edge);
        remove_one(&mut adjacency, b, a, edge);
    }

    /// 删除两个节点之间的所有连接
    pub fn remove_all_connections_between(&self, a: &N, b: &N) {
        let mut adjacency = self.lock();
        remove_bucket(&mut adjacency, a, b);
        remove_bucket(&mut adjacency, b, a);
    }

    /// 删除节点及所有指向它的连接
    pub fn remove_all_connections(&self, node: &N) {
        let mut adjacency = self.lock();
        remove_node_locked(&mut adjacency, node);
    }

    /// 批量删除节点
    pub fn remove_all_connections_of(&self, nodes: &HashSet<N>) {
        if nodes.is_empty() {
            return;
        }
        let mut adjacency = self.lock();
        for node in nodes {
            adjacency.remove(node);
        }
        adjacency.retain(|_, neighbors| {
            neighbors.retain(|n, _| !nodes.contains(n));
            !neighbors.is_empty()
        });
    }

    /// 两个节点之间的连接（未知节点返回空）
    pub fn connections_between(&self, a: &N, b: &N) -> Vec<Edge> {
        self.lock()
            .get(a)
            .and_then(|neighbors| neighbors.get(b))
            .cloned()
            .unwrap_or_default()
    }

    /// 节点的所有邻居及连接
    pub fn connections(&self, node: &N) -> HashMap<N, Vec<Edge>> {
        self.lock().get(node).cloned().unwrap_or_default()
    }

    /// 整个邻接表的快照
    pub fn adjacency_lists(&self) -> AdjacencyLists<N> {
        self.lock().clone()
    }

    /// 在持锁状态下读取邻接表
    pub fn with_adjacency<R>(&self, f: impl FnOnce(&AdjacencyLists<N>) -> R) -> R {
        f(&self.lock())
    }

    /// 连接总数（每条连接只计一次）
    pub fn count_total_connections(&self) -> usize {
        let adjacency = self.lock();
        let total: usize = adjacency
            .values()
            .flat_map(|neighbors| neighbors.values())
            .map(Vec::len)
            .sum();
        total / 2
    }

    pub fn node_count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_connected(&self, a: &N, b: &N) -> bool {
        self.lock()
            .get(a)
            .and_then(|neighbors| neighbors.get(b))
            .is_some_and(|edges| !edges.is_empty())
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// 连通分量
    ///
    /// 每个至少有一条连接的节点恰好属于一个分量。
    pub fn find_connected_components(&self) -> Vec<HashSet<N>> {
        let adjacency = self.lock();
        let mut visited: HashSet<N> = HashSet::with_capacity(adjacency.len());
        let mut components = Vec::new();

        for (start, neighbors) in adjacency.iter() {
            if visited.contains(start) || neighbors.values().all(Vec::is_empty) {
                continue;
            }
            let mut component = HashSet::new();
            let mut stack = vec![start.clone()];
            visited.insert(start.clone());
            while let Some(current) = stack.pop() {
                if let Some(neighbors) = adjacency.get(&current) {
                    for (next, edges) in neighbors {
                        if !edges.is_empty() && visited.insert(next.clone()) {
                            stack.push(next.clone());
                        }
                    }
                }
                component.insert(current);
            }
            components.push(component);
        }

        tracing::debug!("Found {} connected components", components.len());
        components
    }
}

fn remove_one<N: Eq + Hash>(adjacency: &mut AdjacencyLists<N>, a: &N, b: &N, edge: &Connection) {
    let Some(neighbors) = adjacency.get_mut(a) else {
        return;
    };
    if let Some(edges) = neighbors.get_mut(b) {
        if let Some(pos) = edges.iter().position(|e| **e == *edge) {
            edges.remove(pos);
        }
        if edges.is_empty() {
            neighbors.remove(b);
        }
    }
    if neighbors.is_empty() {
        adjacency.remove(a);
    }
}

fn remove_bucket<N: Eq + Hash>(adjacency: &mut AdjacencyLists<N>, a: &N, b: &N) {
    if let Some(neighbors) = adjacency.get_mut(a) {
        neighbors.remove(b);
        if neighbors.is_empty() {
            adjacency.remove(a);
        }
    }
}

fn remove_node_locked<N: Eq + Hash>(adjacency: &mut AdjacencyLists<N>, node: &N) {
    if let Some(neighbors) = adjacency.remove(node) {
        for neighbor in neighbors.keys() {
            remove_bucket(adjacency, neighbor, node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{Connector, ConnectorKind, Cylindrical, CylindricalShapePart, CylindricalShapeType, Gender};
    use crate::dof::DegreesOfFreedom;
    use crate::math::{Point3, Vector3};
    use crate::node::NodeId;

    fn cylinder(gender: Gender, direction: Vector3, radius: f64, length: f64) -> Connector {
        Connector::new(
            "",
            Point3::origin(),
            direction,
            "",
            ConnectorKind::Cylindrical(Cylindrical::new(
                gender,
                vec![CylindricalShapePart::new(CylindricalShapeType::Round, false, radius, length)],
                false,
                false,
                false,
            )),
        )
    }

    fn edge(x: f64) -> Edge {
        Arc::new(Connection::new(
            cylinder(Gender::M, Vector3::y(), 4.0, 6.0).translated(&Vector3::new(x, 0.0, 0.0)),
            cylinder(Gender::F, -Vector3::y(), 4.0, 8.0).translated(&Vector3::new(x, 0.0, 0.0)),
            DegreesOfFreedom::fixed(),
        ))
    }

    #[test]
    fn test_two_cylinders_connected() {
        let a = NodeId::new();
        let b = NodeId::new();
        let graph = ConnectionGraph::new();
        let connection = Connection::new(
            cylinder(Gender::M, Vector3::y(), 4.0, 6.0),
            cylinder(Gender::F, -Vector3::y(), 4.0, 8.0),
            DegreesOfFreedom::fixed(),
        );
        assert!(connection.degrees_of_freedom.is_empty());
        graph.add_connection(&a, &b, Arc::new(connection));

        assert_eq!(graph.connections_between(&a, &b).len(), 1);
        assert_eq!(graph.connections_between(&b, &a).len(), 1);
        assert_eq!(graph.count_total_connections(), 1);
        assert!(graph.is_connected(&b, &a));
    }

    #[test]
    fn test_add_remove() {
        let graph = ConnectionGraph::new();
        graph.add_connection(&1, &2, edge(0.0));
        graph.add_connection(&1, &2, edge(20.0));
        graph.add_connection(&2, &3, edge(0.0));
        graph.add_connection(&3, &3, edge(0.0));
        assert_eq!(graph.count_total_connections(), 3);
        assert_eq!(graph.connections(&2).len(), 2);

        graph.remove_connection(&2, &1, &edge(20.0));
        assert_eq!(graph.connections_between(&1, &2).len(), 1);
        assert_eq!(graph.count_total_connections(), 2);

        graph.remove_connection(&1, &2, &edge(0.0));
        assert!(graph.connections_between(&1, &2).is_empty());
        // 空桶被清除
        assert!(!graph.adjacency_lists().contains_key(&1));
        assert!(graph.connections(&9).is_empty());
    }

    #[test]
    fn test_remove_recomputed_connection() {
        let sliding = |direction: Vector3| {
            Connection::new(
                cylinder(Gender::M, Vector3::y(), 4.0, 6.0),
                cylinder(Gender::F, -Vector3::y(), 4.0, 8.0),
                DegreesOfFreedom::new(vec![direction], vec![]),
            )
        };
        let graph = ConnectionGraph::new();
        graph.add_connection(&1, &2, Arc::new(sliding(Vector3::y())));

        graph.remove_connection(&1, &2, &sliding(Vector3::x()));
        assert_eq!(graph.count_total_connections(), 1);

        graph.remove_connection(&2, &1, &sliding(Vector3::new(1e-7, 1.0, 0.0)));
        assert_eq!(graph.count_total_connections(), 0);
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_purge_nodes() {
        let graph = ConnectionGraph::new();
        graph.add_connection(&"a", &"b", edge(0.0));
        graph.add_connection(&"b", &"c", edge(0.0));
        graph.add_connection(&"c", &"d", edge(0.0));

        graph.remove_all_connections(&"b");
        assert!(graph.connections(&"a").is_empty());
        assert!(graph.connections_between(&"c", &"b").is_empty());
        assert_eq!(graph.count_total_connections(), 1);

        graph.add_connection(&"a", &"c", edge(0.0));
        graph.remove_all_connections_of(&HashSet::from(["c"]));
        assert_eq!(graph.count_total_connections(), 0);
        assert_eq!(graph.node_count(), 0);

        graph.add_connection(&"x", &"y", edge(0.0));
        graph.remove_all_connections_between(&"y", &"x");
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_connected_components() {
        let graph = ConnectionGraph::new();
        graph.add_connection(&1, &2, edge(0.0));
        graph.add_connection(&2, &3, edge(0.0));
        graph.add_connection(&4, &5, edge(0.0));
        graph.add_connection(&6, &7, edge(0.0));
        graph.remove_all_connections_between(&6, &7);

        let mut components = graph.find_connected_components();
        components.sort_by_key(|c| c.len());
        assert_eq!(components.len(), 2);
        assert_eq!(components[0], HashSet::from([4, 5]));
        assert_eq!(components[1], HashSet::from([1, 2, 3]));

        let total: usize = components.iter().map(HashSet::len).sum();
        assert_eq!(total, graph.node_count());
        assert_eq!(graph.with_adjacency(|adj| adj.len()), 5);

        graph.clear();
        assert!(graph.find_connected_components().is_empty());
    }
}
