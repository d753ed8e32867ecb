//! 连接引擎
//!
//! 保存每个已放置零件的连接器、变换和包围盒，在编辑后增量地重算两张图：
//! 1. 过期节点从两张图中清除
//! 2. 粗检测找出与过期节点包围盒重叠的节点，写入相交图
//! 3. 对每一对候选节点做连接器配对检测（rayon 并行），结果写入连接图

use crate::broad_phase::BroadPhase;
use crate::connection::Connection;
use crate::connection_graph::ConnectionGraph;
use crate::connector::Connector;
use crate::intersection_graph::IntersectionGraph;
use crate::math::{
    Matrix4, COLINEARITY_TOLERANCE_LDU, CONNECTION_RADIUS_TOLERANCE, PARALLELITY_ANGLE_TOLERANCE,
    POSITION_TOLERANCE_LDU,
};
use crate::pair_checker::find_connections;
use parry3d::bounding_volume::Aabb;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

/// 配对检测使用的容差
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    /// 平行判定（叉积长度，约 1°）
    pub parallel_angle: f64,
    /// 共线判定（LDU）
    pub colinearity: f64,
    /// 位置比较（LDU）
    pub position: f64,
    /// 公母半径允许差值（LDU）
    pub connection_radius: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            parallel_angle: PARALLELITY_ANGLE_TOLERANCE,
            colinearity: COLINEARITY_TOLERANCE_LDU,
            position: POSITION_TOLERANCE_LDU,
            connection_radius: CONNECTION_RADIUS_TOLERANCE,
        }
    }
}

/// 引擎配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tolerances: Tolerances,
    /// 粗检测时包围盒外扩量（LDU）
    pub broad_phase_margin: f64,
    /// 配对检测是否使用 rayon 并行
    pub parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tolerances: Tolerances::default(),
            broad_phase_margin: 0.5,
            parallel: true,
        }
    }
}

/// 一个已放置的零件实例
#[derive(Debug, Clone)]
pub struct PlacedPart {
    /// 零件定义的连接器（局部坐标，多个实例共享）
    pub connectors: Arc<[Connector]>,
    /// 绝对变换
    pub transform: Matrix4,
    /// 世界空间包围盒
    pub aabb: Aabb,
}

impl PlacedPart {
    pub fn new(connectors: Arc<[Connector]>, transform: Matrix4, aabb: Aabb) -> Self {
        Self {
            connectors,
            transform,
            aabb,
        }
    }
}

/// 一次重算的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecomputeStats {
    pub outdated_nodes: usize,
    pub candidate_pairs: usize,
    pub connections_added: usize,
}

struct NodeData {
    placed: PlacedPart,
    world_connectors: Vec<Connector>,
}

/// 增量连接引擎
pub struct ConnectionEngine<N> {
    config: EngineConfig,
    nodes: HashMap<N, NodeData>,
    outdated: HashSet<N>,
    intersections: Arc<IntersectionGraph<N>>,
    connections: Arc<ConnectionGraph<N>>,
}

impl<N> ConnectionEngine<N>
where
    N: Clone + Eq + Hash + Send + Sync,
{
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            nodes: HashMap::new(),
            outdated: HashSet::new(),
            intersections: Arc::new(IntersectionGraph::new()),
            connections: Arc::new(ConnectionGraph::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 修改配置后所有节点都需要重算
    pub fn config_mut(&mut self) -> &mut EngineConfig {
        self.outdated.extend(self.nodes.keys().cloned());
        &mut self.config
    }

    pub fn intersections(&self) -> &Arc<IntersectionGraph<N>> {
        &self.intersections
    }

    pub fn connections(&self) -> &Arc<ConnectionGraph<N>> {
        &self.connections
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_outdated(&self, node: &N) -> bool {
        self.outdated.contains(node)
    }

    /// 添加或更新节点，连接器在此变换到世界空间
    pub fn upsert_node(&mut self, node: N, placed: PlacedPart) {
        let world_connectors = placed
            .connectors
            .iter()
            .map(|c| c.transform(&placed.transform))
            .collect();
        self.nodes.insert(
            node.clone(),
            NodeData {
                placed,
                world_connectors,
            },
        );
        self.outdated.insert(node);
    }

    /// 删除节点，下次重算时从两张图中清除
    pub fn remove_node(&mut self, node: &N) {
        if self.nodes.remove(node).is_some() {
            self.outdated.insert(node.clone());
        }
    }

    /// 删除所有节点并清空两张图
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.outdated.clear();
        self.intersections.clear();
        self.connections.clear();
    }

    /// 重算所有过期节点的相交与连接
    pub fn recompute(&mut self) -> RecomputeStats {
        if self.outdated.is_empty() {
            return RecomputeStats::default();
        }
        let started = Instant::now();
        let outdated = std::mem::take(&mut self.outdated);

        self.intersections.remove_all_nodes(&outdated);
        self.connections.remove_all_connections_of(&outdated);

        let pairs = self.candidate_pairs(&outdated);
        for (a, b) in &pairs {
            self.intersections.add_edge(a, b);
        }

        let tolerances = self.config.tolerances;
        let nodes = &self.nodes;
        let check = |(a, b): &(N, N)| -> (N, N, Vec<Connection>) {
            let found = match (nodes.get(a), nodes.get(b)) {
                (Some(da), Some(db)) => {
                    find_connections(&da.world_connectors, &db.world_connectors, &tolerances)
                }
                _ => Vec::new(),
            };
            (a.clone(), b.clone(), found)
        };
        let results: Vec<(N, N, Vec<Connection>)> = if self.config.parallel {
            pairs.par_iter().map(check).collect()
        } else {
            pairs.iter().map(check).collect()
        };

        let mut connections_added = 0;
        for (a, b, found) in results {
            connections_added += found.len();
            for connection in found {
                self.connections.add_connection(&a, &b, Arc::new(connection));
            }
        }

        let stats = RecomputeStats {
            outdated_nodes: outdated.len(),
            candidate_pairs: pairs.len(),
            connections_added,
        };
        tracing::info!(
            "Recomputed connections for {} nodes: {} candidate pairs, {} connections in {:.2}ms",
            stats.outdated_nodes,
            stats.candidate_pairs,
            stats.connections_added,
            started.elapsed().as_secs_f64() * 1000.0
        );
        stats
    }

    /// 与过期节点包围盒重叠的所有节点对（去重）
    fn candidate_pairs(&self, outdated: &HashSet<N>) -> Vec<(N, N)> {
        let items: Vec<(N, Aabb)> = self
            .nodes
            .iter()
            .map(|(n, d)| (n.clone(), d.placed.aabb))
            .collect();
        let margin = self.config.broad_phase_margin;

        // 大部分节点过期时整体扫描更快
        if outdated.len() * 2 >= self.nodes.len() {
            return BroadPhase::overlapping_pairs(&items, margin)
                .into_iter()
                .filter(|(a, b)| outdated.contains(a) || outdated.contains(b))
                .collect();
        }

        let mut seen: HashSet<(N, N)> = HashSet::new();
        let mut pairs = Vec::new();
        for node in outdated {
            let Some(data) = self.nodes.get(node) else {
                continue;
            };
            for other in BroadPhase::overlapping_with(&items, &data.placed.aabb, margin) {
                if other == *node || seen.contains(&(other.clone(), node.clone())) {
                    continue;
                }
                if seen.insert((node.clone(), other.clone())) {
                    pairs.push((node.clone(), other));
                }
            }
        }
        tracing::debug!("{} candidate pairs for {} outdated nodes", pairs.len(), outdated.len());
        pairs
    }
}

impl<N> Default for ConnectionEngine<N>
where
    N: Clone + Eq + Hash + Send + Sync,
{
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broad_phase::aabb_from_corners;
    use crate::connector::{ConnectorKind, Cylindrical, CylindricalShapePart, CylindricalShapeType, Gender};
    use crate::math::{Point3, Vector3};
    use crate::node::NodeId;

    /// 1x1 积木：顶部一个凸点，底部一个孔（局部坐标，Y 向下）
    fn brick_1x1() -> Arc<[Connector]> {
        let round = |r, l| vec![CylindricalShapePart::new(CylindricalShapeType::Round, false, r, l)];
        Arc::from(vec![
            Connector::new(
                "",
                Point3::origin(),
                -Vector3::y(),
                "stud",
                ConnectorKind::Cylindrical(Cylindrical::new(Gender::M, round(6.0, 4.0), false, true, false)),
            ),
            Connector::new(
                "",
                Point3::new(0.0, 24.0, 0.0),
                -Vector3::y(),
                "antistud",
                ConnectorKind::Cylindrical(Cylindrical::new(Gender::F, round(6.0, 4.0), true, false, false)),
            ),
        ])
    }

    fn place(y: f64, x: f64) -> PlacedPart {
        PlacedPart::new(
            brick_1x1(),
            Matrix4::new_translation(&Vector3::new(x, y, 0.0)),
            aabb_from_corners(&Point3::new(x - 10.0, y - 4.0, -10.0), &Point3::new(x + 10.0, y + 24.0, 10.0)),
        )
    }

    #[test]
    fn test_stacked_bricks_connect() {
        let mut engine = ConnectionEngine::default();
        let bottom = NodeId::new();
        let top = NodeId::new();
        let far = NodeId::new();
        engine.upsert_node(bottom, place(0.0, 0.0));
        engine.upsert_node(top, place(-24.0, 0.0));
        engine.upsert_node(far, place(0.0, 200.0));

        let stats = engine.recompute();
        assert_eq!(stats.outdated_nodes, 3);
        assert_eq!(stats.candidate_pairs, 1);
        assert_eq!(stats.connections_added, 1);
        assert!(engine.intersections().has_edge(&bottom, &top));
        assert_eq!(engine.connections().connections_between(&top, &bottom).len(), 1);

        let connection = &engine.connections().connections_between(&bottom, &top)[0];
        assert!(connection.degrees_of_freedom.can_rotate());
        assert!(!connection.degrees_of_freedom.can_slide());

        assert_eq!(engine.recompute(), RecomputeStats::default());
    }

    #[test]
    fn test_move_and_remove() {
        let mut engine = ConnectionEngine::new(EngineConfig {
            parallel: false,
            ..EngineConfig::default()
        });
        engine.upsert_node(1u32, place(0.0, 0.0));
        engine.upsert_node(2u32, place(-24.0, 0.0));
        engine.upsert_node(3u32, place(0.0, 100.0));
        engine.recompute();
        assert_eq!(engine.connections().count_total_connections(), 1);

        // 移开后连接消失
        engine.upsert_node(2, place(-24.0, 5.0));
        assert!(engine.is_outdated(&2));
        engine.recompute();
        assert_eq!(engine.connections().count_total_connections(), 0);
        assert!(engine.intersections().has_edge(&1, &2));

        engine.remove_node(&1);
        engine.recompute();
        assert!(!engine.intersections().has_edge(&1, &2));
        assert_eq!(engine.node_count(), 2);
    }

    #[test]
    fn test_config_from_json() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"broad_phase_margin": 1.0, "tolerances": {"position": 0.2}}"#).unwrap();
        assert_eq!(config.broad_phase_margin, 1.0);
        assert_eq!(config.tolerances.position, 0.2);
        assert_eq!(config.tolerances.colinearity, COLINEARITY_TOLERANCE_LDU);
        assert!(config.parallel);
    }
}
