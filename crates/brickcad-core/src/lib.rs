//! BrickCAD 连接引擎
//!
//! 判断两个已放置的零件实例能否拼接在一起，并维护整个模型的连接关系。
//!
//! # 架构设计
//!
//! - `Connector`: 零件上的可拼接区域（凸点、孔、销、夹子、铰链……）
//! - `Connection`: 一对匹配的连接器及剩余自由度
//! - `IntersectionGraph`: 包围盒重叠的节点对
//! - `ConnectionGraph`: 已确认连接的多重图，可提取连通分量
//! - `ConnectionEngine`: 编辑后增量重算两张图
//!
//! # 示例
//!
//! ```rust
//! use brickcad_core::prelude::*;
//! use std::sync::Arc;
//!
//! let graph = ConnectionGraph::new();
//! let stud = Connector::new(
//!     "",
//!     Point3::origin(),
//!     Vector3::y(),
//!     "stud",
//!     ConnectorKind::Cylindrical(Cylindrical::new(
//!         Gender::M,
//!         vec![CylindricalShapePart::new(CylindricalShapeType::Round, false, 4.0, 6.0)],
//!         false,
//!         true,
//!         false,
//!     )),
//! );
//! let hole = stud.clone();
//! graph.add_connection(&1, &2, Arc::new(Connection::new(stud, hole, DegreesOfFreedom::fixed())));
//! assert_eq!(graph.count_total_connections(), 1);
//! ```

pub mod broad_phase;
pub mod connection;
pub mod connection_graph;
pub mod connector;
pub mod dof;
pub mod engine;
pub mod geometry;
pub mod intersection_graph;
pub mod math;
pub mod node;
pub mod pair_checker;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::broad_phase::{aabb_from_corners, BroadPhase};
    pub use crate::connection::Connection;
    pub use crate::connection_graph::{ConnectionGraph, Edge};
    pub use crate::connector::{
        Bounding, Clip, Connector, ConnectorKind, ConnectorType, Cylindrical, CylindricalShapePart,
        CylindricalShapeType, Finger, Gender, Generic,
    };
    pub use crate::dof::{reduce, DegreesOfFreedom, RotationPossibility};
    pub use crate::engine::{ConnectionEngine, EngineConfig, PlacedPart, RecomputeStats, Tolerances};
    pub use crate::geometry::GeometryError;
    pub use crate::intersection_graph::IntersectionGraph;
    pub use crate::math::{Matrix3, Matrix4, Point3, Vector3};
    pub use crate::node::NodeId;
    pub use crate::pair_checker::{find_connections, PairChecker};
}
