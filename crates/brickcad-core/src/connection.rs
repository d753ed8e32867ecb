//! 连接：一对已匹配的连接器及其剩余自由度

use crate::connector::Connector;
use crate::dof::DegreesOfFreedom;
use serde::{Deserialize, Serialize};

/// 两个零件实例之间的一条连接
///
/// 连接器是已变换到世界空间的副本，由连接独占。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub connector_a: Connector,
    pub connector_b: Connector,
    pub degrees_of_freedom: DegreesOfFreedom,
    /// 两端连接器是否已被完全占用
    pub completely_used: [bool; 2],
}

impl Connection {
    pub fn new(connector_a: Connector, connector_b: Connector, degrees_of_freedom: DegreesOfFreedom) -> Self {
        Self {
            connector_a,
            connector_b,
            degrees_of_freedom,
            completely_used: [false, false],
        }
    }

    pub fn with_completely_used(mut self, a: bool, b: bool) -> Self {
        self.completely_used = [a, b];
        self
    }

    /// 交换两端
    pub fn reversed(&self) -> Connection {
        Connection {
            connector_a: self.connector_b.clone(),
            connector_b: self.connector_a.clone(),
            degrees_of_freedom: self.degrees_of_freedom.clone(),
            completely_used: [self.completely_used[1], self.completely_used[0]],
        }
    }

    /// 完全固定（无剩余自由度）
    pub fn is_rigid(&self) -> bool {
        self.degrees_of_freedom.is_empty()
    }
}
