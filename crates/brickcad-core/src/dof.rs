//! 自由度（DOF）
//!
//! 一个连接剩余的运动自由：可滑动的方向和可旋转的轴。
//! 多个连接同时作用时，用 [`reduce`] 求它们的交集。

use crate::geometry::{distance_point_to_line, is_almost_parallel};
use crate::math::{
    point_approx_eq, vec_approx_eq, Point3, Vector3, COLINEARITY_TOLERANCE_LDU,
    DOF_DIRECTION_TOLERANCE, EPSILON, POSITION_TOLERANCE_LDU,
};
use serde::{Deserialize, Serialize};

/// 绕一条轴线旋转的可能
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RotationPossibility {
    pub origin: Point3,
    /// 单位轴向
    pub axis: Vector3,
}

impl RotationPossibility {
    pub fn new(origin: Point3, axis: Vector3) -> Self {
        Self {
            origin,
            axis: axis.try_normalize(EPSILON).unwrap_or_else(Vector3::y),
        }
    }

    /// 两条旋转轴是否描述同一条直线
    ///
    /// 轴向近似平行，且两轴线之间的距离不超过共线容差。
    /// 距离对两条轴各测一次，取较大者，结果与参数顺序无关。
    pub fn compatible(&self, other: &RotationPossibility) -> bool {
        if !is_almost_parallel(&self.axis, &other.axis) {
            return false;
        }
        let d1 = distance_point_to_line(&other.origin, &self.origin, &self.axis);
        let d2 = distance_point_to_line(&self.origin, &other.origin, &other.axis);
        d1.max(d2) <= COLINEARITY_TOLERANCE_LDU
    }
}

impl PartialEq for RotationPossibility {
    fn eq(&self, other: &Self) -> bool {
        point_approx_eq(&self.origin, &other.origin, POSITION_TOLERANCE_LDU)
            && vec_approx_eq(&self.axis, &other.axis, DOF_DIRECTION_TOLERANCE)
    }
}

/// 剩余自由度，空表示完全固定
///
/// 相等比较按顺序逐项进行，方向与旋转都带容差。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DegreesOfFreedom {
    pub slide_directions: Vec<Vector3>,
    pub rotation_possibilities: Vec<RotationPossibility>,
}

impl DegreesOfFreedom {
    pub fn new(slide_directions: Vec<Vector3>, rotation_possibilities: Vec<RotationPossibility>) -> Self {
        Self {
            slide_directions: slide_directions
                .into_iter()
                .filter_map(|d| d.try_normalize(EPSILON))
                .collect(),
            rotation_possibilities,
        }
    }

    /// 完全固定
    pub fn fixed() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slide_directions.is_empty() && self.rotation_possibilities.is_empty()
    }

    pub fn can_slide(&self) -> bool {
        !self.slide_directions.is_empty()
    }

    pub fn can_rotate(&self) -> bool {
        !self.rotation_possibilities.is_empty()
    }

    /// 与另一个自由度求交
    pub fn intersect(&self, other: &DegreesOfFreedom) -> DegreesOfFreedom {
        DegreesOfFreedom {
            slide_directions: self
                .slide_directions
                .iter()
                .filter(|d| other.slide_directions.iter().any(|o| is_almost_parallel(d, o)))
                .copied()
                .collect(),
            rotation_possibilities: self
                .rotation_possibilities
                .iter()
                .filter(|r| other.rotation_possibilities.iter().any(|o| r.compatible(o)))
                .copied()
                .collect(),
        }
    }
}

impl PartialEq for DegreesOfFreedom {
    fn eq(&self, other: &Self) -> bool {
        self.slide_directions.len() == other.slide_directions.len()
            && self
                .slide_directions
                .iter()
                .zip(&other.slide_directions)
                .all(|(a, b)| vec_approx_eq(a, b, DOF_DIRECTION_TOLERANCE))
            && self.rotation_possibilities == other.rotation_possibilities
    }
}

/// 多个自由度的交集
///
/// 空输入返回空自由度；单个输入原样返回。结果不会比任何一个输入更自由。
pub fn reduce(dofs: &[DegreesOfFreedom]) -> DegreesOfFreedom {
    let Some((first, rest)) = dofs.split_first() else {
        return DegreesOfFreedom::default();
    };
    rest.iter()
        .fold(first.clone(), |acc, dof| acc.intersect(dof))
}
