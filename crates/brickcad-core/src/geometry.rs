//! 几何辅助函数
//!
//! 带容差的向量/矩阵工具：
//! - 平行、共线判定
//! - 垂直向量构造
//! - 点到直线的投影
//! - 变换的缩放因子提取

use crate::math::{
    linear_part, Matrix4, Point3, Rotation3, Vector3, COLINEARITY_TOLERANCE_LDU, EPSILON,
    PARALLELITY_ANGLE_TOLERANCE_SQUARED, UNIT_SCALE_TOLERANCE,
};
use thiserror::Error;

/// 几何工具的参数错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// 两个向量是否近似平行（同向或反向）
pub fn is_almost_parallel(a: &Vector3, b: &Vector3) -> bool {
    let (Some(a), Some(b)) = (a.try_normalize(EPSILON), b.try_normalize(EPSILON)) else {
        return false;
    };
    a.cross(&b).norm_squared() < PARALLELITY_ANGLE_TOLERANCE_SQUARED
}

/// 任取一个与 `v` 垂直的单位向量
///
/// 与 `v` 最不对齐的坐标轴做叉积，避免分量为零时除零。
pub fn any_perpendicular_vector(v: &Vector3) -> Vector3 {
    let abs = v.abs();
    let axis = if abs.x <= abs.y && abs.x <= abs.z {
        Vector3::x()
    } else if abs.y <= abs.z {
        Vector3::y()
    } else {
        Vector3::z()
    };
    v.cross(&axis)
        .try_normalize(EPSILON)
        .unwrap_or_else(Vector3::x)
}

/// 点到直线（过 `origin`，单位方向 `direction`）的距离
pub fn distance_point_to_line(point: &Point3, origin: &Point3, direction: &Vector3) -> f64 {
    (point - origin).cross(direction).norm()
}

/// 点在线段上的投影结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalProjection {
    /// 从起点到垂足的有向长度
    pub projection_length: f64,
    /// 点到直线的距离
    pub distance_point_to_line: f64,
    /// 线段长度
    pub line_length: f64,
}

/// 将点垂直投影到 `start`-`end` 所在直线上（不截断）
///
/// 退化线段（长度为零）时投影长度为 0，距离为点到起点的距离。
pub fn normal_projection_on_line(start: &Point3, end: &Point3, point: &Point3) -> NormalProjection {
    let line = end - start;
    let line_length = line.norm();
    let start_to_point = point - start;
    if line_length < EPSILON {
        return NormalProjection {
            projection_length: 0.0,
            distance_point_to_line: start_to_point.norm(),
            line_length,
        };
    }
    let unit = line / line_length;
    NormalProjection {
        projection_length: start_to_point.dot(&unit),
        distance_point_to_line: start_to_point.cross(&unit).norm(),
        line_length,
    }
}

/// 两条轴线是否共线（平行且彼此距离小于容差）
pub fn are_colinear(origin_a: &Point3, dir_a: &Vector3, origin_b: &Point3, dir_b: &Vector3) -> bool {
    if !is_almost_parallel(dir_a, dir_b) {
        return false;
    }
    let (Some(ua), Some(ub)) = (dir_a.try_normalize(EPSILON), dir_b.try_normalize(EPSILON)) else {
        return false;
    };
    distance_point_to_line(origin_b, origin_a, &ua) <= COLINEARITY_TOLERANCE_LDU
        && distance_point_to_line(origin_a, origin_b, &ub) <= COLINEARITY_TOLERANCE_LDU
}

/// 变换是否翻转了绕序（镜像）
pub fn inverts_winding_order(transform: &Matrix4) -> bool {
    linear_part(transform).determinant() < 0.0
}

/// 变换点（w = 1）
#[inline]
pub fn transform_point(transform: &Matrix4, point: &Point3) -> Point3 {
    transform.transform_point(point)
}

/// 变换方向（w = 0，不含平移）
#[inline]
pub fn transform_direction(transform: &Matrix4, direction: &Vector3) -> Vector3 {
    transform.transform_vector(direction)
}

/// 变换是否只包含旋转和平移（对角线绝对值都接近 1）
pub fn is_unscaled(transform: &Matrix4) -> bool {
    (0..3).all(|i| (transform[(i, i)].abs() - 1.0).abs() < UNIT_SCALE_TOLERANCE)
}

/// 计算沿 `direction` 轴的径向与轴向缩放因子
///
/// 返回 `(radius_factor, length_factor)`：
/// - 径向因子：垂直于轴的单位向量变换后的长度
/// - 轴向因子：轴方向单位向量变换后的长度
pub fn radius_and_length_factors(transform: &Matrix4, direction: &Vector3) -> (f64, f64) {
    if is_unscaled(transform) {
        return (1.0, 1.0);
    }
    let Some(axis) = direction.try_normalize(EPSILON) else {
        return (1.0, 1.0);
    };
    let perpendicular = any_perpendicular_vector(&axis);
    let transformed_axis = transform_direction(transform, &axis);
    let transformed_perpendicular = transform_direction(transform, &perpendicular);
    (transformed_perpendicular.norm(), transformed_axis.norm())
}

/// 标准视图的旋转
///
/// 1 前视、2 顶视、3 右视、4 后视、5 底视、6 左视。
pub fn standard_view_rotation(index: u8) -> Result<Rotation3, GeometryError> {
    use std::f64::consts::{FRAC_PI_2, PI};

    let rotation = match index {
        1 => Rotation3::identity(),
        2 => Rotation3::from_axis_angle(&Vector3::x_axis(), -FRAC_PI_2),
        3 => Rotation3::from_axis_angle(&Vector3::y_axis(), -FRAC_PI_2),
        4 => Rotation3::from_axis_angle(&Vector3::y_axis(), PI),
        5 => Rotation3::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2),
        6 => Rotation3::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2),
        other => {
            return Err(GeometryError::InvalidArgument(format!(
                "standard view index must be 1..=6, got {}",
                other
            )))
        }
    };
    Ok(rotation)
}
