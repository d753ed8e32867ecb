//! 数学类型与容差常量
//!
//! 所有长度单位均为 LDU（LDraw Unit，1 个凸点宽 20 LDU）。

pub type Point3 = nalgebra::Point3<f64>;
pub type Vector3 = nalgebra::Vector3<f64>;
pub type Matrix3 = nalgebra::Matrix3<f64>;
pub type Matrix4 = nalgebra::Matrix4<f64>;
pub type Rotation3 = nalgebra::Rotation3<f64>;

/// 通用浮点比较容差
pub const EPSILON: f64 = 1e-10;

/// 平行判定的角度容差（约 1°，用于叉积长度）
pub const PARALLELITY_ANGLE_TOLERANCE: f64 = 0.018;
pub const PARALLELITY_ANGLE_TOLERANCE_SQUARED: f64 =
    PARALLELITY_ANGLE_TOLERANCE * PARALLELITY_ANGLE_TOLERANCE;

/// 共线判定：点到轴线的最大距离
pub const COLINEARITY_TOLERANCE_LDU: f64 = 0.1;

/// 位置比较容差
pub const POSITION_TOLERANCE_LDU: f64 = 0.1;

/// 方向向量逐分量比较容差
pub const DIRECTION_TOLERANCE: f64 = PARALLELITY_ANGLE_TOLERANCE;

/// 自由度比较时方向向量逐分量容差
pub const DOF_DIRECTION_TOLERANCE: f64 = 0.01;

/// 公母半径允许的差值
pub const CONNECTION_RADIUS_TOLERANCE: f64 = 1.0;

/// 变换对角线与 1 的差小于此值时视为无缩放
pub const UNIT_SCALE_TOLERANCE: f64 = 0.001;

/// 两个浮点数在容差内相等
#[inline]
pub fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

/// 向量逐分量在容差内相等
#[inline]
pub fn vec_approx_eq(a: &Vector3, b: &Vector3, tolerance: f64) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| approx_eq(*x, *y, tolerance))
}

/// 点逐分量在容差内相等
#[inline]
pub fn point_approx_eq(a: &Point3, b: &Point3, tolerance: f64) -> bool {
    vec_approx_eq(&a.coords, &b.coords, tolerance)
}

/// 由平移向量构造 4x4 变换
pub fn translation(offset: Vector3) -> Matrix4 {
    Matrix4::new_translation(&offset)
}

/// 由 3x3 线性部分与平移构造 4x4 变换
pub fn from_linear_and_translation(linear: &Matrix3, offset: &Vector3) -> Matrix4 {
    let mut m = linear.to_homogeneous();
    m.fixed_view_mut::<3, 1>(0, 3).copy_from(offset);
    m
}

/// 取 4x4 变换的线性部分
pub fn linear_part(m: &Matrix4) -> Matrix3 {
    m.fixed_view::<3, 3>(0, 0).into_owned()
}
