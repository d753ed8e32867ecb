//! 连接器模型
//!
//! 连接器描述零件上的一个可拼接区域：一个起点、一个单位方向，以及与种类相关的
//! 形状参数。支持的种类：
//! - 圆柱 (Cylindrical)：凸点、孔、销、轴
//! - 夹子 (Clip)
//! - 指状铰链 (Finger)
//! - 通用包围体 (Generic)
//!
//! 连接器是不可变的值对象。同一零件定义的连接器被该零件的所有实例共享，
//! `transform` 总是返回新的连接器，不会修改原值。
//!
//! 相等比较带容差（连接器描述的是容差范围内的拼接区域，而不是精确的点）：
//! 种类、分组、起点和方向。哈希只覆盖种类和分组。

use crate::geometry::{radius_and_length_factors, transform_direction, transform_point};
use crate::math::{
    point_approx_eq, vec_approx_eq, Matrix4, Point3, Vector3, DIRECTION_TOLERANCE, EPSILON,
    POSITION_TOLERANCE_LDU,
};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// 公/母
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[default]
    M,
    F,
}

impl Gender {
    pub fn opposite(self) -> Self {
        match self {
            Gender::M => Gender::F,
            Gender::F => Gender::M,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Gender::M => "M",
            Gender::F => "F",
        }
    }
}

/// 连接器种类标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectorType {
    Cylindrical,
    Clip,
    Finger,
    Generic,
}

impl ConnectorType {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectorType::Cylindrical => "cylindrical",
            ConnectorType::Clip => "clip",
            ConnectorType::Finger => "finger",
            ConnectorType::Generic => "generic",
        }
    }
}

/// 圆柱截面形状
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CylindricalShapeType {
    /// 圆形，可旋转
    Round,
    /// 十字轴
    Axle,
    /// 方形
    Square,
}

/// 圆柱连接器的一段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CylindricalShapePart {
    pub shape: CylindricalShapeType,
    /// 半径可变（锥形过渡段）
    pub flexible_radius: bool,
    pub radius: f64,
    pub length: f64,
}

impl CylindricalShapePart {
    pub fn new(shape: CylindricalShapeType, flexible_radius: bool, radius: f64, length: f64) -> Self {
        Self {
            shape,
            flexible_radius,
            radius,
            length,
        }
    }
}

/// 圆柱连接器（凸点、孔、销、轴）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cylindrical {
    pub gender: Gender,
    /// 沿方向依次排列的各段
    pub parts: Vec<CylindricalShapePart>,
    pub open_start: bool,
    pub open_end: bool,
    pub slide: bool,
}

impl Cylindrical {
    pub fn new(
        gender: Gender,
        parts: Vec<CylindricalShapePart>,
        open_start: bool,
        open_end: bool,
        slide: bool,
    ) -> Self {
        Self {
            gender,
            parts,
            open_start,
            open_end,
            slide,
        }
    }

    /// 所有段长度之和
    pub fn total_length(&self) -> f64 {
        self.parts.iter().map(|p| p.length).sum()
    }

    /// 距起点 `offset` 处的截面
    ///
    /// 越界时返回第一段或最后一段；没有任何段时返回 `None`。
    pub fn part_at(&self, offset: f64) -> Option<&CylindricalShapePart> {
        let mut remaining = offset;
        for part in &self.parts {
            if remaining < part.length {
                return Some(part);
            }
            remaining -= part.length;
        }
        self.parts.last()
    }

    /// 距起点 `offset` 处的半径
    pub fn radius_at(&self, offset: f64) -> Option<f64> {
        self.part_at(offset).map(|p| p.radius)
    }

    fn scaled(&self, radius_factor: f64, length_factor: f64) -> Self {
        Self {
            parts: self
                .parts
                .iter()
                .map(|p| CylindricalShapePart {
                    radius: p.radius * radius_factor,
                    length: p.length * length_factor,
                    ..p.clone()
                })
                .collect(),
            ..self.clone()
        }
    }
}

/// 夹子连接器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub radius: f64,
    /// 沿方向的宽度
    pub width: f64,
    pub slide: bool,
    /// 开口方向（单位向量）
    pub opening_direction: Vector3,
}

impl Clip {
    pub fn new(radius: f64, width: f64, slide: bool, opening_direction: Vector3) -> Self {
        Self {
            radius,
            width,
            slide,
            opening_direction: normalize_or(opening_direction, -Vector3::z()),
        }
    }
}

/// 指状铰链连接器
///
/// 沿方向交替排列的公母“指”，第一根指的性别由 `first_finger_gender` 决定。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finger {
    pub first_finger_gender: Gender,
    pub radius: f64,
    pub finger_widths: Vec<f64>,
}

impl Finger {
    pub fn new(first_finger_gender: Gender, radius: f64, finger_widths: Vec<f64>) -> Self {
        Self {
            first_finger_gender,
            radius,
            finger_widths,
        }
    }

    pub fn total_width(&self) -> f64 {
        self.finger_widths.iter().sum()
    }

    /// 第 `index` 根指的性别
    pub fn gender_of(&self, index: usize) -> Gender {
        if index % 2 == 0 {
            self.first_finger_gender
        } else {
            self.first_finger_gender.opposite()
        }
    }
}

/// 通用连接器的包围形状
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Bounding {
    Point,
    Box { x: f64, y: f64, z: f64 },
    Cube { size: f64 },
    Cylinder { radius: f64, length: f64 },
    Sphere { radius: f64 },
}

impl Bounding {
    /// LDCad 关键字
    pub fn keyword(&self) -> &'static str {
        match self {
            Bounding::Point => "pnt",
            Bounding::Box { .. } => "box",
            Bounding::Cube { .. } => "cube",
            Bounding::Cylinder { .. } => "cyl",
            Bounding::Sphere { .. } => "sph",
        }
    }
}

/// 通用连接器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generic {
    pub gender: Gender,
    pub bounding: Bounding,
}

impl Generic {
    pub fn new(gender: Gender, bounding: Bounding) -> Self {
        Self { gender, bounding }
    }
}

/// 连接器种类及其专有参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConnectorKind {
    Cylindrical(Cylindrical),
    Clip(Clip),
    Finger(Finger),
    Generic(Generic),
}

impl ConnectorKind {
    pub fn connector_type(&self) -> ConnectorType {
        match self {
            ConnectorKind::Cylindrical(_) => ConnectorType::Cylindrical,
            ConnectorKind::Clip(_) => ConnectorType::Clip,
            ConnectorKind::Finger(_) => ConnectorType::Finger,
            ConnectorKind::Generic(_) => ConnectorType::Generic,
        }
    }
}

/// 连接器
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connector {
    group: String,
    start: Point3,
    direction: Vector3,
    source_trace: String,
    kind: ConnectorKind,
}

impl Connector {
    /// 创建连接器，`direction` 会被归一化
    pub fn new(
        group: impl Into<String>,
        start: Point3,
        direction: Vector3,
        source_trace: impl Into<String>,
        kind: ConnectorKind,
    ) -> Self {
        let source_trace = source_trace.into();
        let direction = match direction.try_normalize(EPSILON) {
            Some(d) => d,
            None => {
                tracing::warn!(
                    "Connector from '{}' has a zero direction, using -Y",
                    source_trace
                );
                -Vector3::y()
            }
        };
        Self {
            group: group.into(),
            start,
            direction,
            source_trace,
            kind,
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn start(&self) -> &Point3 {
        &self.start
    }

    /// 单位方向向量
    pub fn direction(&self) -> &Vector3 {
        &self.direction
    }

    pub fn source_trace(&self) -> &str {
        &self.source_trace
    }

    pub fn kind(&self) -> &ConnectorKind {
        &self.kind
    }

    pub fn connector_type(&self) -> ConnectorType {
        self.kind.connector_type()
    }

    pub fn as_cylindrical(&self) -> Option<&Cylindrical> {
        match &self.kind {
            ConnectorKind::Cylindrical(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_clip(&self) -> Option<&Clip> {
        match &self.kind {
            ConnectorKind::Clip(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_finger(&self) -> Option<&Finger> {
        match &self.kind {
            ConnectorKind::Finger(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_generic(&self) -> Option<&Generic> {
        match &self.kind {
            ConnectorKind::Generic(g) => Some(g),
            _ => None,
        }
    }

    /// 沿方向的长度（圆柱总长、夹子宽度、指总宽；通用连接器为 0）
    pub fn axial_length(&self) -> f64 {
        match &self.kind {
            ConnectorKind::Cylindrical(c) => c.total_length(),
            ConnectorKind::Clip(c) => c.width,
            ConnectorKind::Finger(f) => f.total_width(),
            ConnectorKind::Generic(_) => 0.0,
        }
    }

    /// 沿方向的终点
    pub fn end(&self) -> Point3 {
        self.start + self.direction * self.axial_length()
    }

    /// 平移后的副本
    pub fn translated(&self, offset: &Vector3) -> Connector {
        Connector {
            start: self.start + offset,
            ..self.clone()
        }
    }

    /// 应用仿射变换，返回新的连接器
    ///
    /// 半径按垂直于轴的缩放因子缩放，长度/宽度按沿轴的缩放因子缩放，
    /// 因此非均匀缩放下半径与长度可以独立变化。
    pub fn transform(&self, transformation: &Matrix4) -> Connector {
        let (radius_factor, length_factor) =
            radius_and_length_factors(transformation, &self.direction);

        let kind = match &self.kind {
            ConnectorKind::Cylindrical(c) => {
                ConnectorKind::Cylindrical(c.scaled(radius_factor, length_factor))
            }
            ConnectorKind::Clip(c) => ConnectorKind::Clip(Clip::new(
                c.radius * radius_factor,
                c.width * length_factor,
                c.slide,
                transform_direction(transformation, &c.opening_direction),
            )),
            ConnectorKind::Finger(f) => ConnectorKind::Finger(Finger::new(
                f.first_finger_gender,
                f.radius * radius_factor,
                f.finger_widths.iter().map(|w| w * length_factor).collect(),
            )),
            ConnectorKind::Generic(g) => ConnectorKind::Generic(g.clone()),
        };

        Connector::new(
            self.group.clone(),
            transform_point(transformation, &self.start),
            transform_direction(transformation, &self.direction),
            self.source_trace.clone(),
            kind,
        )
    }

    /// 单行描述，用于调试输出
    pub fn info(&self) -> String {
        let header = format!(
            "group={}, start=({:.2}, {:.2}, {:.2}), direction=({:.3}, {:.3}, {:.3})",
            self.group,
            self.start.x,
            self.start.y,
            self.start.z,
            self.direction.x,
            self.direction.y,
            self.direction.z
        );
        match &self.kind {
            ConnectorKind::Cylindrical(c) => {
                let parts: Vec<String> = c
                    .parts
                    .iter()
                    .map(|p| {
                        format!(
                            "{:?}[r={}, fr={}, l={}]",
                            p.shape, p.radius, p.flexible_radius, p.length
                        )
                    })
                    .collect();
                format!(
                    "cylindrical[gender={}, {}, openStart={}, openEnd={}, slide={}, parts=[{}]]",
                    c.gender.name(),
                    header,
                    c.open_start,
                    c.open_end,
                    c.slide,
                    parts.join(", ")
                )
            }
            ConnectorKind::Clip(c) => format!(
                "clip[{}, radius={}, width={}, slide={}]",
                header, c.radius, c.width, c.slide
            ),
            ConnectorKind::Finger(f) => format!(
                "finger[{}, firstFingerGender={}, radius={}, fingerWidths={:?}]",
                header,
                f.first_finger_gender.name(),
                f.radius,
                f.finger_widths
            ),
            ConnectorKind::Generic(g) => format!(
                "generic[{}, gender={}, bounding={}]",
                header,
                g.gender.name(),
                g.bounding.keyword()
            ),
        }
    }
}

impl PartialEq for Connector {
    /// 种类相同、分组相同，起点与方向在容差内；种类专有参数不参与比较
    fn eq(&self, other: &Self) -> bool {
        self.connector_type() == other.connector_type()
            && self.group == other.group
            && point_approx_eq(&self.start, &other.start, POSITION_TOLERANCE_LDU)
            && vec_approx_eq(&self.direction, &other.direction, DIRECTION_TOLERANCE)
    }
}

impl Eq for Connector {}

// 坐标量化在格边界处与容差相等不一致（0.04 与 0.06），只哈希离散字段
impl Hash for Connector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.connector_type().hash(state);
        self.group.hash(state);
    }
}

fn normalize_or(v: Vector3, fallback: Vector3) -> Vector3 {
    v.try_normalize(EPSILON).unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Rotation3;
    use std::collections::hash_map::DefaultHasher;

    fn stud() -> Connector {
        Connector::new(
            "",
            Point3::new(10.0, 0.0, 10.0),
            -Vector3::y(),
            "3001.dat",
            ConnectorKind::Cylindrical(Cylindrical::new(
                Gender::M,
                vec![CylindricalShapePart::new(
                    CylindricalShapeType::Round,
                    false,
                    6.0,
                    4.0,
                )],
                false,
                true,
                false,
            )),
        )
    }

    fn hash_of(c: &Connector) -> u64 {
        let mut h = DefaultHasher::new();
        c.hash(&mut h);
        h.finish()
    }

    #[test]
    fn test_direction_normalized() {
        let c = Connector::new(
            "",
            Point3::origin(),
            Vector3::new(0.0, 5.0, 0.0),
            "",
            ConnectorKind::Generic(Generic::new(Gender::M, Bounding::Point)),
        );
        assert!((c.direction().norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rigid_transform_keeps_dimensions() {
        let rotation = Rotation3::from_axis_angle(&Vector3::x_axis(), 0.9);
        let mut m = rotation.to_homogeneous();
        m[(0, 3)] = 5.0;
        m[(1, 3)] = -8.0;

        let c = stud();
        let t = c.transform(&m);
        let cyl = t.as_cylindrical().unwrap();
        assert!((cyl.parts[0].radius - 6.0).abs() < 1e-9);
        assert!((cyl.parts[0].length - 4.0).abs() < 1e-9);

        let expected_start = rotation * c.start() + Vector3::new(5.0, -8.0, 0.0);
        assert!((t.start() - expected_start).norm() < 1e-9);
        let expected_dir = rotation * c.direction();
        assert!((t.direction() - expected_dir).norm() < 1e-9);

        // 原值不受影响
        assert_eq!(c.start(), &Point3::new(10.0, 0.0, 10.0));
    }

    #[test]
    fn test_uniform_scale() {
        let m = Matrix4::new_scaling(2.5);
        let fingers = Connector::new(
            "hinge",
            Point3::origin(),
            Vector3::x(),
            "",
            ConnectorKind::Finger(Finger::new(Gender::F, 4.0, vec![4.0, 8.0, 4.0])),
        );
        let t = fingers.transform(&m);
        let f = t.as_finger().unwrap();
        assert!((f.radius - 10.0).abs() < 1e-9);
        assert!((f.total_width() - 40.0).abs() < 1e-9);
        assert!((t.direction().norm() - 1.0).abs() < 1e-12);

        let t = stud().transform(&m);
        let cyl = t.as_cylindrical().unwrap();
        assert!((cyl.parts[0].radius - 15.0).abs() < 1e-9);
        assert!((cyl.total_length() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_uniform_scale() {
        let m = Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 3.0, 1.0));
        let clip = Connector::new(
            "",
            Point3::origin(),
            -Vector3::y(),
            "",
            ConnectorKind::Clip(Clip::new(4.0, 8.0, false, -Vector3::z())),
        );
        let t = clip.transform(&m);
        let c = t.as_clip().unwrap();
        assert!((c.radius - 4.0).abs() < 1e-9);
        assert!((c.width - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_tolerant_equality() {
        let a = stud();
        let b = a.translated(&Vector3::new(0.03, 0.0, -0.02));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let far = a.translated(&Vector3::new(1.0, 0.0, 0.0));
        assert_ne!(a, far);

        let generic = Connector::new(
            "",
            *a.start(),
            *a.direction(),
            "",
            ConnectorKind::Generic(Generic::new(Gender::M, Bounding::Point)),
        );
        assert_ne!(a, generic);
    }

    #[test]
    fn test_equality_ignores_kind_parameters() {
        let narrow = stud();
        let wide = Connector::new(
            "",
            *narrow.start(),
            *narrow.direction(),
            "other.dat",
            ConnectorKind::Cylindrical(Cylindrical::new(
                Gender::F,
                vec![CylindricalShapePart::new(CylindricalShapeType::Axle, false, 4.0, 12.0)],
                true,
                true,
                true,
            )),
        );
        assert_eq!(narrow, wide);
        assert_eq!(hash_of(&narrow), hash_of(&wide));

        let grouped = Connector::new("g", *narrow.start(), *narrow.direction(), "", narrow.kind().clone());
        assert_ne!(narrow, grouped);
    }

    #[test]
    fn test_hash_across_quantum_boundary() {
        let a = stud().translated(&Vector3::new(0.04, 0.0, 0.0));
        let b = stud().translated(&Vector3::new(0.06, 0.0, 0.0));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_uniform_scale_clip_and_generic() {
        let m = Matrix4::new_scaling(2.0);
        let clip = Connector::new(
            "",
            Point3::new(0.0, 4.0, 0.0),
            -Vector3::y(),
            "",
            ConnectorKind::Clip(Clip::new(4.0, 8.0, true, -Vector3::z())),
        );
        let t = clip.transform(&m);
        let c = t.as_clip().unwrap();
        assert!((c.radius - 8.0).abs() < 1e-9);
        assert!((c.width - 16.0).abs() < 1e-9);
        assert!((c.opening_direction - (-Vector3::z())).norm() < 1e-9);
        assert!((t.start() - Point3::new(0.0, 8.0, 0.0)).norm() < 1e-9);

        let generic = Connector::new(
            "tow",
            Point3::new(1.0, 2.0, 3.0),
            Vector3::x(),
            "",
            ConnectorKind::Generic(Generic::new(Gender::F, Bounding::Box { x: 4.0, y: 2.0, z: 4.0 })),
        );
        let t = generic.transform(&m);
        let g = t.as_generic().unwrap();
        assert_eq!(g.bounding, Bounding::Box { x: 4.0, y: 2.0, z: 4.0 });
        assert_eq!(g.gender, Gender::F);
        assert!((t.start() - Point3::new(2.0, 4.0, 6.0)).norm() < 1e-9);
        assert!((t.direction().norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_clone_is_equal() {
        let a = stud();
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.info(), b.info());
    }

    #[test]
    fn test_part_at() {
        let cyl = Cylindrical::new(
            Gender::F,
            vec![
                CylindricalShapePart::new(CylindricalShapeType::Round, false, 6.0, 4.0),
                CylindricalShapePart::new(CylindricalShapeType::Axle, false, 4.0, 16.0),
            ],
            true,
            true,
            false,
        );
        assert_eq!(cyl.part_at(2.0).unwrap().shape, CylindricalShapeType::Round);
        assert_eq!(cyl.part_at(10.0).unwrap().shape, CylindricalShapeType::Axle);
        assert_eq!(cyl.radius_at(100.0), Some(4.0));
        assert_eq!(cyl.radius_at(-1.0), Some(6.0));
        assert!((cyl.total_length() - 20.0).abs() < 1e-12);
    }
}
