//! 连接器配对检测
//!
//! 对两个已变换到世界空间的连接器判断能否拼接，能则生成带自由度的 [`Connection`]。
//!
//! 支持的组合：
//! - 圆柱 - 圆柱：公母相反、共线且重叠，逐段比较半径
//! - 夹子 - 圆柱：夹子起点落在公圆柱轴线上
//! - 指 - 指：同组、半径相近，公母指交替且宽度一致
//! - 通用 - 通用：同组、公母相反、起点重合

use crate::connection::Connection;
use crate::connector::{Clip, Connector, ConnectorKind, Cylindrical, CylindricalShapeType, Finger, Gender};
use crate::dof::{DegreesOfFreedom, RotationPossibility};
use crate::engine::Tolerances;
use crate::geometry::normal_projection_on_line;

/// `a` 不大于 `b`（容差内）
#[inline]
fn almost_less(a: f64, b: f64, tolerance: f64) -> bool {
    b - a + tolerance > 0.0
}

/// `a` 不小于 `b`（容差内）
#[inline]
fn almost_greater(a: f64, b: f64, tolerance: f64) -> bool {
    a - b + tolerance > 0.0
}

/// 单对连接器的检测器
pub struct PairChecker<'a> {
    a: &'a Connector,
    b: &'a Connector,
    tolerances: &'a Tolerances,
    parallel: bool,
    same_dir: bool,
    opposite_dir: bool,
}

impl<'a> PairChecker<'a> {
    pub fn new(a: &'a Connector, b: &'a Connector, tolerances: &'a Tolerances) -> Self {
        let parallel = a.direction().cross(b.direction()).norm_squared()
            < tolerances.parallel_angle * tolerances.parallel_angle;
        let same_dir = parallel && a.direction().dot(b.direction()) > 0.0;
        Self {
            a,
            b,
            tolerances,
            parallel,
            same_dir,
            opposite_dir: parallel && !same_dir,
        }
    }

    /// 检测这一对连接器，返回找到的连接（至多一个）
    pub fn find_connection(&self) -> Option<Connection> {
        let found = match (self.a.kind(), self.b.kind()) {
            (ConnectorKind::Cylindrical(ca), ConnectorKind::Cylindrical(cb)) => self.find_cyl_cyl(ca, cb),
            (ConnectorKind::Cylindrical(cyl), ConnectorKind::Clip(clip)) => {
                self.find_clip_cyl(self.b, clip, self.a, cyl)
            }
            (ConnectorKind::Clip(clip), ConnectorKind::Cylindrical(cyl)) => {
                self.find_clip_cyl(self.a, clip, self.b, cyl)
            }
            (ConnectorKind::Finger(fa), ConnectorKind::Finger(fb)) => self.find_finger_finger(fa, fb),
            (ConnectorKind::Generic(ga), ConnectorKind::Generic(gb)) => {
                let close = (self.b.start() - self.a.start()).norm_squared()
                    < self.tolerances.position * self.tolerances.position;
                (self.a.group() == self.b.group() && ga.gender != gb.gender && close)
                    .then(|| (DegreesOfFreedom::fixed(), [true, true]))
            }
            _ => None,
        };

        found.map(|(dof, used)| {
            tracing::trace!(
                "Connection {} <-> {} (slide: {}, rotate: {})",
                self.a.source_trace(),
                self.b.source_trace(),
                dof.can_slide(),
                dof.can_rotate()
            );
            Connection::new(self.a.clone(), self.b.clone(), dof).with_completely_used(used[0], used[1])
        })
    }

    /// 两个连接器共线时，返回 `b` 起点在 `a` 轴上的投影长度
    fn project_with_length(&self, a_length: f64, b_length: f64) -> Option<f64> {
        let start_diff = self.b.start() - self.a.start();
        let projection = start_diff.dot(self.a.direction());
        let distance = start_diff.cross(self.a.direction()).norm();

        let disjoint = (self.same_dir && projection > a_length)
            || (self.same_dir && projection < -b_length)
            || (self.opposite_dir && projection > a_length + b_length)
            || (self.opposite_dir && projection < 0.0);
        if disjoint || distance >= self.tolerances.colinearity {
            None
        } else {
            Some(projection)
        }
    }

    fn find_cyl_cyl(&self, ca: &Cylindrical, cb: &Cylindrical) -> Option<(DegreesOfFreedom, [bool; 2])> {
        if !self.parallel || ca.gender == cb.gender || ca.parts.is_empty() || cb.parts.is_empty() {
            return None;
        }
        let start_offset = self.project_with_length(ca.total_length(), cb.total_length())?;
        let pos_tol = self.tolerances.position;
        let radius_tol = self.tolerances.connection_radius;
        let male_is_a = ca.gender == Gender::M;

        // 两侧各段在 a 轴上的边界
        let mut a_bounds = Vec::with_capacity(ca.parts.len() + 1);
        let mut offset = 0.0;
        a_bounds.push(offset);
        for part in &ca.parts {
            offset += part.length;
            a_bounds.push(offset);
        }

        let b_parts = aligned_with_a(&cb.parts, !self.same_dir);
        let mut offset = if self.same_dir {
            start_offset
        } else {
            start_offset - cb.total_length()
        };
        let mut b_bounds = Vec::with_capacity(b_parts.len() + 1);
        b_bounds.push(offset);
        for part in &b_parts {
            offset += part.length;
            b_bounds.push(offset);
        }

        let a_last = ca.parts.len() as isize - 1;
        let b_last = b_parts.len() as isize - 1;
        let mut a_cursor: isize = if almost_less(a_bounds[0], b_bounds[0], pos_tol) { 0 } else { -1 };
        let mut b_cursor: isize = if almost_greater(a_bounds[0], b_bounds[0], pos_tol) { 0 } else { -1 };
        let mut used_a = almost_greater(a_bounds[0], b_bounds[0], pos_tol);
        let mut used_b = almost_greater(b_bounds[0], a_bounds[0], pos_tol);
        let mut rotation_possible = true;
        let mut contact = false;
        let slide_possible = ca.slide || cb.slide;

        let bound = |bounds: &[f64], cursor: isize| bounds[(cursor + 1) as usize];

        while a_cursor <= a_last && b_cursor <= b_last {
            if a_cursor >= 0 && b_cursor >= 0 {
                let pa = &ca.parts[a_cursor as usize];
                let pb = &b_parts[b_cursor as usize];
                let (male, female) = if male_is_a {
                    (pa.radius, pb.radius)
                } else {
                    (pb.radius, pa.radius)
                };
                if male - female > radius_tol {
                    tracing::trace!("Radial collision between cylinders");
                    return None;
                }
                contact |= female - male < radius_tol;
                if pa.shape != CylindricalShapeType::Round && pa.shape == pb.shape {
                    rotation_possible = false;
                }
                let a_done = a_cursor >= a_last
                    && almost_less(bound(&a_bounds, a_cursor), b_bounds[b_cursor as usize], pos_tol);
                let b_done = b_cursor >= b_last
                    && almost_less(bound(&b_bounds, b_cursor), a_bounds[a_cursor as usize], pos_tol);
                if a_done || b_done {
                    break;
                }
            }
            if almost_less(bound(&a_bounds, a_cursor), bound(&b_bounds, b_cursor), pos_tol) {
                a_cursor += 1;
            }
            if a_cursor <= a_last
                && almost_greater(bound(&a_bounds, a_cursor), bound(&b_bounds, b_cursor), pos_tol)
            {
                b_cursor += 1;
            }
        }
        if !contact {
            return None;
        }
        used_a &= a_cursor >= a_last;
        used_b &= b_cursor >= b_last;

        let mut dof = DegreesOfFreedom::fixed();
        if slide_possible {
            dof.slide_directions.push(*self.a.direction());
        }
        if rotation_possible {
            dof.rotation_possibilities
                .push(RotationPossibility::new(*self.a.start(), *self.a.direction()));
        }
        Some((dof, [used_a, used_b]))
    }

    fn find_clip_cyl(
        &self,
        clip_connector: &Connector,
        clip: &Clip,
        cyl_connector: &Connector,
        cyl: &Cylindrical,
    ) -> Option<(DegreesOfFreedom, [bool; 2])> {
        if !self.parallel || cyl.gender != Gender::M || cyl.parts.is_empty() {
            return None;
        }
        let projection = normal_projection_on_line(
            cyl_connector.start(),
            &cyl_connector.end(),
            clip_connector.start(),
        );
        if projection.distance_point_to_line > self.tolerances.position {
            return None;
        }
        let mut offset = projection.projection_length;
        if self.opposite_dir {
            offset -= clip.width;
        }

        let count = cyl.parts.len();
        let mut i = 0;
        while i + 1 < count && offset > cyl.parts[i].length {
            offset -= cyl.parts[i].length;
            i += 1;
        }
        let mut cyl_used = i == 0;

        let mut touching = false;
        while offset > -clip.width && i < count {
            let radius_diff = cyl.parts[i].radius - clip.radius;
            if radius_diff > self.tolerances.connection_radius {
                return None;
            }
            touching |= radius_diff > -self.tolerances.connection_radius;
            offset -= cyl.parts[i].length;
            i += 1;
        }
        if !touching {
            return None;
        }
        cyl_used &= i + 1 >= count;
        let clip_used = offset < -clip.width;

        let mut dof = DegreesOfFreedom::fixed();
        dof.rotation_possibilities.push(RotationPossibility::new(
            *cyl_connector.start(),
            *cyl_connector.direction(),
        ));
        if cyl.slide && clip.slide {
            dof.slide_directions.push(*cyl_connector.direction());
        }
        let used = if std::ptr::eq(cyl_connector, self.a) {
            [cyl_used, clip_used]
        } else {
            [clip_used, cyl_used]
        };
        Some((dof, used))
    }

    fn find_finger_finger(&self, fa: &Finger, fb: &Finger) -> Option<(DegreesOfFreedom, [bool; 2])> {
        if !self.parallel
            || self.a.group() != self.b.group()
            || (fa.radius - fb.radius).abs() > self.tolerances.connection_radius
            || fa.finger_widths.is_empty()
            || fb.finger_widths.is_empty()
        {
            return None;
        }
        let start_offset = self.project_with_length(fa.total_width(), fb.total_width())?;
        let pos_tol = self.tolerances.position;

        // b 的指按 a 的方向排列
        let b_widths = aligned_with_a(&fb.finger_widths, !self.same_dir);
        let b_first_gender = if self.same_dir {
            fb.first_finger_gender
        } else {
            fb.gender_of(fb.finger_widths.len() - 1)
        };
        let a_offset = if self.same_dir {
            start_offset
        } else {
            start_offset - fb.total_width()
        };

        let mut used_a = true;
        let mut used_b = true;
        let mut a_idx = 0usize;
        let mut b_idx = 0usize;
        if a_offset < -pos_tol {
            let mut offset = -a_offset;
            while offset > pos_tol && b_idx < b_widths.len() {
                offset -= b_widths[b_idx];
                b_idx += 1;
            }
            if offset < -pos_tol {
                return None;
            }
            used_b = false;
        } else if a_offset > pos_tol {
            let mut offset = a_offset;
            while offset > pos_tol && a_idx < fa.finger_widths.len() {
                offset -= fa.finger_widths[a_idx];
                a_idx += 1;
            }
            if offset < -pos_tol {
                return None;
            }
            used_a = false;
        }

        let a_gender = fa.gender_of(a_idx);
        let b_gender = if b_idx % 2 == 0 {
            b_first_gender
        } else {
            b_first_gender.opposite()
        };
        if a_gender == b_gender {
            return None;
        }

        while a_idx < fa.finger_widths.len() && b_idx < b_widths.len() {
            if (fa.finger_widths[a_idx] - b_widths[b_idx]).abs() > pos_tol {
                return None;
            }
            a_idx += 1;
            b_idx += 1;
        }
        if a_idx < fa.finger_widths.len() {
            used_a = false;
        }
        if b_idx < b_widths.len() {
            used_b = false;
        }

        let mut dof = DegreesOfFreedom::fixed();
        dof.rotation_possibilities
            .push(RotationPossibility::new(*self.a.start(), *self.a.direction()));
        Some((dof, [used_a, used_b]))
    }
}

/// 按 a 的方向排列 b 的元素
fn aligned_with_a<T: Clone>(items: &[T], reversed: bool) -> Vec<T> {
    if reversed {
        items.iter().rev().cloned().collect()
    } else {
        items.to_vec()
    }
}

/// 两组世界空间连接器之间的所有连接
///
/// 连接器列表分别属于两个不同的零件实例。
pub fn find_connections(a: &[Connector], b: &[Connector], tolerances: &Tolerances) -> Vec<Connection> {
    let mut result = Vec::new();
    for ca in a {
        for cb in b {
            if !kinds_can_connect(ca, cb) {
                continue;
            }
            if let Some(connection) = PairChecker::new(ca, cb, tolerances).find_connection() {
                result.push(connection);
            }
        }
    }
    result
}

fn kinds_can_connect(a: &Connector, b: &Connector) -> bool {
    use crate::connector::ConnectorType::*;
    matches!(
        (a.connector_type(), b.connector_type()),
        (Cylindrical, Cylindrical)
            | (Cylindrical, Clip)
            | (Clip, Cylindrical)
            | (Finger, Finger)
            | (Generic, Generic)
    )
}
