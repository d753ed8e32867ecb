//! SNAP 指令到连接器的转换
//!
//! 把一个零件文件展开为连接器：
//! - `SNAP_CLEAR`：带 id 时屏蔽之后同 id 的指令；不带 id 时清空已有结果，并停止展开子文件引用
//! - `SNAP_INCL`：通过 [`SnapResolver`] 取得被引用文件并递归展开
//! - `SNAP_CYL` / `SNAP_CLP` / `SNAP_FGR` / `SNAP_GEN`：各生成一种连接器
//! - 类型 1 子文件引用：在全部指令之后展开。子零件与图元共享当前转换状态，
//!   其它文件在独立的转换中展开后追加，它们的 `SNAP_CLEAR` 不影响上层
//!
//! 变换按列向量约定组合：`world = parent * local`，
//! 其中 `local = 平移(pos) * 旋转(ori) [* 缩放(scale)]`。

use crate::error::ConversionError;
use crate::snap_file::{SnapMetaFile, SubfileReference};
use crate::snap_meta::{
    ClpCommand, Command, CylCaps, CylCommand, CylShapeVariant, FgrCommand, GenCommand, Grid,
    InclCommand, MirrorType,
};
use brickcad_core::connector::{
    Clip, Connector, ConnectorKind, Cylindrical, CylindricalShapePart, CylindricalShapeType,
    Finger, Gender, Generic,
};
use brickcad_core::geometry::{inverts_winding_order, transform_direction, transform_point};
use brickcad_core::math::{from_linear_and_translation, linear_part, Matrix3, Matrix4, Point3, Vector3};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// `SNAP_INCL` 与子文件引用的最大嵌套深度，超过即视为循环引用
pub const MAX_INCLUDE_DEPTH: usize = 32;

/// 按名称查找被引用的文件
pub trait SnapResolver {
    /// 找不到时返回 `None`
    fn resolve(&self, reference: &str) -> Option<SnapMetaFile>;
}

/// 名称查找先精确匹配，再忽略大小写（LDraw 文件名不区分大小写）
impl<V> SnapResolver for HashMap<String, V>
where
    V: Clone + Into<SnapMetaFile>,
{
    fn resolve(&self, reference: &str) -> Option<SnapMetaFile> {
        self.get(reference)
            .or_else(|| {
                self.iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(reference))
                    .map(|(_, file)| file)
            })
            .cloned()
            .map(Into::into)
    }
}

impl<F> SnapResolver for F
where
    F: Fn(&str) -> Option<SnapMetaFile>,
{
    fn resolve(&self, reference: &str) -> Option<SnapMetaFile> {
        self(reference)
    }
}

/// 一次转换的状态：已生成的连接器与被屏蔽的 id
pub struct ConnectorConversion<'r, R: SnapResolver + ?Sized> {
    resolver: &'r R,
    cleared_ids: HashSet<String>,
    include_subfile_references: bool,
    result: Vec<Connector>,
}

impl<'r, R: SnapResolver + ?Sized> ConnectorConversion<'r, R> {
    pub fn new(resolver: &'r R) -> Self {
        Self {
            resolver,
            cleared_ids: HashSet::new(),
            include_subfile_references: true,
            result: Vec::new(),
        }
    }

    /// 展开一组指令，结果追加到已有结果之后
    ///
    /// `source_trace` 是该文件的名称（或上层调用链），连接器会记录它。
    pub fn create_connectors(
        &mut self,
        commands: &[Command],
        transformation: &Matrix4,
        source_trace: &str,
    ) -> Result<(), ConversionError> {
        self.convert(commands, transformation, source_trace, 0)
    }

    /// 展开整个文件：先是指令，再是子文件引用
    pub fn create_file_connectors(
        &mut self,
        file: &SnapMetaFile,
        transformation: &Matrix4,
        source_trace: &str,
    ) -> Result<(), ConversionError> {
        self.convert_file(file, transformation, source_trace, 0)
    }

    pub fn result(&self) -> &[Connector] {
        &self.result
    }

    pub fn into_result(self) -> Vec<Connector> {
        self.result
    }

    fn convert(
        &mut self,
        commands: &[Command],
        transformation: &Matrix4,
        source_trace: &str,
        depth: usize,
    ) -> Result<(), ConversionError> {
        let before = self.result.len();
        for command in commands {
            if let Command::Clear(clear) = command {
                match &clear.id {
                    Some(id) => {
                        self.cleared_ids.insert(id.clone());
                    }
                    None => {
                        self.include_subfile_references = false;
                        self.result.clear();
                    }
                }
                continue;
            }
            if command.id().is_some_and(|id| self.cleared_ids.contains(id)) {
                continue;
            }
            match command {
                Command::Incl(incl) => self.convert_incl(transformation, source_trace, incl, depth)?,
                Command::Cyl(cyl) => self.convert_cyl(transformation, source_trace, cyl),
                Command::Clp(clp) => self.convert_clp(transformation, source_trace, clp),
                Command::Fgr(fgr) => self.convert_fgr(transformation, source_trace, fgr),
                Command::Gen(gen) => self.convert_gen(transformation, source_trace, gen),
                Command::Clear(_) | Command::MirrorInfo(_) | Command::Unknown(_) => {}
            }
        }
        tracing::debug!(
            "Converted {} connectors from '{}'",
            self.result.len().saturating_sub(before),
            source_trace
        );
        Ok(())
    }

    fn convert_file(
        &mut self,
        file: &SnapMetaFile,
        transformation: &Matrix4,
        source_trace: &str,
        depth: usize,
    ) -> Result<(), ConversionError> {
        self.convert(&file.commands, transformation, source_trace, depth)?;
        if self.include_subfile_references {
            for reference in &file.references {
                self.convert_reference(transformation, source_trace, reference, depth)?;
            }
        }
        Ok(())
    }

    fn convert_reference(
        &mut self,
        transformation: &Matrix4,
        source_trace: &str,
        reference: &SubfileReference,
        depth: usize,
    ) -> Result<(), ConversionError> {
        if depth >= MAX_INCLUDE_DEPTH {
            return Err(ConversionError::IncludeDepthExceeded {
                reference: reference.name.clone(),
                max_depth: MAX_INCLUDE_DEPTH,
            });
        }
        let Some(referenced) = self.resolver.resolve(&reference.name) else {
            tracing::debug!("Subfile '{}' not found from '{}'", reference.name, source_trace);
            return Ok(());
        };
        let combined = transformation * reference.transform;
        let trace = child_trace(source_trace, &reference.name);

        if referenced.file_type.is_inlined() {
            self.convert_file(&referenced, &combined, &trace, depth + 1)
        } else {
            let mut inner = ConnectorConversion::new(self.resolver);
            inner.convert_file(&referenced, &combined, &trace, depth + 1)?;
            self.result.extend(inner.result);
            Ok(())
        }
    }

    fn convert_incl(
        &mut self,
        transformation: &Matrix4,
        source_trace: &str,
        command: &InclCommand,
        depth: usize,
    ) -> Result<(), ConversionError> {
        if depth >= MAX_INCLUDE_DEPTH {
            return Err(ConversionError::IncludeDepthExceeded {
                reference: command.reference.clone(),
                max_depth: MAX_INCLUDE_DEPTH,
            });
        }
        let included = self
            .resolver
            .resolve(&command.reference)
            .ok_or_else(|| ConversionError::UnresolvedReference(command.reference.clone()))?;

        let mut local = local_transform(&command.pos, &command.ori);
        if let Some(scale) = &command.scale {
            local *= Matrix4::new_nonuniform_scaling(scale);
        }
        let combined = transformation * local;
        let trace = child_trace(source_trace, &command.reference);

        match &command.grid {
            Some(grid) => {
                // 阵列的每个副本都来自同一次独立展开
                let mut inner = ConnectorConversion::new(self.resolver);
                inner.convert_file(&included, &combined, &trace, depth + 1)?;
                let orientation = grid_orientation(transformation, &command.ori);
                self.push_grid(&inner.result, grid, &orientation);
            }
            None => self.convert_file(&included, &combined, &trace, depth + 1)?,
        }
        Ok(())
    }

    fn convert_cyl(&mut self, transformation: &Matrix4, source_trace: &str, command: &CylCommand) {
        let transf = transformation * local_transform(&command.pos, &command.ori);
        if inverts_winding_order(&transf) && command.mirror == MirrorType::None {
            tracing::debug!("Skipping mirrored SNAP_CYL in '{}'", source_trace);
            return;
        }

        let direction = transform_direction(&transf, &-Vector3::y());
        let length_scale = direction.norm();
        let radius_scale = transform_direction(&transf, &Vector3::x()).norm();

        let parts = resolve_shapes(command)
            .into_iter()
            .zip(&command.secs)
            .map(|((shape, flexible), sec)| {
                CylindricalShapePart::new(shape, flexible, sec.radius * radius_scale, sec.length * length_scale)
            })
            .collect();
        let (open_start, open_end) = match command.caps {
            CylCaps::None => (true, true),
            CylCaps::One => (command.gender == Gender::F, command.gender == Gender::M),
            CylCaps::Two => (false, false),
            CylCaps::A => (false, true),
            CylCaps::B => (true, false),
        };
        let cylindrical = Cylindrical::new(command.gender, parts, open_start, open_end, command.slide);

        let mut start = transform_point(&transf, &Point3::origin());
        if command.center {
            start -= direction.normalize() * (cylindrical.total_length() * 0.5);
        }
        let connector = Connector::new(
            command.group.clone().unwrap_or_default(),
            start,
            direction,
            source_trace,
            ConnectorKind::Cylindrical(cylindrical),
        );

        match &command.grid {
            Some(grid) => {
                let orientation = grid_orientation(transformation, &command.ori);
                self.push_grid(std::slice::from_ref(&connector), grid, &orientation);
            }
            None => self.result.push(connector),
        }
    }

    fn convert_clp(&mut self, transformation: &Matrix4, source_trace: &str, command: &ClpCommand) {
        let transf = transformation * local_transform(&command.pos, &command.ori);
        let direction = transform_direction(&transf, &-Vector3::y());
        let opening = transform_direction(&transf, &-Vector3::z());
        let length = command.length * direction.norm();
        let radius = command.radius * transform_direction(&transf, &Vector3::x()).norm();

        let mut start = transform_point(&transf, &Point3::origin());
        if command.center {
            start -= direction.normalize() * (length * 0.5);
        }
        self.result.push(Connector::new(
            "",
            start,
            direction,
            source_trace,
            ConnectorKind::Clip(Clip::new(radius, length, command.slide, opening)),
        ));
    }

    fn convert_fgr(&mut self, transformation: &Matrix4, source_trace: &str, command: &FgrCommand) {
        let transf = transformation * local_transform(&command.pos, &command.ori);
        let direction = transform_direction(&transf, &-Vector3::y());
        let length_scale = direction.norm();
        let radius = command.radius * transform_direction(&transf, &Vector3::x()).norm();
        let widths: Vec<f64> = command.seq.iter().map(|w| w * length_scale).collect();

        let mut start = transform_point(&transf, &Point3::origin());
        if command.center {
            start -= direction.normalize() * (widths.iter().sum::<f64>() * 0.5);
        }
        self.result.push(Connector::new(
            command.group.clone().unwrap_or_default(),
            start,
            direction,
            source_trace,
            ConnectorKind::Finger(Finger::new(command.gender_ofs, radius, widths)),
        ));
    }

    fn convert_gen(&mut self, transformation: &Matrix4, source_trace: &str, command: &GenCommand) {
        let transf = transformation * local_transform(&command.pos, &command.ori);
        self.result.push(Connector::new(
            command.group.clone().unwrap_or_default(),
            transform_point(&transf, &Point3::origin()),
            transform_direction(&transf, &Vector3::x()),
            source_trace,
            ConnectorKind::Generic(Generic::new(command.gender, command.bounding)),
        ));
    }

    /// 把 `base` 按阵列复制，偏移位于 `orientation` 的 X/Z 平面内
    fn push_grid(&mut self, base: &[Connector], grid: &Grid, orientation: &Matrix3) {
        for (dx, dz) in grid.offsets() {
            let offset = orientation * Vector3::new(dx, 0.0, dz);
            self.result.extend(base.iter().map(|c| c.translated(&offset)));
        }
    }
}

/// 展开一个零件的全部连接器，返回可在实例间共享的列表
pub fn part_connectors<R: SnapResolver + ?Sized>(
    resolver: &R,
    file: &SnapMetaFile,
    name: &str,
) -> Result<Arc<[Connector]>, ConversionError> {
    let mut conversion = ConnectorConversion::new(resolver);
    conversion.create_file_connectors(file, &Matrix4::identity(), name)?;
    let connectors = conversion.into_result();
    tracing::info!("Part '{}' has {} connectors", name, connectors.len());
    Ok(connectors.into())
}

fn local_transform(pos: &Option<Vector3>, ori: &Option<Matrix3>) -> Matrix4 {
    from_linear_and_translation(
        &ori.unwrap_or_else(Matrix3::identity),
        &pos.unwrap_or_else(Vector3::zeros),
    )
}

fn grid_orientation(parent: &Matrix4, ori: &Option<Matrix3>) -> Matrix3 {
    linear_part(parent) * ori.unwrap_or_else(Matrix3::identity)
}

fn child_trace(parent: &str, reference: &str) -> String {
    if parent.is_empty() {
        reference.to_string()
    } else {
        format!("{}->{}", parent, reference)
    }
}

/// 各段的截面形状与是否半径可变
///
/// `_L` 取前一段的形状，`L_` 取后一段的形状，按顺序就地解析；
/// 越界时按圆形处理。
fn resolve_shapes(command: &CylCommand) -> Vec<(CylindricalShapeType, bool)> {
    let mut shapes: Vec<(CylindricalShapeType, bool)> = command
        .secs
        .iter()
        .map(|sec| match sec.variant {
            CylShapeVariant::A => (CylindricalShapeType::Axle, false),
            CylShapeVariant::S => (CylindricalShapeType::Square, false),
            CylShapeVariant::R | CylShapeVariant::FlexPrev | CylShapeVariant::FlexNext => {
                (CylindricalShapeType::Round, false)
            }
        })
        .collect();
    for (i, sec) in command.secs.iter().enumerate() {
        let neighbour = match sec.variant {
            CylShapeVariant::FlexPrev => i.checked_sub(1),
            CylShapeVariant::FlexNext => Some(i + 1),
            _ => continue,
        };
        let shape = neighbour
            .and_then(|n| shapes.get(n))
            .map(|(shape, _)| *shape)
            .unwrap_or(CylindricalShapeType::Round);
        shapes[i] = (shape, true);
    }
    shapes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snap_meta::parse_line;
    use brickcad_core::connector::Bounding;
    use brickcad_core::math::Rotation3;

    fn commands(lines: &[&str]) -> Vec<Command> {
        lines.iter().map(|l| parse_line(l).unwrap()).collect()
    }

    fn convert(lines: &[&str]) -> Vec<Connector> {
        let resolver: HashMap<String, Vec<Command>> = HashMap::new();
        convert_with(&resolver, lines, &Matrix4::identity()).unwrap()
    }

    fn convert_with<R: SnapResolver + ?Sized>(
        resolver: &R,
        lines: &[&str],
        transformation: &Matrix4,
    ) -> Result<Vec<Connector>, ConversionError> {
        let mut conversion = ConnectorConversion::new(resolver);
        conversion.create_connectors(&commands(lines), transformation, "part.dat")?;
        Ok(conversion.into_result())
    }

    fn close(a: &Point3, b: &Point3) -> bool {
        (a - b).norm() < 1e-9
    }

    #[test]
    fn test_stud_grid() {
        let result = convert(&["SNAP_CYL [gender=M] [caps=one] [secs=R 6 4] [grid=C 2 C 2 20 20]"]);
        assert_eq!(result.len(), 4);
        for (c, (x, z)) in result.iter().zip([(-10.0, -10.0), (-10.0, 10.0), (10.0, -10.0), (10.0, 10.0)]) {
            assert!(close(c.start(), &Point3::new(x, 0.0, z)));
            assert!((c.direction() - (-Vector3::y())).norm() < 1e-9);
            let cyl = c.as_cylindrical().unwrap();
            assert!(!cyl.open_start);
            assert!(cyl.open_end);
            assert_eq!(c.source_trace(), "part.dat");
        }
    }

    #[test]
    fn test_grid_follows_parent_rotation() {
        let rotation = Rotation3::from_axis_angle(&Vector3::y_axis(), std::f64::consts::FRAC_PI_2);
        let resolver: HashMap<String, Vec<Command>> = HashMap::new();
        let result = convert_with(
            &resolver,
            &["SNAP_CYL [secs=R 6 4] [grid=2 1 20 20]"],
            &rotation.to_homogeneous(),
        )
        .unwrap();
        assert_eq!(result.len(), 2);
        assert!(close(result[0].start(), &Point3::origin()));
        assert!(close(result[1].start(), &Point3::new(0.0, 0.0, -20.0)));
    }

    #[test]
    fn test_center_and_caps() {
        let result = convert(&["SNAP_CYL [gender=F] [secs=R 6 20] [center=true] [pos=0 10 0]"]);
        assert!(close(result[0].start(), &Point3::new(0.0, 20.0, 0.0)));
        let cyl = result[0].as_cylindrical().unwrap();
        assert!(cyl.open_start);
        assert!(!cyl.open_end);

        for (caps, expected) in [
            ("none", (true, true)),
            ("two", (false, false)),
            ("A", (false, true)),
            ("B", (true, false)),
        ] {
            let line = format!("SNAP_CYL [caps={}] [secs=R 6 4]", caps);
            let result = convert(&[line.as_str()]);
            let cyl = result[0].as_cylindrical().unwrap();
            assert_eq!((cyl.open_start, cyl.open_end), expected, "caps={}", caps);
        }
    }

    #[test]
    fn test_shape_variants() {
        let result = convert(&["SNAP_CYL [secs=A 6 10  _L 6 2  L_ 4 2  S 4 8]"]);
        let parts = &result[0].as_cylindrical().unwrap().parts;
        let shapes: Vec<_> = parts.iter().map(|p| (p.shape, p.flexible_radius)).collect();
        assert_eq!(
            shapes,
            vec![
                (CylindricalShapeType::Axle, false),
                (CylindricalShapeType::Axle, true),
                (CylindricalShapeType::Square, true),
                (CylindricalShapeType::Square, false),
            ]
        );

        let result = convert(&["SNAP_CYL [secs=L_ 4 2]"]);
        let part = &result[0].as_cylindrical().unwrap().parts[0];
        assert_eq!(part.shape, CylindricalShapeType::Round);
        assert!(part.flexible_radius);
    }

    #[test]
    fn test_mirror_skip() {
        let mirror = Matrix4::new_nonuniform_scaling(&Vector3::new(-1.0, 1.0, 1.0));
        let resolver: HashMap<String, Vec<Command>> = HashMap::new();
        let lines = ["SNAP_CYL [secs=R 6 4]", "SNAP_CYL [secs=R 6 4] [mirror=cor]"];
        let result = convert_with(&resolver, &lines, &mirror).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_clear() {
        let result = convert(&[
            "SNAP_CYL [id=a] [secs=R 6 4]",
            "SNAP_CLEAR [id=a]",
            "SNAP_CYL [id=a] [secs=R 6 4]",
            "SNAP_GEN [id=b] [bounding=pnt]",
        ]);
        assert_eq!(result.len(), 2);
        assert!(result[1].as_generic().is_some());

        let result = convert(&[
            "SNAP_CYL [secs=R 6 4]",
            "SNAP_CLEAR",
            "SNAP_CLP",
        ]);
        assert_eq!(result.len(), 1);
        assert!(result[0].as_clip().is_some());
    }

    #[test]
    fn test_include() {
        let mut resolver = HashMap::new();
        resolver.insert(
            "connhole.dat".to_string(),
            commands(&["SNAP_CYL [gender=F] [caps=none] [secs=R 6 20]"]),
        );

        let result = convert_with(&resolver, &["SNAP_INCL [ref=ConnHole.dat] [pos=0 24 0]"], &Matrix4::identity()).unwrap();
        assert_eq!(result.len(), 1);
        assert!(close(result[0].start(), &Point3::new(0.0, 24.0, 0.0)));
        assert_eq!(result[0].source_trace(), "part.dat->ConnHole.dat");

        let result =
            convert_with(&resolver, &["SNAP_INCL [ref=connhole.dat] [scale=1 2 1]"], &Matrix4::identity()).unwrap();
        let cyl = result[0].as_cylindrical().unwrap();
        assert!((cyl.total_length() - 40.0).abs() < 1e-9);
        assert!((cyl.parts[0].radius - 6.0).abs() < 1e-9);

        let result =
            convert_with(&resolver, &["SNAP_INCL [ref=connhole.dat] [grid=2 3 20 20]"], &Matrix4::identity()).unwrap();
        assert_eq!(result.len(), 6);
    }

    #[test]
    fn test_include_errors() {
        let mut resolver = HashMap::new();
        resolver.insert("loop.dat".to_string(), commands(&["SNAP_INCL [ref=loop.dat]"]));

        assert_eq!(
            convert_with(&resolver, &["SNAP_INCL [ref=missing.dat]"], &Matrix4::identity()).unwrap_err(),
            ConversionError::UnresolvedReference("missing.dat".to_string())
        );
        assert!(matches!(
            convert_with(&resolver, &["SNAP_INCL [ref=loop.dat]"], &Matrix4::identity()),
            Err(ConversionError::IncludeDepthExceeded { max_depth: MAX_INCLUDE_DEPTH, .. })
        ));
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |reference: &str| {
            (reference == "stud.dat").then(|| commands(&["SNAP_CYL [secs=R 6 4]"]).into())
        };
        let file = SnapMetaFile::from(commands(&["SNAP_INCL [ref=stud.dat] [grid=C 2 C 2 20 20]"]));
        let connectors = part_connectors(&resolver, &file, "3003.dat").unwrap();
        assert_eq!(connectors.len(), 4);
    }

    fn file(text: &str) -> SnapMetaFile {
        SnapMetaFile::parse(text).unwrap()
    }

    fn library() -> HashMap<String, SnapMetaFile> {
        HashMap::from([
            (
                "stud.dat".to_string(),
                file("0 !LDRAW_ORG Primitive\n0 !LDCAD SNAP_CYL [gender=M] [caps=one] [secs=R 6 4]\n"),
            ),
            (
                "arm.dat".to_string(),
                file("0 !LDRAW_ORG Part\n0 !LDCAD SNAP_CLEAR\n0 !LDCAD SNAP_GEN [bounding=pnt]\n"),
            ),
            (
                "s\\arms01.dat".to_string(),
                file("0 !LDRAW_ORG Subpart\n0 !LDCAD SNAP_CLEAR\n0 !LDCAD SNAP_GEN [bounding=pnt]\n"),
            ),
            (
                "loop.dat".to_string(),
                file("0 !LDRAW_ORG Subpart\n1 16 0 0 0 1 0 0 0 1 0 0 0 1 loop.dat\n"),
            ),
        ])
    }

    #[test]
    fn test_subfile_references() {
        let part = file(
            "0 !LDRAW_ORG Part\n\
             1 16 10 0 0 1 0 0 0 1 0 0 0 1 stud.dat\n\
             1 16 -10 0 0 1 0 0 0 1 0 0 0 1 STUD.DAT\n\
             1 16 0 0 0 1 0 0 0 1 0 0 0 1 box5.dat\n",
        );
        let connectors = part_connectors(&library(), &part, "3001.dat").unwrap();
        assert_eq!(connectors.len(), 2);
        assert!(close(connectors[0].start(), &Point3::new(10.0, 0.0, 0.0)));
        assert!(close(connectors[1].start(), &Point3::new(-10.0, 0.0, 0.0)));
        assert_eq!(connectors[0].source_trace(), "3001.dat->stud.dat");
    }

    #[test]
    fn test_bare_clear_disables_references() {
        let part = file(
            "0 !LDCAD SNAP_CLEAR\n\
             0 !LDCAD SNAP_CLP\n\
             1 16 0 0 0 1 0 0 0 1 0 0 0 1 stud.dat\n",
        );
        let connectors = part_connectors(&library(), &part, "part.dat").unwrap();
        assert_eq!(connectors.len(), 1);
        assert!(connectors[0].as_clip().is_some());

        let resolver = library();
        let mut conversion = ConnectorConversion::new(&resolver);
        conversion
            .create_file_connectors(&SnapMetaFile::from(commands(&["SNAP_CLEAR [id=x]"])), &Matrix4::identity(), "")
            .unwrap();
        assert!(conversion.include_subfile_references);
    }

    #[test]
    fn test_subfile_clear_scope() {
        // 普通零件在独立转换中展开，其 SNAP_CLEAR 不影响上层
        let part = file("0 !LDCAD SNAP_CLP\n1 16 0 0 0 1 0 0 0 1 0 0 0 1 arm.dat\n");
        let connectors = part_connectors(&library(), &part, "part.dat").unwrap();
        assert_eq!(connectors.len(), 2);

        // 子零件就地展开，SNAP_CLEAR 清空上层已有结果
        let part = file("0 !LDCAD SNAP_CLP\n1 16 0 0 0 1 0 0 0 1 0 0 0 1 s\\arms01.dat\n");
        let connectors = part_connectors(&library(), &part, "part.dat").unwrap();
        assert_eq!(connectors.len(), 1);
        assert!(connectors[0].as_generic().is_some());
    }

    #[test]
    fn test_self_referencing_subpart() {
        let part = file("1 16 0 0 0 1 0 0 0 1 0 0 0 1 loop.dat\n");
        assert!(matches!(
            part_connectors(&library(), &part, "part.dat"),
            Err(ConversionError::IncludeDepthExceeded { max_depth: MAX_INCLUDE_DEPTH, .. })
        ));
    }

    #[test]
    fn test_included_file_references() {
        let part = SnapMetaFile::from(commands(&["SNAP_INCL [ref=studs.dat] [pos=0 -8 0]"]));
        let mut resolver = library();
        resolver.insert(
            "studs.dat".to_string(),
            file("1 16 0 0 20 1 0 0 0 1 0 0 0 1 stud.dat\n"),
        );
        let connectors = part_connectors(&resolver, &part, "part.dat").unwrap();
        assert_eq!(connectors.len(), 1);
        assert!(close(connectors[0].start(), &Point3::new(0.0, -8.0, 20.0)));
        assert_eq!(connectors[0].source_trace(), "part.dat->studs.dat->stud.dat");
    }

    #[test]
    fn test_clip_finger_generic() {
        let result = convert(&[
            "SNAP_CLP [center=true]",
            "SNAP_FGR [group=h] [genderOfs=F] [seq=4 8 4] [radius=6] [center=true]",
            "SNAP_GEN [group=tow] [gender=F] [pos=10 0 0] [bounding=sph 3]",
        ]);
        assert_eq!(result.len(), 3);

        let clip = result[0].as_clip().unwrap();
        assert!(close(result[0].start(), &Point3::new(0.0, 4.0, 0.0)));
        assert!((clip.opening_direction - (-Vector3::z())).norm() < 1e-9);
        assert_eq!(result[0].group(), "");

        let finger = result[1].as_finger().unwrap();
        assert!(close(result[1].start(), &Point3::new(0.0, 8.0, 0.0)));
        assert_eq!(finger.first_finger_gender, Gender::F);
        assert_eq!(result[1].group(), "h");

        let generic = result[2].as_generic().unwrap();
        assert!(close(result[2].start(), &Point3::new(10.0, 0.0, 0.0)));
        assert!((result[2].direction() - Vector3::x()).norm() < 1e-9);
        assert_eq!(generic.bounding, Bounding::Sphere { radius: 3.0 });
    }
}
