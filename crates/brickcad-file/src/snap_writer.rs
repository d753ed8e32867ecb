//! SNAP 指令输出
//!
//! 把 [`Command`] 写回指令文本。可选参数缺省时省略，与默认值完全相等的参数也省略，
//! 输出再解析得到相等的指令。
//!
//! 格式没有转义：字符串值中含有 `]` 时无法表示，返回 [`MetaError::Unrepresentable`]。

use crate::error::MetaError;
use crate::snap_meta::{
    ClpCommand, Command, CylCaps, CylShapeBlock, FgrCommand, Grid, MetaEnum, MirrorType, ScaleType,
    META_PREFIX,
};
use brickcad_core::connector::{Bounding, Gender};
use brickcad_core::math::{Matrix3, Vector3};
use std::fmt;

/// 参数列表构造器
struct DirectiveWriter {
    text: String,
}

impl DirectiveWriter {
    fn new(keyword: &str) -> Self {
        Self {
            text: keyword.to_string(),
        }
    }

    fn param(&mut self, key: &str, value: impl fmt::Display) {
        self.text.push_str(&format!(" [{}={}]", key, value));
    }

    fn string(&mut self, key: &str, value: &str) -> Result<(), MetaError> {
        if value.contains(']') {
            return Err(MetaError::Unrepresentable {
                parameter: key.to_string(),
                value: value.to_string(),
            });
        }
        self.param(key, value);
        Ok(())
    }

    fn optional_string(&mut self, key: &str, value: &Option<String>) -> Result<(), MetaError> {
        match value {
            Some(v) => self.string(key, v),
            None => Ok(()),
        }
    }

    fn optional_vec3(&mut self, key: &str, value: &Option<Vector3>) {
        if let Some(v) = value {
            self.param(key, format!("{} {} {}", v.x, v.y, v.z));
        }
    }

    fn optional_mat3(&mut self, key: &str, value: &Option<Matrix3>) {
        if let Some(m) = value {
            let values: Vec<String> = (0..3)
                .flat_map(|r| (0..3).map(move |c| (r, c)))
                .map(|(r, c)| m[(r, c)].to_string())
                .collect();
            self.param(key, values.join(" "));
        }
    }

    fn enumeration<E: MetaEnum>(&mut self, key: &str, value: E, default: E) {
        if value != default {
            self.param(key, value.symbol());
        }
    }

    fn optional_enumeration<E: MetaEnum>(&mut self, key: &str, value: Option<E>) {
        if let Some(v) = value {
            self.param(key, v.symbol());
        }
    }

    fn boolean(&mut self, key: &str, value: bool, default: bool) {
        if value != default {
            self.param(key, value);
        }
    }

    fn float(&mut self, key: &str, value: f64, default: f64) {
        if value != default {
            self.param(key, value);
        }
    }

    fn floats(&mut self, key: &str, values: &[f64]) {
        if !values.is_empty() {
            let values: Vec<String> = values.iter().map(f64::to_string).collect();
            self.param(key, values.join(" "));
        }
    }

    fn optional_grid(&mut self, key: &str, value: &Option<Grid>) {
        if let Some(grid) = value {
            let center = |c: bool| if c { "C " } else { "" };
            self.param(
                key,
                format!(
                    "{}{} {}{} {} {}",
                    center(grid.center_x),
                    grid.count_x,
                    center(grid.center_z),
                    grid.count_z,
                    grid.spacing_x,
                    grid.spacing_z
                ),
            );
        }
    }

    fn secs(&mut self, key: &str, value: &[CylShapeBlock]) {
        if !value.is_empty() {
            let blocks: Vec<String> = value
                .iter()
                .map(|b| format!("{} {} {}", b.variant.symbol(), b.radius, b.length))
                .collect();
            self.param(key, blocks.join("  "));
        }
    }

    fn bounding(&mut self, key: &str, value: &Bounding) {
        let text = match value {
            Bounding::Point => "pnt".to_string(),
            Bounding::Box { x, y, z } => format!("box {} {} {}", x, y, z),
            Bounding::Cube { size } => format!("cube {}", size),
            Bounding::Cylinder { radius, length } => format!("cyl {} {}", radius, length),
            Bounding::Sphere { radius } => format!("sph {}", radius),
        };
        self.param(key, text);
    }

    fn finish(self) -> String {
        self.text
    }
}

impl Command {
    /// 指令文本（不带 `0 !LDCAD` 前缀）
    pub fn to_directive(&self) -> Result<String, MetaError> {
        let keyword = match self {
            Command::Unknown(text) => return Ok(text.clone()),
            _ => self.keyword().unwrap_or_default(),
        };
        let mut w = DirectiveWriter::new(keyword);
        match self {
            Command::Clear(c) => w.optional_string("id", &c.id)?,
            Command::Incl(c) => {
                w.optional_string("id", &c.id)?;
                w.optional_vec3("pos", &c.pos);
                w.optional_mat3("ori", &c.ori);
                w.optional_vec3("scale", &c.scale);
                w.string("ref", &c.reference)?;
                w.optional_grid("grid", &c.grid);
            }
            Command::Cyl(c) => {
                w.optional_string("id", &c.id)?;
                w.optional_string("group", &c.group)?;
                w.optional_vec3("pos", &c.pos);
                w.optional_mat3("ori", &c.ori);
                w.enumeration("scale", c.scale, ScaleType::None);
                w.enumeration("mirror", c.mirror, MirrorType::None);
                w.enumeration("gender", c.gender, Gender::M);
                w.secs("secs", &c.secs);
                w.enumeration("caps", c.caps, CylCaps::One);
                w.optional_grid("grid", &c.grid);
                w.boolean("center", c.center, false);
                w.boolean("slide", c.slide, false);
            }
            Command::Clp(c) => {
                w.optional_string("id", &c.id)?;
                w.optional_vec3("pos", &c.pos);
                w.optional_mat3("ori", &c.ori);
                w.float("radius", c.radius, ClpCommand::DEFAULT_RADIUS);
                w.float("length", c.length, ClpCommand::DEFAULT_LENGTH);
                w.boolean("center", c.center, false);
                w.boolean("slide", c.slide, false);
                w.enumeration("scale", c.scale, ScaleType::None);
                w.enumeration("mirror", c.mirror, MirrorType::None);
            }
            Command::Fgr(c) => {
                let defaults = FgrCommand::default();
                w.optional_string("id", &c.id)?;
                w.optional_string("group", &c.group)?;
                w.optional_vec3("pos", &c.pos);
                w.optional_mat3("ori", &c.ori);
                w.enumeration("genderOfs", c.gender_ofs, defaults.gender_ofs);
                w.floats("seq", &c.seq);
                w.float("radius", c.radius, defaults.radius);
                w.boolean("center", c.center, defaults.center);
                w.enumeration("scale", c.scale, ScaleType::None);
                w.enumeration("mirror", c.mirror, MirrorType::None);
            }
            Command::Gen(c) => {
                w.optional_string("id", &c.id)?;
                w.optional_string("group", &c.group)?;
                w.optional_vec3("pos", &c.pos);
                w.optional_mat3("ori", &c.ori);
                w.enumeration("gender", c.gender, Gender::M);
                w.bounding("bounding", &c.bounding);
                w.enumeration("scale", c.scale, ScaleType::None);
                w.enumeration("mirror", c.mirror, MirrorType::None);
            }
            Command::MirrorInfo(c) => {
                w.optional_enumeration("baseFlip", c.base_flip);
                w.optional_mat3("corOri", &c.cor_ori);
                w.optional_string("counterPart", &c.counter_part)?;
                w.optional_vec3("posCor", &c.pos_cor);
                if let Some(inheritable) = c.inheritable {
                    w.param("inheritable", inheritable);
                }
            }
            Command::Unknown(_) => {}
        }
        Ok(w.finish())
    }

    /// 完整的零件文件元数据行
    pub fn to_meta_line(&self) -> Result<String, MetaError> {
        Ok(format!("0 {} {}", META_PREFIX, self.to_directive()?))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let directive = self.to_directive().map_err(|_| fmt::Error)?;
        f.write_str(&directive)
    }
}
