//! LDCad SNAP 元数据解析
//!
//! 零件文件中的连接器描述，每行一条指令：
//!
//! ```text
//! 0 !LDCAD SNAP_CYL [gender=F] [caps=one] [secs=R 6 20] [slide=true] [pos=0 24 0]
//! ```
//!
//! # 语法
//!
//! - 关键字：`SNAP_CLEAR`、`SNAP_INCL`、`SNAP_CYL`、`SNAP_CLP`、`SNAP_FGR`、`SNAP_GEN`，
//!   以及零件镜像信息 `MIRROR_INFO`
//! - 参数：任意个 `[key=value]`，按第一个 `=` 拆分，两侧去掉空白；
//!   键不区分大小写，重复的键只取第一次出现的值
//! - 前缀 `0 !LDCAD` 可有可无
//!
//! 未知关键字得到 [`Command::Unknown`]，不是错误。
//!
//! # 取值
//!
//! - 向量 `pos`：3 个浮点数
//! - 矩阵 `ori`：9 个浮点数，按行书写（与 LDraw 一致）
//! - 布尔：`true`（不区分大小写）为真，其余为假
//! - 枚举：不区分大小写；无法识别时记录警告并使用默认值
//! - `grid`：`[C] 数量X [C] 数量Z 间距X 间距Z`
//! - `secs`：若干个 `形状 半径 长度` 三元组
//! - `bounding`：`pnt` | `box x y z` | `cube s` | `cyl r l` | `sph r`

use crate::error::MetaError;
use brickcad_core::connector::{Bounding, Gender};
use brickcad_core::math::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 元数据行前缀
pub const META_PREFIX: &str = "!LDCAD";

/// 缩放行为
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScaleType {
    #[default]
    None,
    YOnly,
    ROnly,
    YAndR,
}

/// 镜像行为
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MirrorType {
    #[default]
    None,
    Cor,
}

/// 圆柱两端的封闭方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CylCaps {
    /// 两端开口
    None,
    /// 一端封闭（公：起点封闭；母：终点封闭）
    #[default]
    One,
    /// 两端封闭
    Two,
    /// 仅起点封闭
    A,
    /// 仅终点封闭
    B,
}

/// 圆柱段形状
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CylShapeVariant {
    /// 圆
    R,
    /// 十字轴
    A,
    /// 方
    S,
    /// `_L`：形状同前一段，半径可变
    FlexPrev,
    /// `L_`：形状同后一段，半径可变
    FlexNext,
}

/// 坐标轴
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// 不区分大小写的符号表
pub trait MetaEnum: Sized + Copy + PartialEq + 'static {
    const SYMBOLS: &'static [(&'static str, Self)];

    fn from_symbol(symbol: &str) -> Option<Self> {
        Self::SYMBOLS
            .iter()
            .find(|(s, _)| s.eq_ignore_ascii_case(symbol))
            .map(|(_, v)| *v)
    }

    fn symbol(&self) -> &'static str {
        Self::SYMBOLS
            .iter()
            .find(|(_, v)| v == self)
            .map(|(s, _)| *s)
            .unwrap_or("")
    }
}

impl MetaEnum for ScaleType {
    const SYMBOLS: &'static [(&'static str, Self)] = &[
        ("none", ScaleType::None),
        ("YOnly", ScaleType::YOnly),
        ("ROnly", ScaleType::ROnly),
        ("YandR", ScaleType::YAndR),
    ];
}

impl MetaEnum for MirrorType {
    const SYMBOLS: &'static [(&'static str, Self)] = &[("none", MirrorType::None), ("cor", MirrorType::Cor)];
}

impl MetaEnum for Gender {
    const SYMBOLS: &'static [(&'static str, Self)] = &[("M", Gender::M), ("F", Gender::F)];
}

impl MetaEnum for Axis {
    const SYMBOLS: &'static [(&'static str, Self)] = &[("X", Axis::X), ("Y", Axis::Y), ("Z", Axis::Z)];
}

impl MetaEnum for CylCaps {
    const SYMBOLS: &'static [(&'static str, Self)] = &[
        ("none", CylCaps::None),
        ("one", CylCaps::One),
        ("two", CylCaps::Two),
        ("A", CylCaps::A),
        ("B", CylCaps::B),
    ];
}

impl MetaEnum for CylShapeVariant {
    const SYMBOLS: &'static [(&'static str, Self)] = &[
        ("R", CylShapeVariant::R),
        ("A", CylShapeVariant::A),
        ("S", CylShapeVariant::S),
        ("_L", CylShapeVariant::FlexPrev),
        ("L_", CylShapeVariant::FlexNext),
    ];
}

/// 阵列单个方向上的最大数量
pub const MAX_GRID_COUNT: u32 = 256;

/// 阵列
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub center_x: bool,
    pub center_z: bool,
    pub count_x: u32,
    pub count_z: u32,
    pub spacing_x: f64,
    pub spacing_z: f64,
}

impl Grid {
    /// 各格点相对原点的 (x, z) 偏移
    pub fn offsets(&self) -> Vec<(f64, f64)> {
        let start = |centered: bool, count: u32, spacing: f64| {
            if centered {
                -(count.saturating_sub(1) as f64) / 2.0 * spacing
            } else {
                0.0
            }
        };
        let x_start = start(self.center_x, self.count_x, self.spacing_x);
        let z_start = start(self.center_z, self.count_z, self.spacing_z);
        let cells = (self.count_x as usize).saturating_mul(self.count_z as usize);
        let mut result = Vec::with_capacity(cells.min((MAX_GRID_COUNT * MAX_GRID_COUNT) as usize));
        for ix in 0..self.count_x {
            for iz in 0..self.count_z {
                result.push((
                    x_start + ix as f64 * self.spacing_x,
                    z_start + iz as f64 * self.spacing_z,
                ));
            }
        }
        result
    }
}

/// 圆柱的一段
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CylShapeBlock {
    pub variant: CylShapeVariant,
    pub radius: f64,
    pub length: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClearCommand {
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InclCommand {
    pub id: Option<String>,
    pub pos: Option<Vector3>,
    pub ori: Option<Matrix3>,
    pub scale: Option<Vector3>,
    pub reference: String,
    pub grid: Option<Grid>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CylCommand {
    pub id: Option<String>,
    pub group: Option<String>,
    pub pos: Option<Vector3>,
    pub ori: Option<Matrix3>,
    pub scale: ScaleType,
    pub mirror: MirrorType,
    pub gender: Gender,
    pub secs: Vec<CylShapeBlock>,
    pub caps: CylCaps,
    pub grid: Option<Grid>,
    pub center: bool,
    pub slide: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClpCommand {
    pub id: Option<String>,
    pub pos: Option<Vector3>,
    pub ori: Option<Matrix3>,
    pub radius: f64,
    pub length: f64,
    pub center: bool,
    pub slide: bool,
    pub scale: ScaleType,
    pub mirror: MirrorType,
}

impl ClpCommand {
    pub const DEFAULT_RADIUS: f64 = 4.0;
    pub const DEFAULT_LENGTH: f64 = 8.0;
}

impl Default for ClpCommand {
    fn default() -> Self {
        Self {
            id: None,
            pos: None,
            ori: None,
            radius: Self::DEFAULT_RADIUS,
            length: Self::DEFAULT_LENGTH,
            center: false,
            slide: false,
            scale: ScaleType::None,
            mirror: MirrorType::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FgrCommand {
    pub id: Option<String>,
    pub group: Option<String>,
    pub pos: Option<Vector3>,
    pub ori: Option<Matrix3>,
    /// 第一根指的性别
    pub gender_ofs: Gender,
    /// 各指宽度
    pub seq: Vec<f64>,
    pub radius: f64,
    /// 缺省为真（与 LDCad 的实际行为一致）
    pub center: bool,
    pub scale: ScaleType,
    pub mirror: MirrorType,
}

impl Default for FgrCommand {
    fn default() -> Self {
        Self {
            id: None,
            group: None,
            pos: None,
            ori: None,
            gender_ofs: Gender::M,
            seq: Vec::new(),
            radius: 0.0,
            center: true,
            scale: ScaleType::None,
            mirror: MirrorType::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenCommand {
    pub id: Option<String>,
    pub group: Option<String>,
    pub pos: Option<Vector3>,
    pub ori: Option<Matrix3>,
    pub gender: Gender,
    pub bounding: Bounding,
    pub scale: ScaleType,
    pub mirror: MirrorType,
}

/// 零件的镜像信息（`MIRROR_INFO`），不产生连接器
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MirrorInfoCommand {
    pub base_flip: Option<Axis>,
    pub cor_ori: Option<Matrix3>,
    /// 镜像后对应的零件
    pub counter_part: Option<String>,
    pub pos_cor: Option<Vector3>,
    pub inheritable: Option<bool>,
}

/// 一条 LDCad 元数据指令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Clear(ClearCommand),
    Incl(InclCommand),
    Cyl(CylCommand),
    Clp(ClpCommand),
    Fgr(FgrCommand),
    Gen(GenCommand),
    MirrorInfo(MirrorInfoCommand),
    /// 不认识的关键字（原样保留）
    Unknown(String),
}

impl Command {
    /// 指令关键字；未知指令返回 `None`
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            Command::Clear(_) => Some("SNAP_CLEAR"),
            Command::Incl(_) => Some("SNAP_INCL"),
            Command::Cyl(_) => Some("SNAP_CYL"),
            Command::Clp(_) => Some("SNAP_CLP"),
            Command::Fgr(_) => Some("SNAP_FGR"),
            Command::Gen(_) => Some("SNAP_GEN"),
            Command::MirrorInfo(_) => Some("MIRROR_INFO"),
            Command::Unknown(_) => None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Command::Clear(c) => c.id.as_deref(),
            Command::Incl(c) => c.id.as_deref(),
            Command::Cyl(c) => c.id.as_deref(),
            Command::Clp(c) => c.id.as_deref(),
            Command::Fgr(c) => c.id.as_deref(),
            Command::Gen(c) => c.id.as_deref(),
            Command::MirrorInfo(_) | Command::Unknown(_) => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Command::Unknown(_))
    }
}

/// 去掉可选的 `0 !LDCAD` 前缀
pub fn strip_meta_prefix(line: &str) -> &str {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('0') else {
        return trimmed;
    };
    match rest.trim_start().strip_prefix(META_PREFIX) {
        Some(meta) if rest.starts_with(char::is_whitespace) => meta.trim_start(),
        _ => trimmed,
    }
}

/// 解析一行 SNAP 指令
pub fn parse_line(line: &str) -> Result<Command, MetaError> {
    let text = strip_meta_prefix(line);
    let keyword = text.split_whitespace().next().unwrap_or("");
    let rest = &text[keyword.len()..];

    let name: &'static str = match keyword {
        "SNAP_CLEAR" => "SNAP_CLEAR",
        "SNAP_INCL" => "SNAP_INCL",
        "SNAP_CYL" => "SNAP_CYL",
        "SNAP_CLP" => "SNAP_CLP",
        "SNAP_FGR" => "SNAP_FGR",
        "SNAP_GEN" => "SNAP_GEN",
        "MIRROR_INFO" => "MIRROR_INFO",
        _ => return Ok(Command::Unknown(text.to_string())),
    };
    let p = Parameters::scan(name, rest);

    let command = match name {
        "SNAP_CLEAR" => Command::Clear(ClearCommand { id: p.string("id") }),
        "SNAP_INCL" => Command::Incl(InclCommand {
            id: p.string("id"),
            pos: p.vec3("pos")?,
            ori: p.mat3("ori")?,
            scale: p.vec3("scale")?,
            reference: p.string("ref").ok_or(MetaError::MissingParameter {
                command: name,
                parameter: "ref",
            })?,
            grid: p.grid("grid")?,
        }),
        "SNAP_CYL" => Command::Cyl(CylCommand {
            id: p.string("id"),
            group: p.string("group"),
            pos: p.vec3("pos")?,
            ori: p.mat3("ori")?,
            scale: p.enumeration("scale", ScaleType::None),
            mirror: p.enumeration("mirror", MirrorType::None),
            gender: p.enumeration("gender", Gender::M),
            secs: p.secs("secs")?,
            caps: p.enumeration("caps", CylCaps::One),
            grid: p.grid("grid")?,
            center: p.boolean("center", false),
            slide: p.boolean("slide", false),
        }),
        "SNAP_CLP" => Command::Clp(ClpCommand {
            id: p.string("id"),
            pos: p.vec3("pos")?,
            ori: p.mat3("ori")?,
            radius: p.float("radius", ClpCommand::DEFAULT_RADIUS)?,
            length: p.float("length", ClpCommand::DEFAULT_LENGTH)?,
            center: p.boolean("center", false),
            slide: p.boolean("slide", false),
            scale: p.enumeration("scale", ScaleType::None),
            mirror: p.enumeration("mirror", MirrorType::None),
        }),
        "SNAP_FGR" => Command::Fgr(FgrCommand {
            id: p.string("id"),
            group: p.string("group"),
            pos: p.vec3("pos")?,
            ori: p.mat3("ori")?,
            gender_ofs: p.enumeration("genderOfs", Gender::M),
            seq: p.floats("seq")?,
            radius: p.float("radius", 0.0)?,
            center: p.boolean("center", true),
            scale: p.enumeration("scale", ScaleType::None),
            mirror: p.enumeration("mirror", MirrorType::None),
        }),
        "MIRROR_INFO" => Command::MirrorInfo(MirrorInfoCommand {
            base_flip: p.optional_enumeration("baseFlip"),
            cor_ori: p.mat3("corOri")?,
            counter_part: p.string("counterPart"),
            pos_cor: p.vec3("posCor")?,
            inheritable: p.get("inheritable").map(|v| v.eq_ignore_ascii_case("true")),
        }),
        _ => Command::Gen(GenCommand {
            id: p.string("id"),
            group: p.string("group"),
            pos: p.vec3("pos")?,
            ori: p.mat3("ori")?,
            gender: p.enumeration("gender", Gender::M),
            bounding: p.bounding("bounding")?,
            scale: p.enumeration("scale", ScaleType::None),
            mirror: p.enumeration("mirror", MirrorType::None),
        }),
    };
    Ok(command)
}

/// 一条指令的 `[key=value]` 参数
struct Parameters<'a> {
    command: &'static str,
    /// 键一律小写
    values: HashMap<String, &'a str>,
}

impl<'a> Parameters<'a> {
    fn scan(command: &'static str, text: &'a str) -> Self {
        let mut values = HashMap::new();
        let mut rest = text;
        while let Some(open) = rest.find('[') {
            let Some(close) = rest[open..].find(']').map(|c| open + c) else {
                tracing::warn!("{}: unterminated parameter '{}'", command, &rest[open..]);
                break;
            };
            let group = &rest[open + 1..close];
            match group.split_once('=') {
                Some((key, value)) => {
                    // 重复的键以第一次出现为准
                    values
                        .entry(key.trim().to_ascii_lowercase())
                        .or_insert(value.trim());
                }
                None => tracing::warn!("{}: parameter without value '[{}]'", command, group),
            }
            rest = &rest[close + 1..];
        }
        Self { command, values }
    }

    fn get(&self, key: &str) -> Option<&'a str> {
        self.values.get(&key.to_ascii_lowercase()).copied()
    }

    fn string(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    fn boolean(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(default)
    }

    fn enumeration<E: MetaEnum>(&self, key: &str, default: E) -> E {
        let Some(value) = self.get(key) else {
            return default;
        };
        E::from_symbol(value).unwrap_or_else(|| {
            tracing::warn!(
                "{}: unknown value '{}' for '{}', using '{}'",
                self.command,
                value,
                key,
                default.symbol()
            );
            default
        })
    }

    fn optional_enumeration<E: MetaEnum>(&self, key: &str) -> Option<E> {
        let value = self.get(key)?;
        let parsed = E::from_symbol(value);
        if parsed.is_none() {
            tracing::warn!("{}: unknown value '{}' for '{}', ignoring", self.command, value, key);
        }
        parsed
    }

    fn float(&self, key: &str, default: f64) -> Result<f64, MetaError> {
        match self.get(key) {
            Some(value) => parse_number(key, value),
            None => Ok(default),
        }
    }

    fn floats(&self, key: &str) -> Result<Vec<f64>, MetaError> {
        match self.get(key) {
            Some(value) => value.split_whitespace().map(|t| parse_number(key, t)).collect(),
            None => Ok(Vec::new()),
        }
    }

    fn fixed_floats<const N: usize>(&self, key: &str) -> Result<Option<[f64; N]>, MetaError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        let tokens: Vec<&str> = value.split_whitespace().collect();
        if tokens.len() != N {
            return Err(MetaError::WrongArity {
                parameter: key.to_string(),
                expected: N.to_string(),
                actual: tokens.len(),
            });
        }
        let mut result = [0.0; N];
        for (slot, token) in result.iter_mut().zip(tokens) {
            *slot = parse_number(key, token)?;
        }
        Ok(Some(result))
    }

    fn vec3(&self, key: &str) -> Result<Option<Vector3>, MetaError> {
        Ok(self.fixed_floats::<3>(key)?.map(|v| Vector3::new(v[0], v[1], v[2])))
    }

    fn mat3(&self, key: &str) -> Result<Option<Matrix3>, MetaError> {
        Ok(self.fixed_floats::<9>(key)?.map(|v| Matrix3::from_row_slice(&v)))
    }

    fn grid(&self, key: &str) -> Result<Option<Grid>, MetaError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        let arity_error = |actual| MetaError::WrongArity {
            parameter: key.to_string(),
            expected: "[C] countX [C] countZ spacingX spacingZ".to_string(),
            actual,
        };
        let tokens: Vec<&str> = value.split_whitespace().collect();
        let mut it = tokens.iter().copied().peekable();
        let center_x = it.next_if(|t| t.eq_ignore_ascii_case("C")).is_some();
        let count_x = it.next().ok_or_else(|| arity_error(tokens.len()))?;
        let center_z = it.next_if(|t| t.eq_ignore_ascii_case("C")).is_some();
        let numbers: Vec<&str> = it.collect();
        let [count_z, spacing_x, spacing_z] = numbers[..] else {
            return Err(arity_error(tokens.len()));
        };
        Ok(Some(Grid {
            center_x,
            center_z,
            count_x: parse_grid_count(key, count_x)?,
            count_z: parse_grid_count(key, count_z)?,
            spacing_x: parse_number(key, spacing_x)?,
            spacing_z: parse_number(key, spacing_z)?,
        }))
    }

    fn secs(&self, key: &str) -> Result<Vec<CylShapeBlock>, MetaError> {
        let Some(value) = self.get(key) else {
            return Ok(Vec::new());
        };
        let tokens: Vec<&str> = value.split_whitespace().collect();
        if tokens.len() % 3 != 0 {
            return Err(MetaError::WrongArity {
                parameter: key.to_string(),
                expected: "a multiple of 3".to_string(),
                actual: tokens.len(),
            });
        }
        tokens
            .chunks_exact(3)
            .map(|block| {
                let variant = CylShapeVariant::from_symbol(block[0]).unwrap_or_else(|| {
                    tracing::warn!(
                        "{}: unknown section shape '{}', using 'R'",
                        self.command,
                        block[0]
                    );
                    CylShapeVariant::R
                });
                Ok(CylShapeBlock {
                    variant,
                    radius: parse_number(key, block[1])?,
                    length: parse_number(key, block[2])?,
                })
            })
            .collect()
    }

    fn bounding(&self, key: &'static str) -> Result<Bounding, MetaError> {
        let value = self.get(key).ok_or(MetaError::MissingParameter {
            command: self.command,
            parameter: key,
        })?;
        let mut tokens = value.split_whitespace();
        let shape = tokens.next().unwrap_or("");
        let args = tokens
            .map(|t| parse_number(key, t))
            .collect::<Result<Vec<f64>, _>>()?;
        let arity = |expected: usize| -> Result<(), MetaError> {
            if args.len() == expected {
                Ok(())
            } else {
                Err(MetaError::WrongArity {
                    parameter: format!("{} {}", key, shape),
                    expected: expected.to_string(),
                    actual: args.len(),
                })
            }
        };
        match shape.to_ascii_lowercase().as_str() {
            "pnt" => arity(0).map(|_| Bounding::Point),
            "box" => arity(3).map(|_| Bounding::Box {
                x: args[0],
                y: args[1],
                z: args[2],
            }),
            "cube" => arity(1).map(|_| Bounding::Cube { size: args[0] }),
            "cyl" => arity(2).map(|_| Bounding::Cylinder {
                radius: args[0],
                length: args[1],
            }),
            "sph" => arity(1).map(|_| Bounding::Sphere { radius: args[0] }),
            _ => Err(MetaError::UnknownBounding(shape.to_string())),
        }
    }
}

fn parse_grid_count(key: &str, token: &str) -> Result<u32, MetaError> {
    let count: u32 = parse_number(key, token)?;
    if count > MAX_GRID_COUNT {
        return Err(MetaError::OutOfRange {
            parameter: key.to_string(),
            value: token.to_string(),
            max: MAX_GRID_COUNT.to_string(),
        });
    }
    Ok(count)
}

fn parse_number<T: std::str::FromStr>(key: &str, token: &str) -> Result<T, MetaError> {
    token.parse().map_err(|_| MetaError::InvalidNumber {
        parameter: key.to_string(),
        value: token.to_string(),
    })
}
