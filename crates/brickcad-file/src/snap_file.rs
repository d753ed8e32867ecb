//! 零件文件中的 SNAP 元数据
//!
//! 逐行扫描零件文件，保留三类内容：
//! - `0 !LDCAD SNAP_*` 与 `0 !LDCAD MIRROR_INFO` 指令
//! - `0 !LDRAW_ORG <类型>` 头，决定文件类型
//! - 类型 1 的子文件引用（变换矩阵与文件名）
//!
//! 其它内容（几何、注释、其它元数据）一律跳过。

use crate::error::MetaError;
use crate::snap_meta::{parse_line, Command, META_PREFIX};
use brickcad_core::math::{from_linear_and_translation, Matrix3, Matrix4, Vector3};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// LDraw 文件类型（来自 `!LDRAW_ORG` 头）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    #[default]
    Model,
    Part,
    Subpart,
    Primitive,
}

impl FileType {
    /// 按 `!LDRAW_ORG` 之后的第一个词判断，不区分大小写
    pub fn from_org_line(text: &str) -> Self {
        let word = text.split_whitespace().next().unwrap_or("").to_ascii_lowercase();
        let word = word.strip_prefix("unofficial_").unwrap_or(&word);
        if word.ends_with("primitive") {
            FileType::Primitive
        } else if word == "subpart" {
            FileType::Subpart
        } else if word == "part" || word == "shortcut" {
            FileType::Part
        } else {
            FileType::Model
        }
    }

    /// 子零件与图元就地展开，与引用它的文件共享转换状态
    pub fn is_inlined(&self) -> bool {
        matches!(self, FileType::Subpart | FileType::Primitive)
    }

    fn org_name(&self) -> Option<&'static str> {
        match self {
            FileType::Model => None,
            FileType::Part => Some("Part"),
            FileType::Subpart => Some("Subpart"),
            FileType::Primitive => Some("Primitive"),
        }
    }
}

/// 类型 1 行：`1 <颜色> x y z a b c d e f g h i <文件名>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubfileReference {
    pub transform: Matrix4,
    pub name: String,
}

impl SubfileReference {
    /// 解析一行类型 1 引用（行首的 `1` 必须已确认）
    pub fn parse(line: &str) -> Result<Self, MetaError> {
        let mut tokens = line.split_whitespace();
        // 行类型与颜色
        let header = tokens.by_ref().take(2).count();
        let numbers: Vec<&str> = tokens.by_ref().take(12).collect();
        if header < 2 || numbers.len() < 12 {
            return Err(MetaError::WrongArity {
                parameter: "subfile reference".to_string(),
                expected: "14 and a file name".to_string(),
                actual: header + numbers.len(),
            });
        }
        let mut values = [0.0; 12];
        for (value, token) in values.iter_mut().zip(&numbers) {
            *value = token.parse().map_err(|_| MetaError::InvalidNumber {
                parameter: "subfile reference".to_string(),
                value: token.to_string(),
            })?;
        }
        let name = tokens.collect::<Vec<_>>().join(" ");
        if name.is_empty() {
            return Err(MetaError::WrongArity {
                parameter: "subfile reference".to_string(),
                expected: "14 and a file name".to_string(),
                actual: 14,
            });
        }
        let translation = Vector3::new(values[0], values[1], values[2]);
        let linear = Matrix3::from_row_slice(&values[3..]);
        Ok(Self {
            transform: from_linear_and_translation(&linear, &translation),
            name,
        })
    }

    fn to_line(&self) -> String {
        let t = &self.transform;
        let mut values = vec![t[(0, 3)], t[(1, 3)], t[(2, 3)]];
        for r in 0..3 {
            for c in 0..3 {
                values.push(t[(r, c)]);
            }
        }
        let values: Vec<String> = values.iter().map(f64::to_string).collect();
        format!("1 16 {} {}", values.join(" "), self.name)
    }
}

/// 一个零件文件的全部 SNAP 指令与子文件引用
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapMetaFile {
    #[serde(default)]
    pub file_type: FileType,
    /// 按出现顺序排列的指令
    pub commands: Vec<Command>,
    /// 指令所在行号（从 1 开始），与 `commands` 一一对应；非文件来源为 0
    pub line_numbers: Vec<usize>,
    #[serde(default)]
    pub references: Vec<SubfileReference>,
}

enum Line<'a> {
    Snap(&'a str),
    Org(&'a str),
    Reference(&'a str),
    Other,
}

fn classify(line: &str) -> Line<'_> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('1') && trimmed[1..].starts_with(char::is_whitespace) {
        return Line::Reference(trimmed);
    }
    let Some(rest) = trimmed.strip_prefix('0') else {
        return Line::Other;
    };
    let rest = rest.trim_start();
    if let Some(org) = rest.strip_prefix("!LDRAW_ORG") {
        return Line::Org(org);
    }
    match rest.strip_prefix(META_PREFIX).map(str::trim_start) {
        Some(meta) if meta.starts_with("SNAP_") || meta.starts_with("MIRROR_INFO") => Line::Snap(line),
        _ => Line::Other,
    }
}

impl SnapMetaFile {
    /// 严格解析：遇到第一条错误的指令或引用即失败
    pub fn parse(text: &str) -> Result<Self, MetaError> {
        let mut file = SnapMetaFile::default();
        for (index, line) in text.lines().enumerate() {
            file.scan(line, index + 1).map_err(|e| e.at_line(index + 1))?;
        }
        Ok(file)
    }

    /// 宽松解析：错误的行记录警告后跳过
    pub fn parse_lenient(text: &str) -> Self {
        let mut file = SnapMetaFile::default();
        for (index, line) in text.lines().enumerate() {
            if let Err(e) = file.scan(line, index + 1) {
                tracing::warn!("Skipping line {}: {}", index + 1, e);
            }
        }
        file
    }

    /// 从文件加载（严格解析）
    pub fn load(path: &Path) -> Result<Self, MetaError> {
        let text = std::fs::read_to_string(path)?;
        let file = Self::parse(&text)?;
        tracing::info!(
            "Loaded {} SNAP directives and {} subfile references from {:?}",
            file.len(),
            file.references.len(),
            path
        );
        Ok(file)
    }

    fn scan(&mut self, line: &str, number: usize) -> Result<(), MetaError> {
        match classify(line) {
            Line::Snap(text) => self.push(parse_line(text)?, number),
            Line::Org(text) => self.file_type = FileType::from_org_line(text),
            Line::Reference(text) => self.references.push(SubfileReference::parse(text)?),
            Line::Other => {}
        }
        Ok(())
    }

    fn push(&mut self, command: Command, line: usize) {
        // 未知的 SNAP_ 关键字不参与转换
        if command.is_unknown() {
            tracing::debug!("Ignoring unsupported SNAP directive at line {}", line);
            return;
        }
        self.commands.push(command);
        self.line_numbers.push(line);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// 写回文件：类型头、每条指令一行、每个引用一行（颜色 16）
    pub fn to_text(&self) -> Result<String, MetaError> {
        let mut text = String::new();
        if let Some(name) = self.file_type.org_name() {
            text.push_str(&format!("0 !LDRAW_ORG {}\n", name));
        }
        for command in &self.commands {
            text.push_str(&command.to_meta_line()?);
            text.push('\n');
        }
        for reference in &self.references {
            text.push_str(&reference.to_line());
            text.push('\n');
        }
        Ok(text)
    }
}

impl From<Vec<Command>> for SnapMetaFile {
    fn from(commands: Vec<Command>) -> Self {
        let line_numbers = vec![0; commands.len()];
        Self {
            commands,
            line_numbers,
            ..Default::default()
        }
    }
}
