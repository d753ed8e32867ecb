//! BrickCAD 文件格式处理
//!
//! 支持：
//! - LDCad `SNAP_*` 元数据的解析与输出
//! - 整个零件文件的元数据与子文件引用扫描
//! - 指令到连接器的转换（含 `SNAP_INCL` 与子文件引用展开）

pub mod conversion;
pub mod error;
pub mod snap_file;
pub mod snap_meta;
pub mod snap_writer;

pub use conversion::{part_connectors, ConnectorConversion, SnapResolver, MAX_INCLUDE_DEPTH};
pub use error::{ConversionError, MetaError};
pub use snap_file::{FileType, SnapMetaFile, SubfileReference};
pub use snap_meta::{
    parse_line, Axis, Command, CylCaps, CylShapeVariant, Grid, MirrorInfoCommand, MirrorType,
    ScaleType, MAX_GRID_COUNT,
};
