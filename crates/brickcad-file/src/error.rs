//! SNAP 元数据错误定义

use thiserror::Error;

/// 解析错误
#[derive(Error, Debug)]
pub enum MetaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing mandatory parameter '{parameter}' in {command}")]
    MissingParameter {
        command: &'static str,
        parameter: &'static str,
    },

    #[error("Invalid number '{value}' in parameter '{parameter}'")]
    InvalidNumber { parameter: String, value: String },

    #[error("Parameter '{parameter}' expects {expected} values, got {actual}")]
    WrongArity {
        parameter: String,
        expected: String,
        actual: usize,
    },

    #[error("Value '{value}' in parameter '{parameter}' exceeds {max}")]
    OutOfRange {
        parameter: String,
        value: String,
        max: String,
    },

    #[error("Value '{value}' of parameter '{parameter}' cannot be written")]
    Unrepresentable { parameter: String, value: String },

    #[error("Unknown bounding shape '{0}'")]
    UnknownBounding(String),

    #[error("Line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<MetaError>,
    },
}

impl MetaError {
    pub(crate) fn at_line(self, line: usize) -> Self {
        MetaError::AtLine {
            line,
            source: Box::new(self),
        }
    }
}

/// 转换错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("Unresolved SNAP_INCL reference: {0}")]
    UnresolvedReference(String),

    #[error("SNAP_INCL nesting deeper than {max_depth} at '{reference}'")]
    IncludeDepthExceeded { reference: String, max_depth: usize },
}
