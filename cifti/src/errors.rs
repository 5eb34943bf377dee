use std::io;
use std::result;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    IO(#[from] io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed CIFTI file: {0}")]
    Format(String),

    #[error("matrix files must have exactly 2 dimensions, header has {0}")]
    AxisCount(usize),

    #[error("row index {index} is out of range for a matrix with {rows} rows")]
    RowIndex { index: usize, rows: usize },

    #[error("row buffer has length {actual}, matrix has {expected} columns")]
    RowLength { expected: usize, actual: usize },

    #[error("length of series dimension {0} is unknown")]
    UnresolvedLength(usize),

    #[error("fiber orientation file {0}")]
    Fiber(String),
}

impl Error {
    pub(crate) fn format<S: Into<String>>(message: S) -> Self {
        Self::Format(message.into())
    }
}

pub type Result<T> = result::Result<T, Error>;
