use std::io;
use std::result;

use thiserror::Error;

/// Everything that can abort a math operation.
///
/// Dimension numbers in messages are 1-based, matching how `-select` numbers them.
///
#[derive(Debug, Error)]
pub enum Error {
    #[error("you must specify at least one input file (-var), even if the expression doesn't use a variable")]
    NoInputs,

    #[error("variable '{0}' specified more than once")]
    DuplicateVariable(String),

    #[error("'{name}' is a named constant equal to {value}, please use a different variable name")]
    NamedConstant { name: String, value: f64 },

    #[error("no -var option specified for variable '{0}'")]
    MissingVariable(String),

    #[error("-select for variable '{var}' has dimension {dim} and index {index}, both must be 1 or greater")]
    InvalidSelect { var: String, dim: usize, index: usize },

    #[error("-select used more than once for dimension {dim} of variable '{var}'")]
    DuplicateSelect { var: String, dim: usize },

    #[error("-select used for variable '{0}' with index other than 1 on nonexistent dimension")]
    SelectNonexistentDimension(String),

    #[error("-select for variable '{var}' uses index {index} for dimension {dim}, which has length {length}")]
    SelectOutOfRange {
        var: String,
        dim: usize,
        index: usize,
        length: usize,
    },

    #[error("variable '{var}' has length {actual} for dimension {dim} while previous -var options require a length of {expected}")]
    LengthMismatch {
        var: String,
        dim: usize,
        actual: usize,
        expected: usize,
    },

    #[error("mismatch in spatial output mapping for variable '{var}', dimension {dim}")]
    MappingMismatch { var: String, dim: usize },

    #[error("variable '{var}' is of lower dimensionality than output, and the length of output dimension {dim} is {length}, you might want to use -select with -repeat")]
    LowerDimensionality {
        var: String,
        dim: usize,
        length: usize,
    },

    #[error("length of dimension {dim} of variable '{var}' is unknown")]
    UnknownLength { var: String, dim: usize },

    #[error("all -var options used -select and -repeat for dimension {0}, there is no file to get the dimension length from")]
    UnresolvedAxis(usize),

    #[error("output must have exactly 2 dimensions, found {0}")]
    OutputAxisCount(usize),

    #[error(transparent)]
    Cifti(#[from] cifti::Error),

    #[error("failed to read config file: {0}")]
    IO(#[from] io::Error),

    #[error("invalid TOML syntax: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = result::Result<T, Error>;
