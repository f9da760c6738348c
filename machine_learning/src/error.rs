use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use ndarray::ShapeError;
use safetensors::SafeTensorError;

use crate::initialization::RandErr;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    IndexOutOfBounds {
        what: &'static str,
        index: usize,
        len: usize,
    },
    Shape(ShapeError),
    InvalidSpec(String),
    Diverged {
        epoch: usize,
    },
    Rand(RandErr),
    Checkpoint(String),
    Io(io::Error),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::IndexOutOfBounds { what, index, len } => {
                write!(f, "Index {index} is out of bounds for {what} of length {len}")
            }
            MlErr::Shape(e) => write!(f, "Invalid array shape: {e}"),
            MlErr::InvalidSpec(msg) => write!(f, "Invalid spec: {msg}"),
            MlErr::Diverged { epoch } => {
                write!(f, "Training diverged at epoch {epoch}, the loss is not finite")
            }
            MlErr::Rand(e) => write!(f, "Failed to build a random generator: {e}"),
            MlErr::Checkpoint(msg) => write!(f, "Checkpoint error: {msg}"),
            MlErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            MlErr::Rand(e) => Some(e),
            MlErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

impl From<RandErr> for MlErr {
    fn from(value: RandErr) -> Self {
        Self::Rand(value)
    }
}

impl From<SafeTensorError> for MlErr {
    fn from(value: SafeTensorError) -> Self {
        Self::Checkpoint(value.to_string())
    }
}

impl From<io::Error> for MlErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}
