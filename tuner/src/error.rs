use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// The result type used in the entire tuner crate.
pub type Result<T> = std::result::Result<T, TunerErr>;

/// The tuner's error type.
#[derive(Debug)]
pub enum TunerErr {
    InvalidSpace(String),
    MissingHyperParameter(String),
    WrongType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
    UnknownTrial(String),
    Io(io::Error),
    Json(serde_json::Error),
    Persistence(String),
}

impl Display for TunerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunerErr::InvalidSpace(msg) => write!(f, "Invalid search space: {msg}"),
            TunerErr::MissingHyperParameter(name) => {
                write!(f, "There's no hyperparameter named {name}")
            }
            TunerErr::WrongType {
                name,
                expected,
                found,
            } => write!(f, "Hyperparameter {name} should be {expected}, found {found}"),
            TunerErr::UnknownTrial(id) => write!(f, "The oracle never created trial {id}"),
            TunerErr::Io(e) => write!(f, "io error: {e}"),
            TunerErr::Json(e) => write!(f, "json error: {e}"),
            TunerErr::Persistence(msg) => write!(f, "Corrupted tuner project: {msg}"),
        }
    }
}

impl Error for TunerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TunerErr::Io(e) => Some(e),
            TunerErr::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TunerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for TunerErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
