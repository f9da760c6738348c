use std::{fmt, io};

use machine_learning::MlErr;
use tuner::TunerErr;

/// All errors that can occur in the harness.
#[derive(Debug)]
pub enum HarnessErr {
    /// Invalid configuration, caught before any training starts.
    InvalidConfig(String),
    Ml(MlErr),
    Tuner(TunerErr),
    Json(serde_json::Error),
    Io(io::Error),
}

impl fmt::Display for HarnessErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Ml(e) => write!(f, "training error: {e}"),
            Self::Tuner(e) => write!(f, "tuner error: {e}"),
            Self::Json(e) => write!(f, "json error: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for HarnessErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Ml(e) => Some(e),
            Self::Tuner(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::InvalidConfig(_) => None,
        }
    }
}

impl From<MlErr> for HarnessErr {
    fn from(e: MlErr) -> Self {
        Self::Ml(e)
    }
}

impl From<TunerErr> for HarnessErr {
    fn from(e: TunerErr) -> Self {
        Self::Tuner(e)
    }
}

impl From<serde_json::Error> for HarnessErr {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<io::Error> for HarnessErr {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
