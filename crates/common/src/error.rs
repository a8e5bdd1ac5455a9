use crate::types::{SourceId, SourceKind};

/// Errors raised anywhere in the render core.
///
/// Configuration and type errors are meant to surface while a scene is being
/// assembled, before any render loop runs. Driver errors are fatal and are
/// never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("cannot resolve task order, cycle among: {}", unresolved.join(", "))]
    Resolve { unresolved: Vec<String> },
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: String,
        found: String,
    },
    #[error("driver error: {0}")]
    Driver(String),
    #[error("unknown or removed source {0}")]
    UnknownSource(SourceId),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver(message.into())
    }

    pub fn kind_mismatch(expected: SourceKind, found: SourceKind) -> Self {
        Self::TypeMismatch {
            expected: expected.name().into(),
            found: found.name().into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
