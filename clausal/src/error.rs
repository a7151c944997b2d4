use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`ClausalError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input shape or query syntax was rejected before reaching the engine
    Validation,
    /// A rule source could not be found
    Resource,
    /// The engine reported a failure while consulting or solving
    Execution,
    /// A batch call was aborted by one of its entries
    Batch,
}

/// Error types for the query runner
#[derive(Debug, Clone, Error)]
pub enum ClausalError {
    /// Input could not be turned into a goal
    #[error("{0}")]
    Validation(String),

    /// Configuration could not be read
    #[error("{0}")]
    Config(String),

    /// Rule source missing at load time
    #[error("Prolog rules file not found: {}", path.display())]
    RulesNotFound { path: PathBuf },

    /// The engine rejected a rule source
    #[error("Prolog syntax error in {}: {diagnostic}", path.display())]
    Consult { path: PathBuf, diagnostic: String },

    /// The engine failed while solving a goal
    #[error("Prolog execution error: {0}")]
    Execution(String),

    /// The engine worker is gone
    #[error("Prolog execution error: engine session is closed")]
    SessionClosed,

    /// One entry of a batch failed and aborted the whole call
    #[error("Prolog batch execution error (input {index}): {source}")]
    Batch {
        index: usize,
        #[source]
        source: Box<ClausalError>,
    },
}

impl ClausalError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn execution(diagnostic: impl Into<String>) -> Self {
        Self::Execution(diagnostic.into())
    }

    /// Wrap the first failing entry of a batch
    pub fn batch(index: usize, source: ClausalError) -> Self {
        Self::Batch {
            index,
            source: Box::new(source),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ClausalError::Validation(_) | ClausalError::Config(_) => ErrorKind::Validation,
            ClausalError::RulesNotFound { .. } => ErrorKind::Resource,
            ClausalError::Consult { .. }
            | ClausalError::Execution(_)
            | ClausalError::SessionClosed => ErrorKind::Execution,
            ClausalError::Batch { .. } => ErrorKind::Batch,
        }
    }

    /// The innermost error, looking through batch wrappers
    pub fn cause(&self) -> &ClausalError {
        match self {
            ClausalError::Batch { source, .. } => source.cause(),
            other => other,
        }
    }
}
