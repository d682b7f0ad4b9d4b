use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// An expression referenced a name that is neither a data field nor a method.
    #[error("'{0}' is not defined")]
    UnknownIdentifier(String),

    /// An event handler or call expression named a method missing from the method table.
    #[error("method '{0}' is not defined")]
    UnknownMethod(String),

    #[error("failed to parse expression `{expression}`\n{report}")]
    Parse { expression: String, report: String },

    #[error("cannot {operation} {value}")]
    Type { operation: String, value: String },

    #[error("index {index} is out of range for a list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// The active observer slot was already occupied when an evaluation started.
    #[error("an evaluation started while another one was still running")]
    NestedEvaluation,

    #[error("mount point '{0}' not found")]
    MountNotFound(String),

    #[error("method '{name}' failed: {message}")]
    Method { name: String, message: String },
}

impl Error {
    pub(crate) fn type_error(operation: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Type {
            operation: operation.into(),
            value: value.into(),
        }
    }
}
