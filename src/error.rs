use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TfstateError {
    #[error("invalid state file: {0}")]
    Format(String),

    #[error("state validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    Conflict(String),

    #[error("attribute path '{path}': {message}")]
    Path { path: String, message: String },

    #[error("invalid resource address '{address}': {message}")]
    InvalidAddress { address: String, message: String },

    #[error("invalid name pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl TfstateError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TfstateError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn path(path: impl Into<String>, message: impl Into<String>) -> Self {
        TfstateError::Path {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invalid_address(address: impl Into<String>, message: impl Into<String>) -> Self {
        TfstateError::InvalidAddress {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Process exit code reported by the CLI for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            TfstateError::Format(_) | TfstateError::Validation(_) => 2,
            TfstateError::NotFound(_) => 3,
            TfstateError::Path { .. } => 4,
            TfstateError::Conflict(_) => 5,
            TfstateError::InvalidAddress { .. }
            | TfstateError::InvalidPattern { .. }
            | TfstateError::Io { .. }
            | TfstateError::Cancelled => 1,
        }
    }
}

pub type Result<T, E = TfstateError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_format_error_display() {
        let err = TfstateError::Format("missing field `serial`".to_string());
        assert_eq!(err.to_string(), "invalid state file: missing field `serial`");
    }

    #[test]
    fn test_validation_error_joins_violations() {
        let err = TfstateError::Validation(vec![
            "resource 0 has an empty type".to_string(),
            "duplicate address aws_instance.web".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "state validation failed: resource 0 has an empty type; duplicate address aws_instance.web"
        );
    }

    #[test]
    fn test_path_error_display() {
        let err = TfstateError::path("tags.Name.first", "'Name' is not a mapping");
        assert_eq!(
            err.to_string(),
            "attribute path 'tags.Name.first': 'Name' is not a mapping"
        );
    }

    #[test]
    fn test_io_error_names_path() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = TfstateError::io("terraform.tfstate", io_err);
        assert!(matches!(err, TfstateError::Io { .. }));
        assert!(err.to_string().contains("terraform.tfstate"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(TfstateError::Format(String::new()).exit_code(), 2);
        assert_eq!(TfstateError::Validation(vec![]).exit_code(), 2);
        assert_eq!(TfstateError::NotFound("a.b".to_string()).exit_code(), 3);
        assert_eq!(TfstateError::path("x", "y").exit_code(), 4);
        assert_eq!(TfstateError::Conflict("a.b".to_string()).exit_code(), 5);
        assert_eq!(TfstateError::Cancelled.exit_code(), 1);
        assert_eq!(TfstateError::invalid_address("x", "y").exit_code(), 1);
    }
}
