//! Error handling for the `dynrtctl` CLI.

use thiserror::Error;

/// Top-level error type for the `dynrtctl` CLI.
#[derive(Error, Debug)]
pub enum CliError {
    /// Error when a required configuration is missing or unparsable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Error when command arguments fail validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// A loader operation (`load`/`unload`) failed.
    #[error("library error: {0}")]
    Library(#[from] rt_runtime::rt_loader::LoaderError),

    /// Error when IO operations fail.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`CliError`].
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = CliError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "configuration error: missing field");
    }

    #[test]
    fn test_validation_error_display() {
        let err = CliError::Validation("bad size".to_string());
        assert_eq!(err.to_string(), "validation error: bad size");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err: CliError = io_err.into();
        assert!(matches!(cli_err, CliError::Io(_)));
    }
}
