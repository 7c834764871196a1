use thiserror::Error;

/// Top-level error type for Weft.
///
/// Subsystem crates define their own error types and implement
/// `From<WeftError>` (or the reverse) so that `?` works across crate
/// boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WeftError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pattern catalog error: {0}")]
    Catalog(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Session store error: {0}")]
    Store(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for WeftError {
    fn from(err: toml::de::Error) -> Self {
        WeftError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for WeftError {
    fn from(err: toml::ser::Error) -> Self {
        WeftError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for WeftError {
    fn from(err: serde_json::Error) -> Self {
        WeftError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Weft operations.
pub type Result<T> = std::result::Result<T, WeftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WeftError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(WeftError, &str)> = vec![
            (
                WeftError::Catalog("no patterns".to_string()),
                "Pattern catalog error: no patterns",
            ),
            (
                WeftError::Backend("unreachable".to_string()),
                "Backend error: unreachable",
            ),
            (
                WeftError::Store("poisoned".to_string()),
                "Session store error: poisoned",
            ),
            (
                WeftError::Export("disk full".to_string()),
                "Export error: disk full",
            ),
            (
                WeftError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: WeftError = io_err.into();
        assert!(matches!(err, WeftError::Io(_)));
        assert!(err.to_string().starts_with("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let parsed: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let err: WeftError = parsed.unwrap_err().into();
        assert!(matches!(err, WeftError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let parsed: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let err: WeftError = parsed.unwrap_err().into();
        assert!(matches!(err, WeftError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
