use thiserror::Error;

/// Top-level error type for TableTalk.
///
/// Each variant wraps a subsystem-specific error. Subsystem crates define their
/// own error types and implement `From<SubsystemError> for TableTalkError` so
/// that the `?` operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TableTalkError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Table load error: {0}")]
    Load(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Table shape error: {0}")]
    Shape(#[from] crate::types::ShapeError),
}

impl From<toml::de::Error> for TableTalkError {
    fn from(err: toml::de::Error) -> Self {
        TableTalkError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TableTalkError {
    fn from(err: toml::ser::Error) -> Self {
        TableTalkError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TableTalkError {
    fn from(err: serde_json::Error) -> Self {
        TableTalkError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for TableTalk operations.
pub type Result<T> = std::result::Result<T, TableTalkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TableTalkError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(TableTalkError, &str)> = vec![
            (
                TableTalkError::Config("bad key".to_string()),
                "Configuration error: bad key",
            ),
            (
                TableTalkError::Load("empty payload".to_string()),
                "Table load error: empty payload",
            ),
            (
                TableTalkError::Generation("timeout".to_string()),
                "Generation error: timeout",
            ),
            (
                TableTalkError::Chat("session not found".to_string()),
                "Chat error: session not found",
            ),
            (
                TableTalkError::Api("failed to bind".to_string()),
                "API error: failed to bind",
            ),
            (
                TableTalkError::Serialization("invalid json".to_string()),
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
        let err: TableTalkError = io_err.into();
        assert!(matches!(err, TableTalkError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("not = [valid").unwrap_err();
        let err: TableTalkError = toml_err.into();
        assert!(matches!(err, TableTalkError::Config(_)));
    }

    #[test]
    fn test_toml_serialize_error_conversion() {
        // A bare integer is not a TOML document.
        let ser_err = toml::to_string(&42u32).unwrap_err();
        let err: TableTalkError = ser_err.into();
        assert!(matches!(err, TableTalkError::Config(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err: TableTalkError = json_err.into();
        assert!(matches!(err, TableTalkError::Serialization(_)));
    }

    #[test]
    fn test_shape_error_conversion() {
        let shape = crate::types::ShapeError::RaggedColumn {
            column: "age".to_string(),
            expected: 2,
            actual: 1,
        };
        let err: TableTalkError = shape.into();
        assert!(matches!(err, TableTalkError::Shape(_)));
        assert!(err.to_string().contains("age"));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<u32> {
            Ok(42)
        }
        fn returns_err() -> Result<u32> {
            Err(TableTalkError::Chat("nope".to_string()))
        }
        assert_eq!(returns_ok().unwrap(), 42);
        assert!(returns_err().is_err());
    }
}
