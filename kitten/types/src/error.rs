/*!
    Error types for the kitten crate ecosystem.
*/

use thiserror::Error;

/**
    Error type for the kitten crate ecosystem.
*/
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (unreadable store file, missing data directory, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A stored or configured value could not be encoded or decoded
    #[error("malformed value for {key}: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    /// Configuration that is structurally valid but unusable
    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl Error {
    /**
        Create a JSON error for the given storage key or file name.
    */
    pub fn json(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            key: key.into(),
            source,
        }
    }

    /**
        Create a configuration error with the given message.
    */
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/**
    Result type alias for the kitten crate ecosystem.
*/
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn error_display() {
        let e = Error::config("no streaming domains configured");
        assert_eq!(
            format!("{e}"),
            "invalid configuration: no streaming domains configured"
        );

        let parse = serde_json::from_str::<u32>("nope").unwrap_err();
        let e = Error::json("cloakSettings", parse);
        assert!(format!("{e}").starts_with("malformed value for cloakSettings"));
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(format!("{e}").contains("file not found"));
    }

    #[test]
    fn error_source() {
        let parse = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(StdError::source(&Error::json("k", parse)).is_some());
        assert!(StdError::source(&Error::config("x")).is_none());
    }
}
