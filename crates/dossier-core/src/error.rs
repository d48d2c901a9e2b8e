//! Error types for dossier.

use thiserror::Error;

/// Result type alias using dossier's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for dossier operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Purchase order not found
    #[error("Purchase order not found: {0}")]
    OrderNotFound(uuid::Uuid),

    /// Partner not found
    #[error("Partner not found: {0}")]
    PartnerNotFound(uuid::Uuid),

    /// Attachment not found
    #[error("Attachment not found: {0}")]
    AttachmentNotFound(uuid::Uuid),

    /// PDF merge failed (malformed or corrupt input document)
    #[error("Merge error: {0}")]
    Merge(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<lopdf::Error> for Error {
    fn from(e: lopdf::Error) -> Self {
        Error::Merge(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("test resource".to_string());
        assert_eq!(err.to_string(), "Not found: test resource");
    }

    #[test]
    fn test_error_display_order_not_found() {
        let id = Uuid::nil();
        let err = Error::OrderNotFound(id);
        assert_eq!(err.to_string(), format!("Purchase order not found: {}", id));
    }

    #[test]
    fn test_error_display_partner_not_found() {
        let id = Uuid::new_v4();
        let err = Error::PartnerNotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_error_display_attachment_not_found() {
        let id = Uuid::new_v4();
        let err = Error::AttachmentNotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_error_display_merge() {
        let err = Error::Merge("trailer is missing".to_string());
        assert_eq!(err.to_string(), "Merge error: trailer is missing");
    }

    #[test]
    fn test_error_display_invalid_input() {
        let err = Error::InvalidInput("empty filename".to_string());
        assert_eq!(err.to_string(), "Invalid input: empty filename");
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("missing DATABASE_URL".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing DATABASE_URL");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number");
        assert!(json_err.is_err());

        let err: Error = json_err.unwrap_err().into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_lopdf_error_maps_to_merge() {
        let lopdf_err = lopdf::Document::load_mem(b"definitely not a pdf").unwrap_err();
        let err: Error = lopdf_err.into();
        match err {
            Error::Merge(_) => {}
            _ => panic!("Expected Merge error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        match err {
            Error::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
