//! Error types for layer manager invocations

use thiserror::Error;

use crate::response::LayerResponse;

/// Errors that can end a layer manager invocation
#[derive(Error, Debug)]
pub enum LayerError {
    /// Missing keys or empty values in the request
    #[error("{0}")]
    Validation(String),

    #[error("Unsupported action {0:?}, expected one of create_new, read_only, update")]
    UnknownAction(String),

    #[error("This function has no access to this bucket or it does not exist, please validate")]
    StorageAccess,

    #[error("This function has no access to Lambda resources, please validate")]
    PlatformAccess,

    #[error("A layer with this name already exists.")]
    AlreadyExists,

    #[error("No published version found for layer {0}")]
    LayerNotFound(String),

    #[error("Layer size is over limit, please consider removing unnecessary libraries")]
    SizeLimit { size_mb: u64 },

    #[error("Failed to install {package}: {detail}")]
    Install { package: String, detail: String },

    #[error("Failed to list installed packages: {0}")]
    Listing(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LayerError {
    /// Whether the error is reported as a bare diagnostic string.
    ///
    /// Input, access, conflict and size failures happen before anything is
    /// uploaded and are answered with their message alone. Everything else is
    /// wrapped in an `{"ERROR: ": ...}` object.
    pub fn is_diagnostic(&self) -> bool {
        matches!(
            self,
            LayerError::Validation(_)
                | LayerError::UnknownAction(_)
                | LayerError::StorageAccess
                | LayerError::PlatformAccess
                | LayerError::AlreadyExists
                | LayerError::LayerNotFound(_)
                | LayerError::SizeLimit { .. }
        )
    }

    /// Convert to a response
    pub fn to_response(&self) -> LayerResponse {
        if self.is_diagnostic() {
            LayerResponse::Diagnostic(self.to_string())
        } else {
            LayerResponse::Error(self.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_shapes() {
        let conflict = LayerError::AlreadyExists.to_response();
        assert_eq!(conflict.to_json(), serde_json::json!("A layer with this name already exists."));

        let upload = LayerError::Upload("bucket is read-only".into()).to_response();
        assert_eq!(
            upload.to_json(),
            serde_json::json!({"ERROR: ": "Upload failed: bucket is read-only"})
        );
    }

    #[test]
    fn test_size_limit_message() {
        let err = LayerError::SizeLimit { size_mb: 312 };
        assert!(err.is_diagnostic());
        assert_eq!(
            err.to_string(),
            "Layer size is over limit, please consider removing unnecessary libraries"
        );
    }
}
