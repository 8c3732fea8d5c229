//! Invocation response representation

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::listing::PackageListing;

/// Key holding the version ARN after `create_new`
pub const CREATED_LABEL: &str = "Layer ARN";

/// Key holding the version ARN after `update`
pub const UPDATED_LABEL: &str = "New Layer ARN";

/// Key holding the package listing after `read_only`
pub const CURRENT_LAYER_LABEL: &str = "Current Layer";

/// Key holding the detail of an operational failure
pub const ERROR_LABEL: &str = "ERROR: ";

/// Result of one invocation.
///
/// # Quick Reference
///
/// | Variant | JSON |
/// |---------|------|
/// | `Published` | `{"Layer ARN": "arn:..."}` or `{"New Layer ARN": "arn:..."}` |
/// | `Inspected` | `{"Current Layer": {"requests": "2.31.0"}}` |
/// | `Diagnostic` | `"A layer with this name already exists."` |
/// | `Error` | `{"ERROR: ": "Upload failed: ..."}` |
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerResponse {
    /// A new layer version was published
    Published { label: &'static str, arn: String },

    /// Packages installed in the latest version
    Inspected(PackageListing),

    /// Request rejected before anything was published
    Diagnostic(String),

    /// Operational failure
    Error(String),
}

impl LayerResponse {
    /// Response for a freshly created layer
    pub fn created(arn: impl Into<String>) -> Self {
        Self::Published { label: CREATED_LABEL, arn: arn.into() }
    }

    /// Response for an updated layer
    pub fn updated(arn: impl Into<String>) -> Self {
        Self::Published { label: UPDATED_LABEL, arn: arn.into() }
    }

    pub fn inspected(listing: PackageListing) -> Self {
        Self::Inspected(listing)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Published { .. } | Self::Inspected(_))
    }

    /// Render as the JSON value returned to the caller
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| Value::String(e.to_string()))
    }
}

impl Serialize for LayerResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Published { label, arn } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(label, arn)?;
                map.end()
            }
            Self::Inspected(listing) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(CURRENT_LAYER_LABEL, listing)?;
                map.end()
            }
            Self::Diagnostic(message) => serializer.serialize_str(message),
            Self::Error(detail) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(ERROR_LABEL, detail)?;
                map.end()
            }
        }
    }
}
