//! Layer Manager SDK - Types shared by the layer manager function and its callers
//!
//! This crate holds the invocation contract of the layer manager:
//! the request shape and its validation, the response shapes, the error
//! taxonomy, and the installed-package listing parser.

pub mod request;
pub mod response;
pub mod error;
pub mod listing;

pub mod prelude {
    //! Common imports for code driving the layer manager
    pub use crate::request::{validate_fields, Action, LayerRequest, REQUIRED_FIELDS};
    pub use crate::response::LayerResponse;
    pub use crate::listing::{parse_listing, PackageListing};
    pub use crate::error::LayerError;
    pub use serde_json::{json, Value as JsonValue};
}

// Re-export key types at crate root
pub use request::{Action, LayerRequest};
pub use response::LayerResponse;
pub use error::LayerError;
pub use listing::PackageListing;
