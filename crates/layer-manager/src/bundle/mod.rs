//! Layer bundle handling
//!
//! A layer archive nests every installed package one level deep:
//! ```text
//! python.zip
//! └── python/
//!     ├── requests/
//!     │   └── __init__.py
//!     └── requests-2.31.0.dist-info/
//!         └── METADATA
//! ```
//!
//! Each invocation assembles that tree in its own staging directory, checks
//! its size, and packs it back into an archive.

pub mod archive;
pub mod staging;

pub use archive::{pack_directory, unpack_archive};
pub use staging::{check_size_limit, StagingArea};

/// Top-level directory inside every layer archive
pub const ARCHIVE_ROOT: &str = "python";

/// Object key the archive is uploaded under
pub const ARCHIVE_KEY: &str = "python.zip";
