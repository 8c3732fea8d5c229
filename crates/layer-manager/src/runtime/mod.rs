//! Runtime module - Request handling for one invocation
//!
//! This module provides:
//! - The dispatcher (validate, probe access, route on action)
//! - The access prober
//! - The layer lifecycle (create, read, update)

pub mod dispatcher;
pub mod probe;
pub mod lifecycle;

pub use dispatcher::handle_event;
