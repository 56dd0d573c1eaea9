//! Shared utilities.

pub mod mime;
pub mod net;
pub mod path;
