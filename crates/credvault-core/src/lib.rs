//! credvault core - shared functionality for the credvault crates
//!
//! Standard locations on disk and the user configuration file.

pub mod config;
pub mod paths;

pub use config::{BackendKind, Config};
pub use paths::Paths;
