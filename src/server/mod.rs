//! Server module for Jobstream
//!
//! # Module Structure
//!
//! - `config`: Configuration structures for all server components
//! - `loader`: Configuration loading from files and environment
//! - `init`: Component wiring, HTTP listener and shutdown

pub mod config;
mod init;
mod loader;

// Re-export public API
pub use init::{build_components, run, shutdown_signal};
pub use loader::load_config;
