//! Infrastructure layer module
//!
//! Everything that touches the outside world:
//! - Configuration management
//! - Logging infrastructure
//! - YAML pipeline definitions

pub mod config;
pub mod logging;
pub mod pipeline;
