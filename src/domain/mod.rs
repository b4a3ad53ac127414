//! Domain layer for the stigmergy collective
//!
//! This module contains the trace model, agent descriptors, run results,
//! configuration types and the agent action port.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
