//! Common utilities shared by the data-access crates.
//!
//! This crate provides:
//! - Unified error handling for repositories and the unit of work
//! - Configuration structures loaded from the environment
//! - Tracing subscriber setup

pub mod config;
pub mod error;
pub mod telemetry;

pub use config::*;
pub use error::{AppError, AppResult};
