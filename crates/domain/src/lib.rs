//! # Bulwark Domain
//!
//! Data types shared by every Bulwark crate.
//!
//! This crate contains:
//! - Resilience configuration structures and their validation
//! - The declarative retry schedule algebra
//! - Circuit state, error kinds, health snapshots and telemetry events
//! - Configuration error types and constants
//!
//! ## Architecture
//! - No dependencies on other Bulwark crates
//! - Only `serde` and `thiserror` as external dependencies
//! - Pure data structures and pure functions over them

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod schedule;
pub mod serde_utils;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use schedule::{Jitter, RetrySchedule};
pub use types::*;
