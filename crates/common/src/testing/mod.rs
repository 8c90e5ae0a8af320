//! Testing utilities and helpers
//!
//! - **[`operations`]**: scripted operations that fail, succeed or stall on
//!   demand, with invocation counters
//!
//! ## Usage
//!
//! ```rust
//! use bulwark_common::testing::FlakyOperation;
//!
//! # async fn example() {
//! let op = FlakyOperation::failing_times(2);
//! assert!(op.call().await.is_err());
//! assert!(op.call().await.is_err());
//! assert!(op.call().await.is_ok());
//! assert_eq!(op.calls(), 3);
//! # }
//! ```

pub mod operations;

pub use operations::{FlakyOperation, TestError};
