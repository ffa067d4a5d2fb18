//! Core types, errors, and configuration shared across the EC2 operator crates.
//!
//! All errors are explicit, typed, and recoverable - no panics allowed.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod error;
pub mod result;

pub use config::{DEFAULT_REGION, OperatorConfig};
pub use error::{Error, Result};
pub use result::GenericResultExt;
