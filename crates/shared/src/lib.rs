//! Appointly Shared Types
//!
//! Account types shared between the relay server and anything that issues
//! credentials for it.

pub mod error;
pub mod types;

pub use error::*;
pub use types::*;
