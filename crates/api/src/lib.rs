//! Appointly API Library
//!
//! Real-time chat and call-signaling relay for the appointment booking system.

pub mod auth;
pub mod config;
pub mod error;
pub mod relay;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use relay::RelayState;
pub use state::AppState;
