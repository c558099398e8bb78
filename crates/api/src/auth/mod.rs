//! Authentication module for Appointly

pub mod jwt;

pub use jwt::{Claims, JwtError, JwtManager};
