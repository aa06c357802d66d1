//! API Middleware Module
//!
//! Provides authentication, rate limiting, and usage metering middleware
//! for the National ID API.

pub mod auth;
pub mod rate_limit;
pub mod service;

pub use auth::{ApiKeyExt, API_KEY_HEADER};
pub use service::ApiMiddleware;
