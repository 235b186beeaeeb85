//! # API Shared
//!
//! Shared definitions for the ward APIs.
//!
//! Contains:
//! - JSON request and response bodies with OpenAPI schemas (`dto` module)
//! - Shared services like `HealthService`
//!
//! Kept free of `ward-core` so clients can depend on the wire types alone.

pub mod dto;
pub mod health;

pub use dto::*;
pub use health::HealthService;
