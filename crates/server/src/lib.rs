//! HTTP API server for picstash.
//!
//! This crate provides the HTTP surface:
//! - Multipart image upload with validation
//! - Paginated listing and random pick
//! - Deletion of records and their files
//! - Raw image serving
//! - Health and Prometheus metrics endpoints

pub mod coordinator;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod timeout;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
