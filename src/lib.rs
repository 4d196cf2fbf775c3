// Library exports for Unifocus
// The binary and the integration tests both build on these modules

pub mod api;
pub mod auth;
pub mod client;
pub mod commands;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod models;

pub use auth::{Session, SessionStore};
pub use client::ApiClient;
pub use config::ClientConfig;
pub use dashboard::{DashboardController, DashboardSnapshot};
pub use error::{ApiError, ApiResult};
