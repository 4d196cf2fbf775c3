//! Typed façades over the backend's resource families.

pub mod auth;
pub mod metrics;
pub mod opportunities;
pub mod profile;

pub use auth::AuthApi;
pub use metrics::MetricsApi;
pub use opportunities::{OpportunitiesApi, OpportunityFilter};
pub use profile::ProfileApi;
