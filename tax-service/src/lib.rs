//! HTTP front end for tax period, bracket and rebate resolution.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod logging;

pub use api::router;
pub use app::{AppState, build_registry};
pub use config::ServiceConfig;
pub use error::ApiError;
