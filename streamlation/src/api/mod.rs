//! HTTP control surface and live event subscriptions.

pub mod error;
pub mod models;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{AppState, build_router, serve};
