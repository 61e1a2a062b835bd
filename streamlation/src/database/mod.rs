//! Durable session storage.

pub mod db;
pub mod models;
pub mod repositories;

pub use db::{create_pool, ensure_schema};
pub use repositories::{MemorySessionRepository, SessionRepository, SqlxSessionRepository};
