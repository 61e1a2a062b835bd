//! Repository traits and implementations.

mod session;

pub use session::{
    LIST_DEFAULT_LIMIT, LIST_MAX_LIMIT, MemorySessionRepository, SessionRepository,
    SqlxSessionRepository,
};
