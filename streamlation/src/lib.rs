//! # Streamlation
//!
//! Session control plane and ingestion pipeline orchestrator for a
//! local-first real-time media translation platform.
//!
//! The crate coordinates translation sessions through five ordered
//! processing stages (ingestion, normalization, ASR, translation, output)
//! and fans live progress telemetry out to subscribers:
//!
//! - [`api`]: the session control surface with durable
//!   enqueue-and-rollback registration, lookup, listing, and live event
//!   subscriptions.
//! - [`pipeline`]: the pipeline runners and the bounded-concurrency
//!   worker pool that consumes the ingestion queue.
//! - [`broker`]: per-session status event publish/subscribe.
//! - [`queue`]: the FIFO ingestion job queue.
//! - [`database`]: durable session storage.

pub mod api;
pub mod broker;
pub mod config;
pub mod database;
pub mod domain;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod queue;

pub use error::{Error, Result};
