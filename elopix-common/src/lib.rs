//! # EloPix Common Library
//!
//! Shared code for the EloPix services including:
//! - Error types
//! - Configuration loading and folder resolution
//! - Event types (RankEvent enum) and the EventBus
//! - SSE helpers
//! - Atomic file writes for persisted documents

pub mod atomic_file;
pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
pub use events::{EventBus, RankEvent};
