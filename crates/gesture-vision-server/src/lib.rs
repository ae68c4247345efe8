//! # Gesture-Vision Server
//!
//! The broadcast side of the gesture recognition system: a vision loop
//! thread that drives the pipeline at camera rate, and an axum WebSocket
//! server that fans gesture events out to subscribers with bounded
//! per-subscriber queues and a newest-wins drop policy.
//!
//! ```text
//!              vision thread (sync)         async runtime
//! ┌──────────┐   ┌───────────────┐   ┌─────────────┐   ┌────────────┐
//! │ Landmark │──▶│GesturePipeline│──▶│ Broadcaster │──▶│ subscriber │──▶ ws
//! │  Source  │   └───────────────┘   │  (publish)  │   │   tasks    │
//! └──────────┘                       └─────────────┘   └────────────┘
//! ```
//!
//! `Broadcaster::publish` is the only boundary between the two sides: it
//! hands each message to every subscriber queue under short-held locks and
//! never awaits.

#![forbid(unsafe_code)]

pub mod broadcaster;
pub mod config;
pub mod protocol;
pub mod source;
pub mod vision;
pub mod ws;

pub use broadcaster::{Broadcaster, Outbound, StatusUpdate, SubscriberQueue};
pub use config::{BroadcasterConfig, DetectorConfig, ServerConfig, VisionConfig};
pub use protocol::{ClientMessage, ServerMessage};
pub use source::{JsonlReplaySource, LandmarkSource, SourceError, SyntheticSource};

use thiserror::Error;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fatal server errors. These surface as a single-line diagnostic and a
/// non-zero exit code at startup.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration file could not be read or parsed
    #[error("invalid configuration {path}: {message}")]
    Config {
        /// Path of the offending file
        path: String,
        /// What went wrong
        message: String,
    },

    /// Configuration values fail validation
    #[error("configuration error: {0}")]
    Validation(#[from] gesture_vision_core::CoreError),

    /// The listen socket could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested bind address
        addr: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Landmark source could not be opened
    #[error("landmark source: {0}")]
    Source(#[from] source::SourceError),

    /// Other I/O failures
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
