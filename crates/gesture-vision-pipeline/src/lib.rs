//! # Gesture-Vision Pipeline
//!
//! The per-frame gesture recognition core: landmark intake with stable hand
//! identities, a heuristic gesture classifier with short per-hand history
//! buffers, and per-hand temporal state machines that promote noisy raw
//! detections to clean discrete events.
//!
//! ## Data Flow
//!
//! ```text
//! HandObservation (0..2 per frame)
//!        │
//!        ▼
//!   HandIntake ──── assigns / retires HandId
//!        │
//!        ▼
//! GestureClassifier ── geometry heuristics + history rings → RawDetection
//!        │
//!        ▼
//! HandStateMachine ── stability window + cooldown → GestureEvent
//! ```
//!
//! The whole pipeline is owned and driven by a single caller; no internal
//! locking. [`GesturePipeline`] is the façade that wires the three stages
//! together and owns all per-hand state.
//!
//! ## Example
//!
//! ```rust
//! use gesture_vision_pipeline::{GesturePipeline, PipelineConfig};
//!
//! let mut pipeline = GesturePipeline::new(PipelineConfig::default());
//! // one call per camera frame, observations from the landmark extractor
//! let events = pipeline.process_frame(Vec::new(), 0);
//! assert!(events.is_empty());
//! ```

#![forbid(unsafe_code)]

pub mod classifier;
pub mod intake;
pub mod pipeline;
pub mod state_machine;

pub use classifier::{ClassifierConfig, GestureClassifier, HandHistory};
pub use intake::{FrameAssignment, HandIntake, IntakeConfig};
pub use pipeline::{GesturePipeline, PipelineConfig};
pub use state_machine::{FilterState, HandStateMachine, StateMachineConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
