//! # Gesture-Vision Core
//!
//! Core data types for the gesture-vision hand gesture recognition system.
//!
//! This crate provides the foundational building blocks shared by the
//! recognition pipeline and the broadcast server:
//!
//! - **Landmark Types**: [`Landmark`], [`HandLandmark`], and
//!   [`HandObservation`] for representing the 21-point hand skeleton the
//!   landmark extractor reports per frame.
//!
//! - **Detection Types**: [`RawDetection`], [`DetectionMetadata`], and
//!   [`GestureEvent`] for the per-frame classifier output and the filtered
//!   discrete events delivered to subscribers.
//!
//! - **Label Model**: [`GestureLabel`] with its per-label [`EmitPolicy`]
//!   deciding how the temporal filter promotes detections to events.
//!
//! - **Error Types**: unified error handling via the [`error`] module.
//!
//! ## Example
//!
//! ```rust
//! use gesture_vision_core::{Confidence, GestureLabel, EmitPolicy};
//!
//! let conf = Confidence::new(0.9).unwrap();
//! assert!(conf.value() > 0.5);
//!
//! // Pinch-hold re-emits every frame; everything else is debounced.
//! assert_eq!(GestureLabel::PinchHold.emit_policy(), EmitPolicy::Continuous);
//! assert_eq!(GestureLabel::OpenPalm.emit_policy(), EmitPolicy::Stable);
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod types;

// Re-export commonly used types at the crate root
pub use error::{CoreError, CoreResult};
pub use types::{
    // Landmark types
    Landmark, HandLandmark, HandObservation, Handedness,
    // Identity
    HandId,
    // Detection types
    RawDetection, DetectionMetadata, GestureEvent,
    // Label model
    GestureLabel, EmitPolicy,
    // Common types
    Confidence,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Number of landmarks per hand (canonical 21-point layout)
pub const LANDMARK_COUNT: usize = 21;

/// Maximum number of hands tracked simultaneously
pub const MAX_HANDS: usize = 2;
