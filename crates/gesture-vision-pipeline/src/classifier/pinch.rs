//! Pinch detection with hysteresis.
//!
//! A pinch engages when the thumb-index distance drops below `pinch_enter`
//! and releases only once it exceeds the larger `pinch_exit`, so boundary
//! jitter cannot oscillate the state. While engaged the detector reports
//! `PINCH_HOLD` every frame, which keeps static gestures from firing
//! mid-pinch.

use gesture_vision_core::{Confidence, GestureLabel};

use super::{ClassifierConfig, HandHistory};

/// Advance the per-hand pinch state with this frame's thumb-index distance.
pub(crate) fn update_pinch(
    history: &mut HandHistory,
    distance: f32,
    config: &ClassifierConfig,
) -> Option<(GestureLabel, Confidence)> {
    let confidence = Confidence::clamped(1.0 - distance / config.pinch_exit);

    if history.pinching {
        if distance > config.pinch_exit {
            history.pinching = false;
            Some((GestureLabel::PinchEnd, confidence))
        } else {
            Some((GestureLabel::PinchHold, confidence))
        }
    } else if distance < config.pinch_enter {
        history.pinching = true;
        Some((GestureLabel::PinchStart, confidence))
    } else {
        None
    }
}
