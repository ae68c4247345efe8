//! Temporal gesture detection: swipes and push-forward.
//!
//! Both detectors require their history ring to be full before they can
//! trigger, and consume the ring on success so one movement produces one
//! detection.

use gesture_vision_core::{Confidence, GestureLabel};

use super::{ClassifierConfig, HandHistory};

/// Detect a swipe from the position-history window.
///
/// The signed displacement between the first and last window entries picks
/// the axis; movement on the cross axis beyond `cross_axis_ratio` times the
/// main-axis movement rejects the swipe as diagonal. Image y grows
/// downward, so decreasing y is a swipe up.
pub(crate) fn detect_swipe(
    history: &mut HandHistory,
    config: &ClassifierConfig,
) -> Option<(GestureLabel, Confidence)> {
    if history.position.len() < config.swipe_window_size {
        return None;
    }
    let first = history.position.front()?.center;
    let last = history.position.back()?.center;
    let dx = last[0] - first[0];
    let dy = last[1] - first[1];

    if dx.abs() > config.swipe_dx_threshold && dy.abs() <= config.cross_axis_ratio * dx.abs() {
        let label = if dx < 0.0 {
            GestureLabel::SwipeLeft
        } else {
            GestureLabel::SwipeRight
        };
        let confidence = Confidence::clamped(dx.abs() / (2.0 * config.swipe_dx_threshold));
        history.position.clear();
        return Some((label, confidence));
    }

    if dy.abs() > config.swipe_dy_threshold && dx.abs() <= config.cross_axis_ratio * dy.abs() {
        let label = if dy < 0.0 {
            GestureLabel::SwipeUp
        } else {
            GestureLabel::SwipeDown
        };
        let confidence = Confidence::clamped(dy.abs() / (2.0 * config.swipe_dy_threshold));
        history.position.clear();
        return Some((label, confidence));
    }

    None
}

/// Detect a push toward the camera from the size-history window.
///
/// Requires both the apparent hand size to grow and the wrist depth to
/// decrease across the window; either signal alone is too noisy.
pub(crate) fn detect_push(
    history: &mut HandHistory,
    config: &ClassifierConfig,
) -> Option<Confidence> {
    if history.sizes.len() < config.push_window_size {
        return None;
    }
    let first = *history.sizes.front()?;
    let last = *history.sizes.back()?;
    if first.size <= f32::EPSILON {
        return None;
    }

    let size_increase = (last.size - first.size) / first.size;
    let z_approach = first.wrist_z - last.wrist_z;

    if size_increase > config.push_size_increase_threshold && z_approach > config.push_z_threshold {
        history.clear_motion();
        return Some(Confidence::clamped(
            size_increase / (2.0 * config.push_size_increase_threshold),
        ));
    }

    None
}
