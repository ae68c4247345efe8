//! Landmark geometry primitives shared by the gesture detectors.

use gesture_vision_core::{HandLandmark, HandObservation, Landmark};

/// Arithmetic mean of all 21 landmark positions (x, y).
#[must_use]
pub fn hand_center(obs: &HandObservation) -> [f32; 2] {
    let n = obs.landmarks.len() as f32;
    let (sx, sy) = obs
        .landmarks
        .iter()
        .fold((0.0f32, 0.0f32), |(sx, sy), lm| (sx + lm.x, sy + lm.y));
    [sx / n, sy / n]
}

/// Distance between the wrist and the middle-finger MCP, used as the scale
/// reference for the hand.
#[must_use]
pub fn hand_size(obs: &HandObservation) -> f32 {
    obs.get(HandLandmark::Wrist)
        .distance_to(obs.get(HandLandmark::MiddleMcp))
}

/// Arithmetic mean of the wrist and the four non-thumb MCP joints.
#[must_use]
pub fn palm_center(obs: &HandObservation) -> Landmark {
    let n = HandLandmark::PALM_LANDMARKS.len() as f32;
    let (x, y, z) = HandLandmark::PALM_LANDMARKS
        .iter()
        .map(|lm| obs.get(*lm))
        .fold((0.0f32, 0.0f32, 0.0f32), |(x, y, z), lm| {
            (x + lm.x, y + lm.y, z + lm.z)
        });
    Landmark::new(x / n, y / n, z / n)
}

/// Number of extended non-thumb fingers.
///
/// A finger counts as extended when its tip sits strictly above its PIP
/// joint by more than `threshold` (y grows downward in image coordinates).
#[must_use]
pub fn extended_fingers(obs: &HandObservation, threshold: f32) -> u8 {
    HandLandmark::FINGER_TIP_PIP_PAIRS
        .iter()
        .filter(|(tip, pip)| obs.get(*tip).y < obs.get(*pip).y - threshold)
        .count() as u8
}

/// Distance between the thumb tip and the index fingertip.
#[must_use]
pub fn pinch_distance(obs: &HandObservation) -> f32 {
    obs.get(HandLandmark::ThumbTip)
        .distance_to(obs.get(HandLandmark::IndexTip))
}
