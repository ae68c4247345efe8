//! Static pose detection: open palm and closed fist.

use gesture_vision_core::{Confidence, HandLandmark, HandObservation};

use super::{geometry, ClassifierConfig};

/// Detect an open palm.
///
/// Counts the non-thumb fingers whose tip sits above the PIP joint;
/// confidence is the fraction of extended fingers.
pub(crate) fn detect_open_palm(
    obs: &HandObservation,
    config: &ClassifierConfig,
) -> Option<Confidence> {
    let extended = geometry::extended_fingers(obs, config.open_palm_finger_threshold);
    (extended >= config.open_palm_min_fingers)
        .then(|| Confidence::clamped(f32::from(extended) / 4.0))
}

/// Detect a closed fist.
///
/// Counts the fingertips (thumb included) within
/// `closed_fist_distance_threshold` of the palm center; confidence is the
/// fraction of closed fingertips.
pub(crate) fn detect_closed_fist(
    obs: &HandObservation,
    config: &ClassifierConfig,
) -> Option<Confidence> {
    let palm = geometry::palm_center(obs);
    let closed = HandLandmark::FINGERTIPS
        .iter()
        .filter(|tip| obs.get(**tip).distance_to(&palm) < config.closed_fist_distance_threshold)
        .count() as u8;
    (closed >= config.closed_fist_min_fingers).then(|| Confidence::clamped(f32::from(closed) / 5.0))
}
