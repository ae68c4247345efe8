//! Heuristic gesture classification.
//!
//! Maps a single [`HandObservation`] (plus that hand's short history) to at
//! most one [`RawDetection`] per frame. Detectors run in a fixed priority
//! order — swipe, push, pinch, open palm, closed fist — with the temporal
//! detectors first because a successful detection consumes the history
//! rings, and a static pose held through a swipe must not mask the swipe.

mod geometry;
mod pinch;
mod static_pose;
mod temporal;

use std::collections::VecDeque;

use serde::Deserialize;
use tracing::trace;

use gesture_vision_core::{
    CoreError, CoreResult, DetectionMetadata, GestureLabel, HandObservation, RawDetection,
};

/// Configuration for the gesture classifier heuristics.
///
/// All distances are in image-normalized coordinates.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// How far a fingertip must sit above its PIP joint to count as extended
    pub open_palm_finger_threshold: f32,
    /// Extended fingers required for an open palm
    pub open_palm_min_fingers: u8,
    /// Fingertip-to-palm-center distance below which a finger counts as closed
    pub closed_fist_distance_threshold: f32,
    /// Closed fingertips required for a fist
    pub closed_fist_min_fingers: u8,
    /// Thumb-index distance below which a pinch engages
    pub pinch_enter: f32,
    /// Thumb-index distance above which an engaged pinch releases
    pub pinch_exit: f32,
    /// Position-history window length for swipe detection
    pub swipe_window_size: usize,
    /// Horizontal displacement across the window that triggers a swipe
    pub swipe_dx_threshold: f32,
    /// Vertical displacement across the window that triggers a swipe
    pub swipe_dy_threshold: f32,
    /// Maximum cross-axis movement as a fraction of the main-axis movement
    pub cross_axis_ratio: f32,
    /// Size-history window length for push detection
    pub push_window_size: usize,
    /// Relative hand-size growth across the window that signals a push
    pub push_size_increase_threshold: f32,
    /// Wrist-depth decrease across the window that signals a push
    pub push_z_threshold: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            open_palm_finger_threshold: 0.02,
            open_palm_min_fingers: 3,
            closed_fist_distance_threshold: 0.10,
            closed_fist_min_fingers: 4,
            pinch_enter: 0.05,
            pinch_exit: 0.07,
            swipe_window_size: 8,
            swipe_dx_threshold: 0.08,
            swipe_dy_threshold: 0.08,
            cross_axis_ratio: 0.8,
            push_window_size: 8,
            push_size_increase_threshold: 0.15,
            push_z_threshold: 0.10,
        }
    }
}

impl ClassifierConfig {
    /// Validates threshold relationships.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the pinch hysteresis band is
    /// inverted or a temporal window is too short to express movement.
    pub fn validate(&self) -> CoreResult<()> {
        if self.pinch_enter >= self.pinch_exit {
            return Err(CoreError::configuration(format!(
                "pinch_enter ({}) must be below pinch_exit ({})",
                self.pinch_enter, self.pinch_exit
            )));
        }
        if self.swipe_window_size < 2 {
            return Err(CoreError::configuration(
                "swipe_window_size must be at least 2",
            ));
        }
        if self.push_window_size < 2 {
            return Err(CoreError::configuration(
                "push_window_size must be at least 2",
            ));
        }
        if self.open_palm_min_fingers > 4 {
            return Err(CoreError::configuration(
                "open_palm_min_fingers cannot exceed 4",
            ));
        }
        if self.closed_fist_min_fingers > 5 {
            return Err(CoreError::configuration(
                "closed_fist_min_fingers cannot exceed 5",
            ));
        }
        Ok(())
    }
}

/// One entry of the per-hand position ring.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PositionSample {
    /// Mean of all 21 landmark positions at this frame.
    pub center: [f32; 2],
    /// Frame wall-clock time, milliseconds since epoch.
    #[allow(dead_code)]
    pub timestamp_ms: i64,
}

/// One entry of the per-hand size ring.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SizeSample {
    /// Wrist to middle-MCP distance at this frame.
    pub size: f32,
    /// Wrist depth at this frame.
    pub wrist_z: f32,
}

/// Per-hand classifier state: bounded history rings plus the pinch
/// hysteresis bit. Created and destroyed with the hand identity.
#[derive(Debug, Default)]
pub struct HandHistory {
    pub(crate) position: VecDeque<PositionSample>,
    pub(crate) sizes: VecDeque<SizeSample>,
    pub(crate) pinching: bool,
}

impl HandHistory {
    /// Creates empty history state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the pinch hysteresis is currently engaged.
    #[must_use]
    pub fn is_pinching(&self) -> bool {
        self.pinching
    }

    /// Clears all state, including the pinch bit.
    pub fn clear(&mut self) {
        self.position.clear();
        self.sizes.clear();
        self.pinching = false;
    }

    /// Clears both motion rings, leaving the pinch bit untouched.
    pub(crate) fn clear_motion(&mut self) {
        self.position.clear();
        self.sizes.clear();
    }

    fn push_sample(
        &mut self,
        center: [f32; 2],
        timestamp_ms: i64,
        size: f32,
        wrist_z: f32,
        position_cap: usize,
        size_cap: usize,
    ) {
        if self.position.len() == position_cap {
            self.position.pop_front();
        }
        self.position.push_back(PositionSample {
            center,
            timestamp_ms,
        });
        if self.sizes.len() == size_cap {
            self.sizes.pop_front();
        }
        self.sizes.push_back(SizeSample { size, wrist_z });
    }
}

/// Classifies hand observations into gesture labels using geometric
/// heuristics. Stateless apart from its configuration; all per-hand state
/// lives in [`HandHistory`], owned by the caller.
pub struct GestureClassifier {
    config: ClassifierConfig,
}

impl GestureClassifier {
    /// Create a classifier with the provided configuration.
    #[must_use]
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Create a classifier with default thresholds.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(ClassifierConfig::default())
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify one hand for one frame.
    ///
    /// Returns `None` when no gesture is recognized or the observation
    /// carries unusable landmarks.
    pub fn classify(
        &self,
        history: &mut HandHistory,
        obs: &HandObservation,
        now_ms: i64,
    ) -> Option<RawDetection> {
        let center = geometry::hand_center(obs);
        let size = geometry::hand_size(obs);
        let wrist = *obs.wrist();

        // History advances even on unusable frames so a stale window cannot
        // produce a spike once valid frames resume.
        history.push_sample(
            center,
            now_ms,
            size,
            wrist.z,
            self.config.swipe_window_size,
            self.config.push_window_size,
        );

        if !obs.is_valid() {
            trace!("observation rejected: landmark out of range");
            return None;
        }

        let metadata = DetectionMetadata {
            hand_center: center,
            hand_size: size,
            wrist_z: wrist.z,
            fingers_extended: geometry::extended_fingers(
                obs,
                self.config.open_palm_finger_threshold,
            ),
        };

        if let Some((label, confidence)) = temporal::detect_swipe(history, &self.config) {
            return Some(RawDetection::new(label, confidence, metadata));
        }
        if let Some(confidence) = temporal::detect_push(history, &self.config) {
            return Some(RawDetection::new(
                GestureLabel::PushForward,
                confidence,
                metadata,
            ));
        }
        if let Some((label, confidence)) =
            pinch::update_pinch(history, geometry::pinch_distance(obs), &self.config)
        {
            return Some(RawDetection::new(label, confidence, metadata));
        }
        if let Some(confidence) = static_pose::detect_open_palm(obs, &self.config) {
            return Some(RawDetection::new(
                GestureLabel::OpenPalm,
                confidence,
                metadata,
            ));
        }
        if let Some(confidence) = static_pose::detect_closed_fist(obs, &self.config) {
            return Some(RawDetection::new(
                GestureLabel::ClosedFist,
                confidence,
                metadata,
            ));
        }
        None
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use gesture_vision_core::HandLandmark;

    #[test]
    fn test_config_validation() {
        assert!(ClassifierConfig::default().validate().is_ok());

        let inverted = ClassifierConfig {
            pinch_enter: 0.08,
            pinch_exit: 0.07,
            ..ClassifierConfig::default()
        };
        assert!(inverted.validate().is_err());

        let short_window = ClassifierConfig {
            swipe_window_size: 1,
            ..ClassifierConfig::default()
        };
        assert!(short_window.validate().is_err());
    }

    #[test]
    fn test_open_palm_detected() {
        let classifier = GestureClassifier::with_defaults();
        let mut history = HandHistory::new();
        let det = classifier
            .classify(&mut history, &open_palm_hand(0.5, 0.5), 0)
            .expect("open palm should be detected");
        assert_eq!(det.label, GestureLabel::OpenPalm);
        assert_eq!(det.metadata.fingers_extended, 4);
        assert!((det.confidence.value() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_closed_fist_detected() {
        let classifier = GestureClassifier::with_defaults();
        let mut history = HandHistory::new();
        let det = classifier
            .classify(&mut history, &fist_hand(0.5, 0.5), 0)
            .expect("fist should be detected");
        assert_eq!(det.label, GestureLabel::ClosedFist);
    }

    #[test]
    fn test_neutral_hand_yields_nothing() {
        let classifier = GestureClassifier::with_defaults();
        let mut history = HandHistory::new();
        assert!(classifier
            .classify(&mut history, &neutral_hand(0.5, 0.5), 0)
            .is_none());
    }

    #[test]
    fn test_swipe_beats_static_gesture() {
        // An open palm moving right across the frame must register as a
        // swipe, not as OPEN_PALM.
        let classifier = GestureClassifier::with_defaults();
        let mut history = HandHistory::new();

        let mut last = None;
        for i in 0..8 {
            let cx = 0.3 + 0.2 * (i as f32) / 7.0;
            last = classifier.classify(&mut history, &open_palm_hand(cx, 0.5), i64::from(i) * 33);
        }
        let det = last.expect("final frame should detect something");
        assert_eq!(det.label, GestureLabel::SwipeRight);
        // Window is consumed; the next frame starts a fresh ring.
        assert!(history.position.is_empty());
    }

    #[test]
    fn test_invalid_frame_advances_history() {
        let classifier = GestureClassifier::with_defaults();
        let mut history = HandHistory::new();

        let mut bad = neutral_hand(0.5, 0.5);
        bad.landmarks[HandLandmark::IndexTip.index()].x = f32::NAN;

        assert!(classifier.classify(&mut history, &bad, 0).is_none());
        assert_eq!(history.position.len(), 1);
        assert_eq!(history.sizes.len(), 1);
    }

    #[test]
    fn test_poisoned_window_cannot_trigger_swipe() {
        let classifier = GestureClassifier::with_defaults();
        let mut history = HandHistory::new();

        let mut bad = neutral_hand(0.3, 0.5);
        bad.landmarks[HandLandmark::IndexTip.index()].x = f32::NAN;
        classifier.classify(&mut history, &bad, 0);

        // Seven valid frames sweeping right; the NaN first entry keeps the
        // displacement comparison unsatisfied.
        for i in 1..8 {
            let cx = 0.3 + 0.2 * (i as f32) / 7.0;
            let det = classifier.classify(&mut history, &neutral_hand(cx, 0.5), i64::from(i) * 33);
            assert!(det.is_none(), "frame {i} must not trigger with NaN in window");
        }
    }

    #[test]
    fn test_metadata_snapshot() {
        let classifier = GestureClassifier::with_defaults();
        let mut history = HandHistory::new();
        let det = classifier
            .classify(&mut history, &open_palm_hand(0.4, 0.6), 0)
            .unwrap();
        assert!((det.metadata.hand_size - 0.2).abs() < 1e-3);
        assert!(det.metadata.hand_center[0] > 0.3 && det.metadata.hand_center[0] < 0.5);
        assert_eq!(det.metadata.wrist_z, 0.0);
    }
}
