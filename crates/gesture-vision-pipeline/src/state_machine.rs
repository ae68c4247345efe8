//! Per-hand temporal filtering state machine.
//!
//! Converts the per-frame stream of `Option<RawDetection>` into a sparse
//! stream of [`GestureEvent`]s: a gesture must stay stable for a window of
//! consecutive frames before it is promoted, and each emission opens a
//! refractory period during which further input is ignored.
//!
//! Promotion is governed by the per-label [`EmitPolicy`]:
//!
//! - `Stable` gestures need the full window and are silenced while a
//!   cooldown is active.
//! - `Immediate` gestures emit with a window of one frame and stay
//!   responsive through an active cooldown: the classifier already
//!   debounces them (pinch hysteresis, consumed motion windows), and a
//!   swallowed `PINCH_END` would leave subscribers with a dangling pinch.
//!   Emitting one still opens a fresh cooldown.
//! - `Continuous` gestures (pinch hold) re-emit every frame so drag-like
//!   interactions can track them; this is the only path that bypasses the
//!   refractory rule entirely, and it is isolated in one early branch.

use std::collections::VecDeque;

use serde::Deserialize;
use tracing::{debug, trace};

use gesture_vision_core::{
    Confidence, EmitPolicy, GestureEvent, GestureLabel, HandId, RawDetection,
};

/// Configuration for the per-hand state machine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StateMachineConfig {
    /// Consecutive identical frames required to promote a stable gesture
    pub stability_frames: usize,
    /// Refractory period after an emission, in milliseconds
    pub cooldown_ms: i64,
    /// Allow re-emitting the gesture that was emitted last
    pub allow_same_gesture_repeat: bool,
    /// Lockout window for repeating the last gesture; defaults to
    /// `cooldown_ms` when unset
    pub same_gesture_lockout_ms: Option<i64>,
    /// Frame rate used to convert the cooldown into frames when the clock
    /// regresses
    pub fallback_fps: f64,
}

impl Default for StateMachineConfig {
    fn default() -> Self {
        Self {
            stability_frames: 5,
            cooldown_ms: 1000,
            allow_same_gesture_repeat: false,
            same_gesture_lockout_ms: None,
            fallback_fps: 30.0,
        }
    }
}

impl StateMachineConfig {
    fn lockout_ms(&self) -> i64 {
        self.same_gesture_lockout_ms.unwrap_or(self.cooldown_ms)
    }

    fn cooldown_frames(&self) -> u32 {
        let frames = (self.cooldown_ms as f64 * self.fallback_fps / 1000.0).ceil();
        frames.max(1.0) as u32
    }
}

/// Filtering state for one hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    /// No detection in flight; ready for new input.
    Idle,
    /// Accumulating evidence in the stability buffer.
    Detecting,
    /// Refractory period after an emission; input is ignored.
    Cooldown,
}

/// Per-hand filter promoting raw detections to discrete events.
pub struct HandStateMachine {
    hand_id: HandId,
    config: StateMachineConfig,
    state: FilterState,
    buffer: VecDeque<RawDetection>,
    cooldown_deadline_ms: i64,
    cooldown_entered_ms: i64,
    /// Frames spent in the current cooldown; decides expiry if the
    /// wall-clock regresses below the entry time.
    cooldown_frame_count: u32,
    last_emit: Option<(GestureLabel, i64)>,
}

impl HandStateMachine {
    /// Create a state machine for one hand.
    #[must_use]
    pub fn new(hand_id: HandId, config: StateMachineConfig) -> Self {
        Self {
            hand_id,
            config,
            state: FilterState::Idle,
            buffer: VecDeque::new(),
            cooldown_deadline_ms: 0,
            cooldown_entered_ms: 0,
            cooldown_frame_count: 0,
            last_emit: None,
        }
    }

    /// Current filter state.
    #[must_use]
    pub fn state(&self) -> FilterState {
        self.state
    }

    /// Feed one frame of classifier output.
    ///
    /// `now_ms` is the frame's wall-clock time in milliseconds since epoch;
    /// it is supplied by the caller so the whole pipeline shares one
    /// timestamp per frame.
    pub fn update(&mut self, input: Option<RawDetection>, now_ms: i64) -> Option<GestureEvent> {
        // Continuous gestures bypass stability and cooldown entirely. This
        // is the only path that may emit more than once per refractory
        // window.
        if let Some(det) = input {
            if det.label.emit_policy() == EmitPolicy::Continuous {
                return Some(self.event_from(&det, det.confidence, now_ms));
            }
        }

        if self.state == FilterState::Cooldown {
            if self.cooldown_expired(now_ms) {
                trace!(hand_id = %self.hand_id, "cooldown expired, returning to idle");
                self.state = FilterState::Idle;
                self.buffer.clear();
            } else {
                self.cooldown_frame_count = self.cooldown_frame_count.saturating_add(1);
                // One-shot gestures stay responsive through the refractory
                // period; everything else is ignored until it expires.
                let one_shot = matches!(
                    input,
                    Some(det) if det.label.emit_policy() == EmitPolicy::Immediate
                );
                if !one_shot {
                    return None;
                }
            }
        }

        let Some(det) = input else {
            if self.state != FilterState::Idle {
                trace!(hand_id = %self.hand_id, "no detection, resetting to idle");
                self.state = FilterState::Idle;
                self.buffer.clear();
            }
            return None;
        };

        if self.buffer.len() == self.config.stability_frames {
            self.buffer.pop_front();
        }
        self.buffer.push_back(det);
        self.state = FilterState::Detecting;

        let required = match det.label.emit_policy() {
            EmitPolicy::Immediate => 1,
            _ => self.config.stability_frames,
        };

        if self.buffer.len() < required {
            return None;
        }
        let stable = self
            .buffer
            .iter()
            .rev()
            .take(required)
            .all(|d| d.label == det.label);
        if !stable {
            return None;
        }

        if det.label.emit_policy() == EmitPolicy::Stable
            && !self.config.allow_same_gesture_repeat
        {
            if let Some((last_label, last_ms)) = self.last_emit {
                if last_label == det.label && now_ms < last_ms + self.config.lockout_ms() {
                    trace!(hand_id = %self.hand_id, gesture = %det.label, "same-gesture lockout");
                    return None;
                }
            }
        }

        let mean = self
            .buffer
            .iter()
            .rev()
            .take(required)
            .map(|d| d.confidence.value())
            .sum::<f32>()
            / required as f32;
        let event = self.event_from(&det, Confidence::clamped(mean), now_ms);

        debug!(
            hand_id = %self.hand_id,
            gesture = %det.label,
            confidence = event.confidence.value(),
            "gesture promoted"
        );

        self.state = FilterState::Cooldown;
        self.cooldown_deadline_ms = now_ms + self.config.cooldown_ms;
        self.cooldown_entered_ms = now_ms;
        self.cooldown_frame_count = 0;
        if det.label.emit_policy() == EmitPolicy::Stable {
            self.last_emit = Some((det.label, now_ms));
        }
        self.buffer.clear();

        Some(event)
    }

    /// Reset to the initial state, forgetting the emission history.
    pub fn reset(&mut self) {
        self.state = FilterState::Idle;
        self.buffer.clear();
        self.cooldown_deadline_ms = 0;
        self.cooldown_entered_ms = 0;
        self.cooldown_frame_count = 0;
        self.last_emit = None;
    }

    fn cooldown_expired(&self, now_ms: i64) -> bool {
        if now_ms >= self.cooldown_deadline_ms {
            return true;
        }
        // Clock went backwards: fall back to counting frames at the
        // configured rate.
        now_ms < self.cooldown_entered_ms
            && self.cooldown_frame_count >= self.config.cooldown_frames()
    }

    fn event_from(&self, det: &RawDetection, confidence: Confidence, now_ms: i64) -> GestureEvent {
        GestureEvent {
            label: det.label,
            confidence,
            hand_id: self.hand_id,
            timestamp_ms: now_ms,
            metadata: det.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gesture_vision_core::DetectionMetadata;

    const FRAME_MS: i64 = 33;

    fn metadata() -> DetectionMetadata {
        DetectionMetadata {
            hand_center: [0.5, 0.5],
            hand_size: 0.2,
            wrist_z: 0.0,
            fingers_extended: 4,
        }
    }

    fn det(label: GestureLabel) -> RawDetection {
        RawDetection::new(label, Confidence::clamped(0.9), metadata())
    }

    fn machine() -> HandStateMachine {
        HandStateMachine::new(HandId::all()[0], StateMachineConfig::default())
    }

    /// Drive `frames` identical detections, returning emission frame indexes.
    fn run(
        sm: &mut HandStateMachine,
        label: GestureLabel,
        frames: usize,
        start_ms: i64,
    ) -> Vec<usize> {
        (0..frames)
            .filter_map(|i| {
                sm.update(Some(det(label)), start_ms + i as i64 * FRAME_MS)
                    .map(|_| i + 1)
            })
            .collect()
    }

    #[test]
    fn test_stable_palm_emits_once_at_window() {
        // Scenario: seven OPEN_PALM frames emit exactly once, at frame 5.
        let mut sm = machine();
        let emitted = run(&mut sm, GestureLabel::OpenPalm, 7, 0);
        assert_eq!(emitted, vec![5]);
        assert_eq!(sm.state(), FilterState::Cooldown);
    }

    #[test]
    fn test_unstable_mix_never_emits() {
        let mut sm = machine();
        let labels = [
            GestureLabel::OpenPalm,
            GestureLabel::OpenPalm,
            GestureLabel::ClosedFist,
            GestureLabel::OpenPalm,
            GestureLabel::OpenPalm,
        ];
        for (i, label) in labels.iter().enumerate() {
            assert!(sm.update(Some(det(*label)), i as i64 * FRAME_MS).is_none());
        }
        assert_eq!(sm.state(), FilterState::Detecting);
    }

    #[test]
    fn test_cooldown_suppresses_reemission() {
        // Ten stable frames: exactly one event, and nothing for the rest of
        // the cooldown window.
        let mut sm = machine();
        let emitted = run(&mut sm, GestureLabel::OpenPalm, 10, 0);
        assert_eq!(emitted, vec![5]);
    }

    #[test]
    fn test_reemission_after_cooldown_window() {
        let mut sm = machine();
        // Hold the palm for 60 frames (~2 s at 30 FPS).
        let emitted = run(&mut sm, GestureLabel::OpenPalm, 60, 0);
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0], 5);
        // Second emission needs cooldown expiry, lockout expiry, and a
        // fresh stability window.
        let gap_ms = (emitted[1] - emitted[0]) as i64 * FRAME_MS;
        assert!(gap_ms >= 1000, "second emit only {gap_ms} ms after first");
    }

    #[test]
    fn test_none_input_resets_buffer() {
        let mut sm = machine();
        for i in 0..4 {
            sm.update(Some(det(GestureLabel::OpenPalm)), i * FRAME_MS);
        }
        sm.update(None, 4 * FRAME_MS);
        assert_eq!(sm.state(), FilterState::Idle);

        // The four pre-gap frames must not count toward stability.
        for i in 5..9 {
            assert!(sm.update(Some(det(GestureLabel::OpenPalm)), i * FRAME_MS).is_none());
        }
        assert!(sm
            .update(Some(det(GestureLabel::OpenPalm)), 9 * FRAME_MS)
            .is_some());
    }

    #[test]
    fn test_gesture_switch_restarts_stability() {
        let mut sm = machine();
        for i in 0..4 {
            sm.update(Some(det(GestureLabel::OpenPalm)), i * FRAME_MS);
        }
        // Switch to fist: needs five fist frames of its own.
        for i in 4..8 {
            assert!(sm.update(Some(det(GestureLabel::ClosedFist)), i * FRAME_MS).is_none());
        }
        let event = sm
            .update(Some(det(GestureLabel::ClosedFist)), 8 * FRAME_MS)
            .expect("fifth consecutive fist frame should emit");
        assert_eq!(event.label, GestureLabel::ClosedFist);
    }

    #[test]
    fn test_mean_confidence_over_window() {
        let mut sm = machine();
        let confidences = [0.6, 0.7, 0.8, 0.9, 1.0];
        let mut event = None;
        for (i, c) in confidences.iter().enumerate() {
            let d = RawDetection::new(
                GestureLabel::OpenPalm,
                Confidence::clamped(*c),
                metadata(),
            );
            event = sm.update(Some(d), i as i64 * FRAME_MS);
        }
        let event = event.expect("window full");
        assert!((event.confidence.value() - 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_pinch_start_is_immediate() {
        let mut sm = machine();
        let event = sm.update(Some(det(GestureLabel::PinchStart)), 0);
        assert!(event.is_some(), "pinch start must not wait for stability");
    }

    #[test]
    fn test_pinch_end_follows_start_without_refractory_gap() {
        let mut sm = machine();
        assert!(sm.update(Some(det(GestureLabel::PinchStart)), 0).is_some());
        assert!(sm.update(Some(det(GestureLabel::PinchHold)), FRAME_MS).is_some());
        let end = sm.update(Some(det(GestureLabel::PinchEnd)), 2 * FRAME_MS);
        assert!(end.is_some(), "pinch end two frames after start must emit");
    }

    #[test]
    fn test_pinch_hold_emits_every_frame() {
        let mut sm = machine();
        for i in 0..20 {
            let event = sm.update(Some(det(GestureLabel::PinchHold)), i * FRAME_MS);
            assert!(event.is_some(), "frame {i} should re-emit the hold");
        }
    }

    #[test]
    fn test_pinch_hold_emits_during_cooldown() {
        let mut sm = machine();
        run(&mut sm, GestureLabel::OpenPalm, 5, 0);
        assert_eq!(sm.state(), FilterState::Cooldown);
        let event = sm.update(Some(det(GestureLabel::PinchHold)), 6 * FRAME_MS);
        assert!(event.is_some());
        assert_eq!(sm.state(), FilterState::Cooldown, "cooldown untouched");
    }

    #[test]
    fn test_swipe_emits_during_cooldown_and_rearms_it() {
        let mut sm = machine();
        run(&mut sm, GestureLabel::OpenPalm, 5, 0);
        assert_eq!(sm.state(), FilterState::Cooldown);

        // A swipe lands mid-cooldown: it must not be swallowed.
        let event = sm.update(Some(det(GestureLabel::SwipeRight)), 6 * FRAME_MS);
        assert_eq!(event.map(|e| e.label), Some(GestureLabel::SwipeRight));
        assert_eq!(sm.state(), FilterState::Cooldown);

        // The swipe opened a fresh refractory window for stable gestures.
        for i in 7..30 {
            assert!(sm.update(Some(det(GestureLabel::ClosedFist)), i * FRAME_MS).is_none());
        }
    }

    #[test]
    fn test_stable_gesture_ignored_during_cooldown() {
        let mut sm = machine();
        run(&mut sm, GestureLabel::OpenPalm, 5, 0);
        for i in 5..15 {
            assert!(sm.update(Some(det(GestureLabel::ClosedFist)), i * FRAME_MS).is_none());
        }
    }

    #[test]
    fn test_same_gesture_lockout_outlasts_cooldown() {
        let config = StateMachineConfig {
            cooldown_ms: 100,
            same_gesture_lockout_ms: Some(10_000),
            ..StateMachineConfig::default()
        };
        let mut sm = HandStateMachine::new(HandId::all()[0], config);
        let emitted = run(&mut sm, GestureLabel::OpenPalm, 60, 0);
        assert_eq!(emitted, vec![5], "lockout blocks the repeat after cooldown");

        // A different gesture is not locked out.
        let emitted = run(&mut sm, GestureLabel::ClosedFist, 5, 60 * FRAME_MS);
        assert_eq!(emitted.len(), 1);
    }

    #[test]
    fn test_allow_same_gesture_repeat() {
        let config = StateMachineConfig {
            allow_same_gesture_repeat: true,
            ..StateMachineConfig::default()
        };
        let mut sm = HandStateMachine::new(HandId::all()[0], config);
        let emitted = run(&mut sm, GestureLabel::OpenPalm, 60, 0);
        assert_eq!(emitted.len(), 2, "repeat allowed once cooldown expires");
    }

    #[test]
    fn test_clock_regression_falls_back_to_frame_count() {
        let mut sm = machine();
        run(&mut sm, GestureLabel::OpenPalm, 5, 1_000_000);
        assert_eq!(sm.state(), FilterState::Cooldown);

        // Clock jumps backwards; the deadline is now unreachable. The
        // frame-count fallback (30 frames at 30 FPS) must expire instead.
        let mut emitted = 0;
        for i in 0..40 {
            if sm.update(Some(det(GestureLabel::ClosedFist)), i * FRAME_MS).is_some() {
                emitted += 1;
            }
        }
        assert_eq!(emitted, 1, "cooldown must expire via frame counting");
    }

    #[test]
    fn test_reset_clears_lockout() {
        let mut sm = machine();
        run(&mut sm, GestureLabel::OpenPalm, 5, 0);
        sm.reset();
        assert_eq!(sm.state(), FilterState::Idle);
        // Immediately stable again from scratch.
        let emitted = run(&mut sm, GestureLabel::OpenPalm, 5, 6 * FRAME_MS);
        assert_eq!(emitted.len(), 1, "reset must clear cooldown and lockout");
    }

    #[test]
    fn test_event_carries_latest_metadata() {
        let mut sm = machine();
        let mut event = None;
        for i in 0..5 {
            let mut m = metadata();
            m.hand_center[0] = 0.1 * i as f32;
            let d = RawDetection::new(GestureLabel::OpenPalm, Confidence::clamped(0.9), m);
            event = sm.update(Some(d), i * FRAME_MS);
        }
        let event = event.expect("window full");
        assert!((event.metadata.hand_center[0] - 0.4).abs() < 1e-6);
    }
}
