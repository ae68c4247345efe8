//! Landmark intake: stable hand identity assignment and retirement.
//!
//! Observations arrive from the extractor in arbitrary order with no
//! guaranteed identity. Intake maps each one to a stable [`HandId`] so that
//! downstream per-hand state (history rings, state machines) follows the
//! same physical hand across frames.
//!
//! Matching policy, in priority order:
//! 1. the extractor's own tracking id, when it provides one;
//! 2. nearest active hand by wrist distance, within a threshold;
//! 3. otherwise the lowest free slot.
//!
//! A slot is retired after `miss_frames_to_retire` consecutive frames
//! without a matching observation.

use serde::Deserialize;
use tracing::debug;

use gesture_vision_core::{HandId, HandObservation, MAX_HANDS};

/// Configuration for hand identity assignment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Maximum hands tracked simultaneously (1 or 2)
    pub max_hands: usize,
    /// Wrist-distance threshold for matching an observation to an active
    /// hand, in normalized coordinates
    pub match_distance: f32,
    /// Consecutive unobserved frames before a hand identity is retired
    pub miss_frames_to_retire: u32,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_hands: MAX_HANDS,
            match_distance: 0.15,
            miss_frames_to_retire: 10,
        }
    }
}

/// Per-slot tracking state.
#[derive(Debug, Clone)]
struct TrackSlot {
    /// Extractor tracking id last seen for this hand, if any.
    tracking_id: Option<u32>,
    /// Wrist position from the most recent matched observation.
    last_wrist: [f32; 2],
    /// Consecutive frames without a matching observation.
    misses: u32,
}

/// Result of one intake frame.
#[derive(Debug, Default)]
pub struct FrameAssignment {
    /// Observations paired with their stable identities, in id order.
    pub assigned: Vec<(HandId, HandObservation)>,
    /// Identities retired this frame; their per-hand state must be torn down.
    pub retired: Vec<HandId>,
}

/// Assigns stable [`HandId`]s to incoming observations and drives per-hand
/// state creation and retirement.
pub struct HandIntake {
    config: IntakeConfig,
    slots: [Option<TrackSlot>; MAX_HANDS],
}

impl HandIntake {
    /// Create an intake stage with the provided configuration.
    #[must_use]
    pub fn new(config: IntakeConfig) -> Self {
        Self {
            config,
            slots: [None, None],
        }
    }

    /// Create an intake stage with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(IntakeConfig::default())
    }

    /// Process one frame of observations.
    ///
    /// Surplus observations beyond `max_hands` are discarded silently,
    /// keeping those with the highest tracker score.
    pub fn begin_frame(&mut self, mut observations: Vec<HandObservation>) -> FrameAssignment {
        if observations.len() > self.config.max_hands {
            observations.sort_by(|a, b| {
                b.score
                    .value()
                    .partial_cmp(&a.score.value())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            observations.truncate(self.config.max_hands);
        }

        let mut matched_slots = [false; MAX_HANDS];
        let mut pairs: Vec<(usize, HandObservation)> = Vec::with_capacity(observations.len());
        let mut unmatched: Vec<HandObservation> = Vec::new();

        // Pass 1: honor the extractor's tracking id when it provides one.
        for obs in observations {
            match obs
                .tracking_id
                .and_then(|tid| self.slot_with_tracking_id(tid, &matched_slots))
            {
                Some(idx) => {
                    matched_slots[idx] = true;
                    pairs.push((idx, obs));
                }
                None => unmatched.push(obs),
            }
        }

        // Pass 2: nearest-wrist matching, closest pair first so two hands
        // crossing paths cannot steal each other's slot.
        while !unmatched.is_empty() {
            let mut best: Option<(usize, usize, f32)> = None;
            for (obs_idx, obs) in unmatched.iter().enumerate() {
                let wrist = obs.wrist();
                for (slot_idx, slot) in self.slots.iter().enumerate() {
                    if matched_slots[slot_idx] || slot_idx >= self.config.max_hands {
                        continue;
                    }
                    let Some(slot) = slot else { continue };
                    let dx = wrist.x - slot.last_wrist[0];
                    let dy = wrist.y - slot.last_wrist[1];
                    let dist = (dx * dx + dy * dy).sqrt();
                    if dist <= self.config.match_distance
                        && best.map_or(true, |(_, _, d)| dist < d)
                    {
                        best = Some((obs_idx, slot_idx, dist));
                    }
                }
            }
            let Some((obs_idx, slot_idx, _)) = best else { break };
            matched_slots[slot_idx] = true;
            pairs.push((slot_idx, unmatched.swap_remove(obs_idx)));
        }

        // Pass 3: allocate the lowest free slot for anything left over.
        for obs in unmatched {
            let free = (0..self.config.max_hands)
                .find(|&idx| self.slots[idx].is_none() && !matched_slots[idx]);
            if let Some(idx) = free {
                matched_slots[idx] = true;
                debug!(hand_id = idx, "new hand identity allocated");
                pairs.push((idx, obs));
            }
        }

        // Update matched slots, age the rest, retire the expired.
        let mut retired = Vec::new();
        for (idx, slot_opt) in self.slots.iter_mut().enumerate() {
            if matched_slots[idx] {
                continue;
            }
            if let Some(slot) = slot_opt {
                slot.misses += 1;
                if slot.misses >= self.config.miss_frames_to_retire {
                    debug!(hand_id = idx, misses = slot.misses, "hand identity retired");
                    *slot_opt = None;
                    retired.push(HandId::all()[idx]);
                }
            }
        }
        for (idx, obs) in &pairs {
            let wrist = obs.wrist();
            self.slots[*idx] = Some(TrackSlot {
                tracking_id: obs.tracking_id,
                last_wrist: [wrist.x, wrist.y],
                misses: 0,
            });
        }

        pairs.sort_by_key(|(idx, _)| *idx);
        let assigned = pairs
            .into_iter()
            .map(|(idx, obs)| (HandId::all()[idx], obs))
            .collect();

        FrameAssignment { assigned, retired }
    }

    /// Number of currently active hand identities.
    #[must_use]
    pub fn active_hands(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Forget all identities; the next frame starts from scratch.
    pub fn reset(&mut self) {
        self.slots = [None, None];
    }

    fn slot_with_tracking_id(&self, tid: u32, matched: &[bool; MAX_HANDS]) -> Option<usize> {
        self.slots.iter().enumerate().find_map(|(idx, slot)| {
            let slot = slot.as_ref()?;
            (!matched[idx] && slot.tracking_id == Some(tid)).then_some(idx)
        })
    }
}
