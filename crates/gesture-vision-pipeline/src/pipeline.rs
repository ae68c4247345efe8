//! The gesture pipeline façade.
//!
//! [`GesturePipeline`] wires intake, classifier, and per-hand state
//! machines together and owns every piece of per-hand state. It is driven
//! by exactly one caller (the vision loop) with one `process_frame` call
//! per camera frame; nothing in here locks or suspends.

use serde::Deserialize;
use tracing::debug;

use gesture_vision_core::{GestureEvent, HandId, HandObservation, RawDetection, MAX_HANDS};

use crate::classifier::{ClassifierConfig, GestureClassifier, HandHistory};
use crate::intake::{HandIntake, IntakeConfig};
use crate::state_machine::{HandStateMachine, StateMachineConfig};

/// Configuration for the complete pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Intake / identity assignment settings
    pub intake: IntakeConfig,
    /// Classifier thresholds
    pub classifier: ClassifierConfig,
    /// Temporal filter settings
    pub state_machine: StateMachineConfig,
}

/// Per-hand state bundle, created and destroyed with the hand identity.
struct HandSlot {
    history: HandHistory,
    machine: HandStateMachine,
}

impl HandSlot {
    fn new(hand_id: HandId, config: StateMachineConfig) -> Self {
        Self {
            history: HandHistory::new(),
            machine: HandStateMachine::new(hand_id, config),
        }
    }
}

/// Per-frame transformation of hand observations into gesture events.
pub struct GesturePipeline {
    intake: HandIntake,
    classifier: GestureClassifier,
    machine_config: StateMachineConfig,
    slots: [Option<HandSlot>; MAX_HANDS],
}

impl GesturePipeline {
    /// Create a pipeline with the provided configuration.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            intake: HandIntake::new(config.intake),
            classifier: GestureClassifier::new(config.classifier),
            machine_config: config.state_machine,
            slots: [None, None],
        }
    }

    /// Create a pipeline with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(PipelineConfig::default())
    }

    /// Process one frame of observations from the landmark extractor.
    ///
    /// `now_ms` is the frame's wall-clock time in milliseconds since epoch;
    /// every event emitted for this frame carries it. Events are returned
    /// in hand-id order, which defines the global emit order.
    pub fn process_frame(
        &mut self,
        observations: Vec<HandObservation>,
        now_ms: i64,
    ) -> Vec<GestureEvent> {
        let frame = self.intake.begin_frame(observations);

        for id in &frame.retired {
            self.slots[id.as_index()] = None;
        }

        let mut inputs: [Option<RawDetection>; MAX_HANDS] = [None, None];
        let mut observed = [false; MAX_HANDS];
        let machine_config = self.machine_config.clone();

        for (id, obs) in frame.assigned {
            let idx = id.as_index();
            let slot = self.slots[idx]
                .get_or_insert_with(|| HandSlot::new(id, machine_config.clone()));
            inputs[idx] = self.classifier.classify(&mut slot.history, &obs, now_ms);
            observed[idx] = true;
        }

        let mut events = Vec::new();
        for idx in 0..MAX_HANDS {
            if let Some(slot) = &mut self.slots[idx] {
                // Active hands missing from this frame feed the filter a
                // blank input, which resets its stability buffer.
                let input = if observed[idx] { inputs[idx] } else { None };
                if let Some(event) = slot.machine.update(input, now_ms) {
                    events.push(event);
                }
            }
        }
        events
    }

    /// Atomically reset all per-hand state: identities, history rings,
    /// pinch bits, and state machines. The next frame behaves exactly like
    /// the first frame after startup.
    pub fn reset(&mut self) {
        debug!("gesture history cleared");
        self.intake.reset();
        self.slots = [None, None];
    }

    /// Number of currently tracked hands, for status reporting.
    #[must_use]
    pub fn active_hands(&self) -> usize {
        self.intake.active_hands()
    }
}
