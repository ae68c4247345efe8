//! Core data types for the gesture-vision system.
//!
//! This module defines the fundamental data structures used throughout the
//! gesture recognition pipeline and broadcast server.
//!
//! # Type Categories
//!
//! - **Landmark Types**: [`Landmark`], [`HandLandmark`], [`HandObservation`]
//! - **Identity Types**: [`HandId`], [`Handedness`]
//! - **Detection Types**: [`RawDetection`], [`DetectionMetadata`], [`GestureEvent`]
//! - **Label Model**: [`GestureLabel`], [`EmitPolicy`]
//! - **Common Types**: [`Confidence`]

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::{LANDMARK_COUNT, MAX_HANDS};

// =============================================================================
// Common Types
// =============================================================================

/// Confidence score in the range [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Confidence(f32);

impl Confidence {
    /// Creates a new confidence value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not in the range [0.0, 1.0].
    pub fn new(value: f32) -> CoreResult<Self> {
        if !(0.0..=1.0).contains(&value) {
            return Err(CoreError::validation(format!(
                "Confidence must be in [0.0, 1.0], got {value}"
            )));
        }
        Ok(Self(value))
    }

    /// Creates a confidence value, clamping out-of-range input into [0.0, 1.0].
    ///
    /// Non-finite input clamps to 0.0.
    #[must_use]
    pub fn clamped(value: f32) -> Self {
        if value.is_finite() {
            Self(value.clamp(0.0, 1.0))
        } else {
            Self(0.0)
        }
    }

    /// Returns the raw confidence value.
    #[must_use]
    pub fn value(&self) -> f32 {
        self.0
    }

    /// Maximum confidence (1.0).
    pub const MAX: Self = Self(1.0);

    /// Minimum confidence (0.0).
    pub const MIN: Self = Self(0.0);
}

impl Default for Confidence {
    fn default() -> Self {
        Self(0.0)
    }
}

/// Returns the current wall-clock time as milliseconds since the Unix epoch.
#[must_use]
pub fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

// =============================================================================
// Landmark Types
// =============================================================================

/// A single hand landmark in image-normalized coordinates.
///
/// `x` and `y` lie in [0, 1] relative to image width/height; `z` is a
/// dimensionless depth estimate where smaller (more negative) means closer
/// to the camera.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    /// Horizontal position, normalized to [0, 1]
    pub x: f32,
    /// Vertical position, normalized to [0, 1] (y grows downward)
    pub y: f32,
    /// Depth estimate (negative = closer to camera)
    pub z: f32,
}

impl Landmark {
    /// Creates a new landmark.
    #[must_use]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Calculates the 3-D Euclidean distance to another landmark.
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dz.mul_add(dz, dx.mul_add(dx, dy * dy)).sqrt()
    }

    /// Returns `true` if the landmark is usable: all components finite and
    /// x, y within the normalized image frame.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.z.is_finite()
            && (0.0..=1.0).contains(&self.x)
            && (0.0..=1.0).contains(&self.y)
    }
}

/// The 21 hand landmarks of the canonical layout reported by the extractor.
///
/// Index order is fixed: wrist, then four thumb joints, then four joints per
/// finger from index to pinky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum HandLandmark {
    /// Wrist
    Wrist = 0,
    /// Thumb carpometacarpal joint
    ThumbCmc = 1,
    /// Thumb metacarpophalangeal joint
    ThumbMcp = 2,
    /// Thumb interphalangeal joint
    ThumbIp = 3,
    /// Thumb tip
    ThumbTip = 4,
    /// Index finger metacarpophalangeal joint
    IndexMcp = 5,
    /// Index finger proximal interphalangeal joint
    IndexPip = 6,
    /// Index finger distal interphalangeal joint
    IndexDip = 7,
    /// Index finger tip
    IndexTip = 8,
    /// Middle finger metacarpophalangeal joint
    MiddleMcp = 9,
    /// Middle finger proximal interphalangeal joint
    MiddlePip = 10,
    /// Middle finger distal interphalangeal joint
    MiddleDip = 11,
    /// Middle finger tip
    MiddleTip = 12,
    /// Ring finger metacarpophalangeal joint
    RingMcp = 13,
    /// Ring finger proximal interphalangeal joint
    RingPip = 14,
    /// Ring finger distal interphalangeal joint
    RingDip = 15,
    /// Ring finger tip
    RingTip = 16,
    /// Pinky metacarpophalangeal joint
    PinkyMcp = 17,
    /// Pinky proximal interphalangeal joint
    PinkyPip = 18,
    /// Pinky distal interphalangeal joint
    PinkyDip = 19,
    /// Pinky tip
    PinkyTip = 20,
}

impl HandLandmark {
    /// Converts the landmark enum to its array index (0-20).
    #[must_use]
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Returns the landmark name as a string.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Wrist => "wrist",
            Self::ThumbCmc => "thumb_cmc",
            Self::ThumbMcp => "thumb_mcp",
            Self::ThumbIp => "thumb_ip",
            Self::ThumbTip => "thumb_tip",
            Self::IndexMcp => "index_mcp",
            Self::IndexPip => "index_pip",
            Self::IndexDip => "index_dip",
            Self::IndexTip => "index_tip",
            Self::MiddleMcp => "middle_mcp",
            Self::MiddlePip => "middle_pip",
            Self::MiddleDip => "middle_dip",
            Self::MiddleTip => "middle_tip",
            Self::RingMcp => "ring_mcp",
            Self::RingPip => "ring_pip",
            Self::RingDip => "ring_dip",
            Self::RingTip => "ring_tip",
            Self::PinkyMcp => "pinky_mcp",
            Self::PinkyPip => "pinky_pip",
            Self::PinkyDip => "pinky_dip",
            Self::PinkyTip => "pinky_tip",
        }
    }

    /// All five fingertips, thumb first.
    pub const FINGERTIPS: [Self; 5] = [
        Self::ThumbTip,
        Self::IndexTip,
        Self::MiddleTip,
        Self::RingTip,
        Self::PinkyTip,
    ];

    /// The four non-thumb (tip, pip) joint pairs used for finger-extension
    /// checks, index to pinky.
    pub const FINGER_TIP_PIP_PAIRS: [(Self, Self); 4] = [
        (Self::IndexTip, Self::IndexPip),
        (Self::MiddleTip, Self::MiddlePip),
        (Self::RingTip, Self::RingPip),
        (Self::PinkyTip, Self::PinkyPip),
    ];

    /// Wrist plus the four non-thumb MCP joints defining the palm region.
    pub const PALM_LANDMARKS: [Self; 5] = [
        Self::Wrist,
        Self::IndexMcp,
        Self::MiddleMcp,
        Self::RingMcp,
        Self::PinkyMcp,
    ];
}

impl TryFrom<u8> for HandLandmark {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Wrist),
            1 => Ok(Self::ThumbCmc),
            2 => Ok(Self::ThumbMcp),
            3 => Ok(Self::ThumbIp),
            4 => Ok(Self::ThumbTip),
            5 => Ok(Self::IndexMcp),
            6 => Ok(Self::IndexPip),
            7 => Ok(Self::IndexDip),
            8 => Ok(Self::IndexTip),
            9 => Ok(Self::MiddleMcp),
            10 => Ok(Self::MiddlePip),
            11 => Ok(Self::MiddleDip),
            12 => Ok(Self::MiddleTip),
            13 => Ok(Self::RingMcp),
            14 => Ok(Self::RingPip),
            15 => Ok(Self::RingDip),
            16 => Ok(Self::RingTip),
            17 => Ok(Self::PinkyMcp),
            18 => Ok(Self::PinkyPip),
            19 => Ok(Self::PinkyDip),
            20 => Ok(Self::PinkyTip),
            _ => Err(CoreError::validation(format!(
                "Invalid hand landmark index: {value}"
            ))),
        }
    }
}

/// Which hand the extractor believes an observation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Handedness {
    /// Left hand
    Left,
    /// Right hand
    Right,
}

impl Handedness {
    /// Returns the handedness label as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "Left",
            Self::Right => "Right",
        }
    }
}

/// One frame's worth of landmark data for a single detected hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandObservation {
    /// The 21 landmarks in canonical index order
    pub landmarks: [Landmark; LANDMARK_COUNT],
    /// Which hand the extractor believes this is
    pub handedness: Handedness,
    /// Extractor tracking score
    pub score: Confidence,
    /// Extractor-provided tracking identity, if it supplies one
    pub tracking_id: Option<u32>,
}

impl HandObservation {
    /// Creates an observation from a landmark list.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the list does not contain exactly 21
    /// landmarks.
    pub fn from_landmarks(
        landmarks: Vec<Landmark>,
        handedness: Handedness,
        score: Confidence,
    ) -> CoreResult<Self> {
        let landmarks: [Landmark; LANDMARK_COUNT] = landmarks.try_into().map_err(
            |v: Vec<Landmark>| {
                CoreError::validation(format!(
                    "expected {LANDMARK_COUNT} landmarks, got {}",
                    v.len()
                ))
            },
        )?;
        Ok(Self {
            landmarks,
            handedness,
            score,
            tracking_id: None,
        })
    }

    /// Sets the extractor tracking identity.
    #[must_use]
    pub fn with_tracking_id(mut self, id: u32) -> Self {
        self.tracking_id = Some(id);
        self
    }

    /// Gets a landmark by its semantic name.
    #[must_use]
    pub fn get(&self, landmark: HandLandmark) -> &Landmark {
        &self.landmarks[landmark.index()]
    }

    /// Returns `true` if every landmark is finite and within the image frame.
    ///
    /// Frames failing this check are classified as "no detection" while
    /// still advancing temporal history.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.landmarks.iter().all(Landmark::is_valid)
    }

    /// The wrist landmark, used as the anchor for identity matching.
    #[must_use]
    pub fn wrist(&self) -> &Landmark {
        self.get(HandLandmark::Wrist)
    }
}

// =============================================================================
// Identity Types
// =============================================================================

/// Stable small-integer identity for one hand across consecutive frames.
///
/// At most [`MAX_HANDS`] identities are live at any time; intake allocates
/// the lowest free slot and retires identities after consecutive misses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandId(u8);

impl HandId {
    /// Creates a hand identity from a slot index.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the index is not below [`MAX_HANDS`].
    pub fn from_index(index: usize) -> CoreResult<Self> {
        if index >= MAX_HANDS {
            return Err(CoreError::validation(format!(
                "hand index {index} out of range (max {MAX_HANDS})"
            )));
        }
        Ok(Self(index as u8))
    }

    /// Returns the identity as an arena slot index.
    #[must_use]
    pub fn as_index(&self) -> usize {
        usize::from(self.0)
    }

    /// All identities in slot order.
    #[must_use]
    pub fn all() -> [Self; MAX_HANDS] {
        [Self(0), Self(1)]
    }
}

impl std::fmt::Display for HandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Label Model
// =============================================================================

/// The recognizable gesture labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GestureLabel {
    /// Open palm held toward the camera
    OpenPalm,
    /// Closed fist
    ClosedFist,
    /// Lateral movement to the left
    SwipeLeft,
    /// Lateral movement to the right
    SwipeRight,
    /// Vertical movement upward (decreasing y)
    SwipeUp,
    /// Vertical movement downward
    SwipeDown,
    /// Thumb and index tips just came together
    PinchStart,
    /// Thumb and index tips held together
    PinchHold,
    /// Thumb and index tips just separated
    PinchEnd,
    /// Hand moving toward the camera
    PushForward,
}

impl GestureLabel {
    /// Returns the wire label string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenPalm => "OPEN_PALM",
            Self::ClosedFist => "CLOSED_FIST",
            Self::SwipeLeft => "SWIPE_LEFT",
            Self::SwipeRight => "SWIPE_RIGHT",
            Self::SwipeUp => "SWIPE_UP",
            Self::SwipeDown => "SWIPE_DOWN",
            Self::PinchStart => "PINCH_START",
            Self::PinchHold => "PINCH_HOLD",
            Self::PinchEnd => "PINCH_END",
            Self::PushForward => "PUSH_FORWARD",
        }
    }

    /// Returns all labels.
    #[must_use]
    pub fn all() -> &'static [Self; 10] {
        &[
            Self::OpenPalm,
            Self::ClosedFist,
            Self::SwipeLeft,
            Self::SwipeRight,
            Self::SwipeUp,
            Self::SwipeDown,
            Self::PinchStart,
            Self::PinchHold,
            Self::PinchEnd,
            Self::PushForward,
        ]
    }

    /// How the per-hand state machine promotes detections of this label.
    ///
    /// The policy is keyed by gesture category. Continuous gestures re-emit
    /// every frame. One-shot gestures — pinch edges debounced by hysteresis,
    /// swipes and pushes already integrated over a motion window that is
    /// consumed on detection — emit the frame they are reported. Static
    /// poses are noisy per-frame reads and go through the stability window.
    #[must_use]
    pub fn emit_policy(&self) -> EmitPolicy {
        match self {
            Self::PinchHold => EmitPolicy::Continuous,
            Self::PinchStart
            | Self::PinchEnd
            | Self::SwipeLeft
            | Self::SwipeRight
            | Self::SwipeUp
            | Self::SwipeDown
            | Self::PushForward => EmitPolicy::Immediate,
            Self::OpenPalm | Self::ClosedFist => EmitPolicy::Stable,
        }
    }
}

impl std::fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Promotion policy applied by the per-hand state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmitPolicy {
    /// Requires the full stability window and honors cooldown.
    Stable,
    /// Emits on the first frame, then honors cooldown.
    Immediate,
    /// Emits on every frame it is reported; bypasses stability and cooldown.
    Continuous,
}

// =============================================================================
// Detection Types
// =============================================================================

/// Geometry snapshot attached to every detection, consumed downstream for
/// visual effects and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionMetadata {
    /// Mean of all 21 landmark positions (x, y)
    pub hand_center: [f32; 2],
    /// Wrist to middle-MCP distance, the scale reference
    pub hand_size: f32,
    /// Depth of the wrist landmark
    pub wrist_z: f32,
    /// Number of extended non-thumb fingers
    pub fingers_extended: u8,
}

/// A single per-frame, per-hand classifier output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    /// Detected gesture label
    pub label: GestureLabel,
    /// Heuristic confidence
    pub confidence: Confidence,
    /// Geometry snapshot at detection time
    pub metadata: DetectionMetadata,
}

impl RawDetection {
    /// Creates a new raw detection.
    #[must_use]
    pub fn new(label: GestureLabel, confidence: Confidence, metadata: DetectionMetadata) -> Self {
        Self {
            label,
            confidence,
            metadata,
        }
    }
}

/// A filtered, discrete gesture event ready for broadcast.
///
/// Emitted at most once per stability completion (except continuous
/// gestures); immutable after emit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GestureEvent {
    /// The promoted gesture label
    pub label: GestureLabel,
    /// Mean confidence over the stability window
    pub confidence: Confidence,
    /// Which hand produced the event
    pub hand_id: HandId,
    /// Wall-clock emit time, milliseconds since the Unix epoch
    pub timestamp_ms: i64,
    /// Geometry snapshot from the most recent contributing detection
    pub metadata: DetectionMetadata,
}
