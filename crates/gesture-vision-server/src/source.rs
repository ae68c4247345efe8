//! Landmark sources: the extractor boundary of the vision loop.
//!
//! The real landmark extractor (camera capture plus the hand model) lives
//! outside this crate; the vision loop only sees the [`LandmarkSource`]
//! trait. Two implementations ship with the server:
//!
//! - [`SyntheticSource`] — a scripted hand performing the recognizable
//!   gestures in a loop, for demos and soak testing without hardware.
//! - [`JsonlReplaySource`] — replays recorded observation frames from a
//!   JSON-lines file, one frame per line.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use gesture_vision_core::{
    Confidence, Handedness, HandLandmark, HandObservation, Landmark, LANDMARK_COUNT,
};

/// Errors surfaced by a landmark source.
///
/// A single failed frame is survivable (the loop counts it as "no hands");
/// only a long run of consecutive failures is fatal.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source could not be opened at startup
    #[error("cannot open {path}: {source}")]
    Open {
        /// Source path
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// A frame read failed
    #[error("frame read failed: {0}")]
    Read(std::io::Error),
}

/// Per-frame provider of hand observations.
///
/// Called from the vision thread once per tick; implementations must not
/// block longer than a frame interval.
pub trait LandmarkSource: Send {
    /// Produce the next frame's observations (0 to 2 hands).
    fn next_frame(&mut self) -> Result<Vec<HandObservation>, SourceError>;

    /// Human-readable source name for logs.
    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// SyntheticSource
// ---------------------------------------------------------------------------

/// Phases of the scripted gesture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    PalmHold,
    SwipeRight,
    Absent,
    Pinch,
    FistHold,
}

const SCRIPT: [(Phase, u32); 5] = [
    (Phase::PalmHold, 30),
    (Phase::SwipeRight, 10),
    (Phase::Absent, 15),
    (Phase::Pinch, 25),
    (Phase::FistHold, 30),
];

/// A scripted hand cycling through palm, swipe, pinch, and fist.
pub struct SyntheticSource {
    frame: u32,
}

impl SyntheticSource {
    /// Create the scripted source.
    #[must_use]
    pub fn new() -> Self {
        Self { frame: 0 }
    }

    fn script_position(frame: u32) -> (Phase, f32) {
        let total: u32 = SCRIPT.iter().map(|(_, len)| len).sum();
        let mut offset = frame % total;
        for (phase, len) in SCRIPT {
            if offset < len {
                return (phase, offset as f32 / len as f32);
            }
            offset -= len;
        }
        (Phase::Absent, 0.0)
    }

    fn base_hand(cx: f32, cy: f32) -> HandObservation {
        let mut landmarks = [Landmark::new(cx, cy, 0.0); LANDMARK_COUNT];
        landmarks[HandLandmark::Wrist.index()] = Landmark::new(cx, cy + 0.2, 0.0);
        HandObservation {
            landmarks,
            handedness: Handedness::Right,
            score: Confidence::clamped(0.98),
            tracking_id: Some(0),
        }
    }

    fn palm(cx: f32, cy: f32) -> HandObservation {
        let mut obs = Self::base_hand(cx, cy);
        for (tip, pip) in HandLandmark::FINGER_TIP_PIP_PAIRS {
            obs.landmarks[pip.index()] = Landmark::new(cx, cy, 0.0);
            obs.landmarks[tip.index()] = Landmark::new(cx, cy - 0.12, 0.0);
        }
        obs.landmarks[HandLandmark::ThumbTip.index()] = Landmark::new(cx - 0.15, cy, 0.0);
        obs
    }

    fn fist(cx: f32, cy: f32) -> HandObservation {
        let mut obs = Self::base_hand(cx, cy);
        obs.landmarks[HandLandmark::ThumbTip.index()] = Landmark::new(cx + 0.06, cy, 0.0);
        obs
    }

    fn pinching(cx: f32, cy: f32, distance: f32) -> HandObservation {
        let mut obs = Self::base_hand(cx, cy);
        for (tip, dx) in [
            (HandLandmark::MiddleTip, -0.12),
            (HandLandmark::RingTip, 0.12),
            (HandLandmark::PinkyTip, 0.16),
        ] {
            obs.landmarks[tip.index()] = Landmark::new(cx + dx, cy, 0.0);
        }
        obs.landmarks[HandLandmark::ThumbTip.index()] = Landmark::new(cx, cy, 0.0);
        obs.landmarks[HandLandmark::IndexTip.index()] = Landmark::new(cx + distance, cy, 0.0);
        obs
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LandmarkSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Vec<HandObservation>, SourceError> {
        let (phase, t) = Self::script_position(self.frame);
        self.frame = self.frame.wrapping_add(1);

        let observations = match phase {
            Phase::PalmHold => vec![Self::palm(0.4, 0.5)],
            Phase::SwipeRight => vec![Self::palm(0.4 + 0.25 * t, 0.5)],
            Phase::Absent => Vec::new(),
            Phase::Pinch => {
                // Close in, hold, release across the phase.
                let distance = if t < 0.3 {
                    0.09 - 0.2 * t
                } else if t < 0.7 {
                    0.03
                } else {
                    0.03 + 0.2 * (t - 0.7)
                };
                vec![Self::pinching(0.5, 0.5, distance)]
            }
            Phase::FistHold => vec![Self::fist(0.6, 0.5)],
        };
        Ok(observations)
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}

// ---------------------------------------------------------------------------
// JsonlReplaySource
// ---------------------------------------------------------------------------

/// Replays observation frames from a JSON-lines file.
///
/// Each line is a JSON array of hand observations; an empty array is a
/// frame with no hands. Malformed lines are logged and treated as empty
/// frames. At end of file the source loops back to the start.
pub struct JsonlReplaySource {
    path: PathBuf,
    reader: BufReader<File>,
    line_no: usize,
}

impl JsonlReplaySource {
    /// Open a replay file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(|source| SourceError::Open {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), "replay source opened");
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            line_no: 0,
        })
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        let file = File::open(&self.path).map_err(|source| SourceError::Open {
            path: self.path.display().to_string(),
            source,
        })?;
        self.reader = BufReader::new(file);
        self.line_no = 0;
        debug!(path = %self.path.display(), "replay looped");
        Ok(())
    }
}

impl LandmarkSource for JsonlReplaySource {
    fn next_frame(&mut self) -> Result<Vec<HandObservation>, SourceError> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).map_err(SourceError::Read)?;
        if read == 0 {
            self.rewind()?;
            let read = self.reader.read_line(&mut line).map_err(SourceError::Read)?;
            if read == 0 {
                // Empty file: a permanent stream of empty frames.
                return Ok(Vec::new());
            }
        }
        self.line_no += 1;

        if line.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Vec<HandObservation>>(&line) {
            Ok(observations) => Ok(observations),
            Err(e) => {
                warn!(line = self.line_no, error = %e, "malformed replay frame, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    fn name(&self) -> &'static str {
        "replay"
    }
}
