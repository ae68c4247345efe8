//! Server configuration.
//!
//! Loaded once at startup from an optional TOML file; every section and
//! every key is optional and falls back to the documented defaults.
//! Validation failures are fatal startup errors.

use std::path::Path;

use serde::Deserialize;

use gesture_vision_core::CoreError;
use gesture_vision_pipeline::{ClassifierConfig, IntakeConfig, PipelineConfig, StateMachineConfig};

use crate::ServerError;

/// Settings passed through to the landmark extractor boundary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Maximum hands to track (1 or 2)
    pub max_hands: usize,
    /// Extractor detection confidence floor
    pub min_detection_confidence: f32,
    /// Extractor tracking confidence floor
    pub min_tracking_confidence: f32,
    /// Extractor model complexity (0 = lite, 1 = full)
    pub model_complexity: u8,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_hands: 2,
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.7,
            model_complexity: 1,
        }
    }
}

/// Broadcast / WebSocket settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BroadcasterConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Per-subscriber outbound queue capacity
    pub queue_capacity: usize,
    /// Seconds of inbound silence before an idle probe and close
    pub idle_timeout_secs: u64,
    /// Interval between `status` messages, milliseconds
    pub status_interval_ms: u64,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8765,
            queue_capacity: 64,
            idle_timeout_secs: 60,
            status_interval_ms: 1000,
        }
    }
}

/// Vision loop settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Target frame rate
    pub target_fps: f64,
    /// Consecutive source read failures before the loop gives up
    pub max_consecutive_failures: u32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            target_fps: 30.0,
            max_consecutive_failures: 30,
        }
    }
}

/// Complete server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Landmark extractor settings
    pub detector: DetectorConfig,
    /// Identity assignment settings
    pub intake: IntakeConfig,
    /// Classifier thresholds
    pub classifier: ClassifierConfig,
    /// Temporal filter settings
    pub state_machine: StateMachineConfig,
    /// Broadcast settings
    pub broadcaster: BroadcasterConfig,
    /// Vision loop settings
    pub vision: VisionConfig,
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, does not parse, or carries
    /// invalid values.
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ServerError::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| ServerError::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges and relationships.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ServerError> {
        if !(1..=2).contains(&self.detector.max_hands) {
            return Err(CoreError::configuration(format!(
                "detector.max_hands must be 1 or 2, got {}",
                self.detector.max_hands
            ))
            .into());
        }
        if self.vision.target_fps <= 0.0 {
            return Err(CoreError::configuration("vision.target_fps must be positive").into());
        }
        if self.broadcaster.queue_capacity == 0 {
            return Err(
                CoreError::configuration("broadcaster.queue_capacity must be non-zero").into(),
            );
        }
        self.classifier.validate()?;
        Ok(())
    }

    /// Assemble the pipeline configuration, wiring the detector's hand
    /// limit into intake.
    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut intake = self.intake.clone();
        intake.max_hands = self.detector.max_hands;
        PipelineConfig {
            intake,
            classifier: self.classifier.clone(),
            state_machine: self.state_machine.clone(),
        }
    }

    /// The socket address string to bind.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.broadcaster.host, self.broadcaster.port)
    }
}
