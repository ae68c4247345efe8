//! Wire protocol for subscriber connections.
//!
//! Framed JSON, one message per WebSocket text frame, tagged by a `type`
//! field on both directions.
//!
//! ## Server → client
//!
//! - `hello` — protocol version and capability set, sent once on connect
//! - `gesture` — one emitted gesture event
//! - `status` — periodic FPS / latency / hand-count report
//! - `pong` — reply to a client `ping`
//! - `ping` — server-initiated probe before an idle connection is closed
//!
//! ## Client → server
//!
//! - `ping` — echoed as `pong`
//! - `config` — per-connection display flags; only `mirror_mode` affects
//!   outgoing metadata
//! - `clear_gesture_history` — atomic reset of all per-hand state

use serde::{Deserialize, Serialize};

use gesture_vision_core::{GestureEvent, GestureLabel};

use crate::broadcaster::StatusUpdate;

/// Protocol version advertised in the hello message.
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Capabilities advertised in the hello message.
pub const CAPABILITIES: [&str; 2] = ["gestures", "status"];

fn round3(value: f32) -> f32 {
    (value * 1000.0).round() / 1000.0
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Metadata block of a `gesture` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureMetadata {
    /// Hand center (x, y), normalized, 3 decimal places
    pub hand_center: [f32; 2],
    /// Hand scale reference, 3 decimal places
    pub hand_size: f32,
    /// Extended non-thumb finger count
    pub fingers_extended: u8,
}

/// Messages sent from the server to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Greeting sent once when a subscriber connects.
    Hello {
        /// Protocol version
        version: String,
        /// Declared capability set
        capabilities: Vec<String>,
    },
    /// One emitted gesture event.
    Gesture {
        /// Gesture label
        gesture: GestureLabel,
        /// Mean confidence, 3 decimal places
        confidence: f32,
        /// Stable hand identity
        hand_id: u8,
        /// Emit time, milliseconds since epoch
        timestamp: i64,
        /// Geometry snapshot
        metadata: GestureMetadata,
    },
    /// Periodic health report.
    Status {
        /// Vision loop frame rate
        fps: f64,
        /// Frame processing latency estimate
        latency_ms: f64,
        /// Currently tracked hands
        hands_detected: usize,
        /// Events dropped for this subscriber; omitted while zero
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dropped_events: Option<u64>,
    },
    /// Reply to a client ping.
    Pong {
        /// Server wall-clock, milliseconds since epoch
        timestamp: i64,
    },
    /// Probe sent before an idle connection is closed.
    Ping {
        /// Server wall-clock, milliseconds since epoch
        timestamp: i64,
    },
}

impl ServerMessage {
    /// The connect-time greeting.
    #[must_use]
    pub fn hello() -> Self {
        Self::Hello {
            version: PROTOCOL_VERSION.to_string(),
            capabilities: CAPABILITIES.iter().map(ToString::to_string).collect(),
        }
    }

    /// Build a `gesture` message from an emitted event.
    ///
    /// When `mirror` is set, the metadata x coordinate is flipped across
    /// the vertical image axis; nothing else changes.
    #[must_use]
    pub fn gesture(event: &GestureEvent, mirror: bool) -> Self {
        let mut center_x = event.metadata.hand_center[0];
        if mirror {
            center_x = 1.0 - center_x;
        }
        Self::Gesture {
            gesture: event.label,
            confidence: round3(event.confidence.value()),
            hand_id: event.hand_id.as_index() as u8,
            timestamp: event.timestamp_ms,
            metadata: GestureMetadata {
                hand_center: [round3(center_x), round3(event.metadata.hand_center[1])],
                hand_size: round3(event.metadata.hand_size),
                fingers_extended: event.metadata.fingers_extended,
            },
        }
    }

    /// Build a `status` message, surfacing the subscriber's drop count
    /// once it is non-zero.
    #[must_use]
    pub fn status(update: StatusUpdate, dropped_events: u64) -> Self {
        Self::Status {
            fps: round1(update.fps),
            latency_ms: round1(update.latency_ms),
            hands_detected: update.hands_detected,
            dropped_events: (dropped_events > 0).then_some(dropped_events),
        }
    }

    /// Reply to a client ping.
    #[must_use]
    pub fn pong(timestamp: i64) -> Self {
        Self::Pong { timestamp }
    }

    /// Idle-probe ping.
    #[must_use]
    pub fn ping(timestamp: i64) -> Self {
        Self::Ping { timestamp }
    }
}

/// Control messages recognized from subscribers. Anything unparseable is
/// logged and ignored; the connection stays open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Round-trip probe; echoed as `pong`.
    Ping {
        /// Client timestamp, not interpreted
        #[serde(default)]
        timestamp: Option<i64>,
    },
    /// Display configuration. Only `mirror_mode` is semantically
    /// significant to the core; the rest is carried for the client's own
    /// bookkeeping and does not reconfigure the pipeline.
    Config {
        /// Camera device index (informational)
        #[serde(default)]
        camera_index: Option<u32>,
        /// Whether the client flips its camera feed (informational)
        #[serde(default)]
        flip_camera: Option<bool>,
        /// Mirror outgoing metadata x coordinates
        #[serde(default)]
        mirror_mode: Option<bool>,
    },
    /// Atomic reset of all per-hand pipeline state.
    ClearGestureHistory,
}

#[cfg(test)]
mod tests {
    use super::*;
    use gesture_vision_core::{Confidence, DetectionMetadata, HandId};

    fn event() -> GestureEvent {
        GestureEvent {
            label: GestureLabel::SwipeLeft,
            confidence: Confidence::clamped(0.87654),
            hand_id: HandId::all()[1],
            timestamp_ms: 1_700_000_000_123,
            metadata: DetectionMetadata {
                hand_center: [0.12345, 0.5],
                hand_size: 0.2222,
                wrist_z: -0.1,
                fingers_extended: 2,
            },
        }
    }

    #[test]
    fn test_hello_wire_shape() {
        let json = serde_json::to_value(ServerMessage::hello()).unwrap();
        assert_eq!(json["type"], "hello");
        assert_eq!(json["version"], "1.0.0");
        assert_eq!(json["capabilities"][0], "gestures");
        assert_eq!(json["capabilities"][1], "status");
    }

    fn approx(value: &serde_json::Value, expected: f64) -> bool {
        value.as_f64().is_some_and(|v| (v - expected).abs() < 1e-4)
    }

    #[test]
    fn test_gesture_wire_shape() {
        let json = serde_json::to_value(ServerMessage::gesture(&event(), false)).unwrap();
        assert_eq!(json["type"], "gesture");
        assert_eq!(json["gesture"], "SWIPE_LEFT");
        assert_eq!(json["hand_id"], 1);
        assert_eq!(json["timestamp"], 1_700_000_000_123i64);
        assert!(approx(&json["confidence"], 0.877));
        assert!(approx(&json["metadata"]["hand_center"][0], 0.123));
        assert!(approx(&json["metadata"]["hand_size"], 0.222));
        assert_eq!(json["metadata"]["fingers_extended"], 2);
        // wrist depth is internal metadata, not part of the wire contract
        assert!(json["metadata"].get("wrist_z").is_none());
    }

    #[test]
    fn test_mirror_flips_only_x() {
        let msg = ServerMessage::gesture(&event(), true);
        let json = serde_json::to_value(msg).unwrap();
        assert!(approx(&json["metadata"]["hand_center"][0], 0.877)); // 1 - 0.123
        assert!(approx(&json["metadata"]["hand_center"][1], 0.5));
    }

    #[test]
    fn test_status_omits_zero_drop_count() {
        let update = StatusUpdate {
            fps: 29.97,
            latency_ms: 3.14,
            hands_detected: 1,
        };
        let json = serde_json::to_value(ServerMessage::status(update, 0)).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["fps"], 30.0);
        assert_eq!(json["latency_ms"], 3.1);
        assert!(json.get("dropped_events").is_none());

        let json = serde_json::to_value(ServerMessage::status(update, 5)).unwrap();
        assert_eq!(json["dropped_events"], 5);
    }

    #[test]
    fn test_client_ping_parses() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"ping","timestamp":123}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ping { timestamp: Some(123) });

        // timestamp is optional
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ping { timestamp: None });
    }

    #[test]
    fn test_client_config_parses() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"config","camera_index":0,"flip_camera":false,"mirror_mode":true}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::Config { mirror_mode, .. } => assert_eq!(mirror_mode, Some(true)),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_clear_history_parses() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"clear_gesture_history"}"#).unwrap();
        assert_eq!(msg, ClientMessage::ClearGestureHistory);
    }

    #[test]
    fn test_garbage_is_rejected_not_panicking() {
        assert!(serde_json::from_str::<ClientMessage>("not json").is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"warp_drive"}"#).is_err());
    }
}
