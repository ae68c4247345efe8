//! The vision loop: a dedicated thread driving the pipeline at camera rate.
//!
//! Single-threaded and free of suspension points. Each tick: drain control
//! messages, pull a frame from the landmark source, run the pipeline, and
//! hand any emitted events to the broadcaster. All per-hand state is owned
//! here exclusively; the only boundary to the async side is the
//! non-blocking `Broadcaster::publish` and the control channel.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use gesture_vision_core::types::epoch_millis;
use gesture_vision_pipeline::GesturePipeline;

use crate::broadcaster::{Broadcaster, Outbound, StatusUpdate};
use crate::config::{BroadcasterConfig, VisionConfig};
use crate::source::LandmarkSource;

/// Control messages from subscriber tasks to the vision loop, applied
/// between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Reset all per-hand pipeline state.
    ClearHistory,
}

/// Moving-average frame rate over a fixed window.
pub struct FpsCounter {
    samples: VecDeque<f64>,
    window: usize,
    last_tick: Instant,
}

impl FpsCounter {
    /// Counter averaging over `window` frames.
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(window),
            window: window.max(1),
            last_tick: Instant::now(),
        }
    }

    /// Record a tick; returns the windowed average FPS.
    pub fn tick(&mut self) -> f64 {
        let now = Instant::now();
        let delta = now.duration_since(self.last_tick).as_secs_f64();
        self.last_tick = now;
        if delta > 0.0 {
            if self.samples.len() == self.window {
                self.samples.pop_front();
            }
            self.samples.push_back(1.0 / delta);
        }
        self.average()
    }

    /// Current windowed average FPS.
    #[must_use]
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }
}

/// Moving average of frame processing latency.
pub struct LatencyTracker {
    samples: VecDeque<f64>,
    window: usize,
}

impl LatencyTracker {
    /// Tracker averaging over `window` measurements.
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(window),
            window: window.max(1),
        }
    }

    /// Record one frame's processing duration.
    pub fn record(&mut self, elapsed: Duration) {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(elapsed.as_secs_f64() * 1000.0);
    }

    /// Average latency in milliseconds.
    #[must_use]
    pub fn average_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }
}

/// Why the vision loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The shared running flag was cleared (shutdown signal).
    Shutdown,
    /// Too many consecutive source failures.
    SourceFailed,
}

/// Run the vision loop until shutdown or a fatal source failure.
///
/// Ticks at `vision.target_fps`. Source errors on single frames are
/// treated as "no hands" and counted; a run of
/// `vision.max_consecutive_failures` gives up.
pub fn run(
    mut source: Box<dyn LandmarkSource>,
    mut pipeline: GesturePipeline,
    broadcaster: Arc<Broadcaster>,
    running: Arc<AtomicBool>,
    mut control: mpsc::UnboundedReceiver<ControlMessage>,
    vision: VisionConfig,
    broadcast_cfg: BroadcasterConfig,
) -> LoopExit {
    let frame_interval = Duration::from_secs_f64(1.0 / vision.target_fps);
    let status_interval = Duration::from_millis(broadcast_cfg.status_interval_ms.max(1));

    let mut fps = FpsCounter::new(30);
    let mut latency = LatencyTracker::new(100);
    let mut last_status = Instant::now();
    let mut consecutive_failures: u32 = 0;

    info!(
        source = source.name(),
        target_fps = vision.target_fps,
        "vision loop started"
    );

    while running.load(Ordering::SeqCst) {
        let tick_start = Instant::now();

        // Control messages apply atomically between frames.
        while let Ok(message) = control.try_recv() {
            match message {
                ControlMessage::ClearHistory => pipeline.reset(),
            }
        }

        let observations = match source.next_frame() {
            Ok(observations) => {
                consecutive_failures = 0;
                observations
            }
            Err(e) => {
                consecutive_failures += 1;
                warn!(
                    error = %e,
                    consecutive = consecutive_failures,
                    "frame read failed, treating as no hands"
                );
                if consecutive_failures >= vision.max_consecutive_failures {
                    error!(
                        failures = consecutive_failures,
                        "giving up on landmark source"
                    );
                    running.store(false, Ordering::SeqCst);
                    return LoopExit::SourceFailed;
                }
                Vec::new()
            }
        };

        for event in pipeline.process_frame(observations, epoch_millis()) {
            broadcaster.publish(Outbound::Gesture(event));
        }

        latency.record(tick_start.elapsed());
        let fps_now = fps.tick();

        if last_status.elapsed() >= status_interval {
            broadcaster.publish(Outbound::Status(StatusUpdate {
                fps: fps_now,
                latency_ms: latency.average_ms(),
                hands_detected: pipeline.active_hands(),
            }));
            last_status = Instant::now();
        }

        if let Some(remaining) = frame_interval.checked_sub(tick_start.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    info!("vision loop stopped");
    LoopExit::Shutdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SourceError, SyntheticSource};
    use gesture_vision_core::HandObservation;
    use gesture_vision_pipeline::PipelineConfig;

    struct FailingSource;

    impl LandmarkSource for FailingSource {
        fn next_frame(&mut self) -> Result<Vec<HandObservation>, SourceError> {
            Err(SourceError::Read(std::io::Error::other("camera gone")))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn fast_vision(max_failures: u32) -> VisionConfig {
        VisionConfig {
            target_fps: 1000.0,
            max_consecutive_failures: max_failures,
        }
    }

    #[test]
    fn test_fps_counter_averages() {
        let mut fps = FpsCounter::new(5);
        assert_eq!(fps.average(), 0.0);
        std::thread::sleep(Duration::from_millis(5));
        let value = fps.tick();
        assert!(value > 0.0);
        assert!(value < 1000.0);
    }

    #[test]
    fn test_latency_tracker_window() {
        let mut latency = LatencyTracker::new(2);
        latency.record(Duration::from_millis(10));
        latency.record(Duration::from_millis(20));
        latency.record(Duration::from_millis(30));
        // First sample aged out of the window of two.
        assert!((latency.average_ms() - 25.0).abs() < 1.0);
    }

    #[test]
    fn test_loop_stops_when_running_cleared() {
        let running = Arc::new(AtomicBool::new(false));
        let (_tx, rx) = mpsc::unbounded_channel();
        let exit = run(
            Box::new(SyntheticSource::new()),
            gesture_vision_pipeline::GesturePipeline::new(PipelineConfig::default()),
            Arc::new(Broadcaster::new(8)),
            running,
            rx,
            fast_vision(30),
            BroadcasterConfig::default(),
        );
        assert_eq!(exit, LoopExit::Shutdown);
    }

    #[test]
    fn test_loop_gives_up_after_consecutive_failures() {
        let running = Arc::new(AtomicBool::new(true));
        let (_tx, rx) = mpsc::unbounded_channel();
        let exit = run(
            Box::new(FailingSource),
            gesture_vision_pipeline::GesturePipeline::new(PipelineConfig::default()),
            Arc::new(Broadcaster::new(8)),
            running.clone(),
            rx,
            fast_vision(3),
            BroadcasterConfig::default(),
        );
        assert_eq!(exit, LoopExit::SourceFailed);
        assert!(!running.load(Ordering::SeqCst), "fatal exit clears the flag");
    }

    #[test]
    fn test_synthetic_loop_publishes_gestures_and_status() {
        let running = Arc::new(AtomicBool::new(true));
        let broadcaster = Arc::new(Broadcaster::new(256));
        let subscriber = broadcaster.subscribe();
        let (_tx, rx) = mpsc::unbounded_channel();

        // Stop the loop from a watchdog thread after enough frames for the
        // scripted palm hold to stabilize.
        let watchdog = {
            let running = running.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(300));
                running.store(false, Ordering::SeqCst);
            })
        };

        let vision = VisionConfig {
            target_fps: 500.0,
            max_consecutive_failures: 30,
        };
        let broadcast_cfg = BroadcasterConfig {
            status_interval_ms: 50,
            ..BroadcasterConfig::default()
        };
        let exit = run(
            Box::new(SyntheticSource::new()),
            gesture_vision_pipeline::GesturePipeline::new(PipelineConfig::default()),
            broadcaster,
            running,
            rx,
            vision,
            broadcast_cfg,
        );
        watchdog.join().unwrap();
        assert_eq!(exit, LoopExit::Shutdown);

        let mut saw_gesture = false;
        let mut saw_status = false;
        while let Some(message) = subscriber.try_recv() {
            match message {
                Outbound::Gesture(_) => saw_gesture = true,
                Outbound::Status(_) => saw_status = true,
                Outbound::Shutdown => {}
            }
        }
        assert!(saw_gesture, "scripted palm hold must promote a gesture");
        assert!(saw_status, "status must be published periodically");
    }
}
