//! gesture-vision-server binary.
//!
//! Wires the vision loop thread to the WebSocket fan-out server: loads
//! configuration, binds the listener, spawns the loop, serves until a
//! termination signal, then drains and closes every subscriber.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use gesture_vision_pipeline::GesturePipeline;
use gesture_vision_server::broadcaster::{Broadcaster, Outbound};
use gesture_vision_server::config::ServerConfig;
use gesture_vision_server::source::{JsonlReplaySource, LandmarkSource, SyntheticSource};
use gesture_vision_server::vision;
use gesture_vision_server::ws::{create_router, AppState};
use gesture_vision_server::ServerError;

#[derive(Parser, Debug)]
#[command(name = "gesture-vision-server", about = "Hand gesture recognition event server")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(long)]
    port: Option<u16>,

    /// Landmark source: synthetic, or replay
    #[arg(long, default_value = "synthetic")]
    source: String,

    /// Replay file (JSON lines of observation frames) for --source replay
    #[arg(long, value_name = "PATH")]
    replay: Option<PathBuf>,

    /// Override the vision loop frame rate
    #[arg(long)]
    fps: Option<f64>,

    /// Show version and exit
    #[arg(long)]
    version: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gesture_vision_server=info,gesture_vision_pipeline=info".into()),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), ServerError> {
    let args = Args::parse();

    if args.version {
        println!("gesture-vision-server {}", gesture_vision_server::VERSION);
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(host) = args.host {
        config.broadcaster.host = host;
    }
    if let Some(port) = args.port {
        config.broadcaster.port = port;
    }
    if let Some(fps) = args.fps {
        config.vision.target_fps = fps;
    }
    config.validate()?;

    info!(version = gesture_vision_server::VERSION, "gesture-vision-server starting");

    let source: Box<dyn LandmarkSource> = match args.source.as_str() {
        "replay" => {
            let path = args.replay.ok_or_else(|| ServerError::Config {
                path: "--replay".to_string(),
                message: "replay source requires --replay <PATH>".to_string(),
            })?;
            Box::new(JsonlReplaySource::open(&path)?)
        }
        "synthetic" => Box::new(SyntheticSource::new()),
        other => {
            return Err(ServerError::Config {
                path: "--source".to_string(),
                message: format!("unknown source '{other}' (expected synthetic or replay)"),
            })
        }
    };

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await.map_err(|source| ServerError::Bind {
        addr: addr.clone(),
        source,
    })?;
    info!(%addr, "listening");

    let broadcaster = Arc::new(Broadcaster::new(config.broadcaster.queue_capacity));
    let running = Arc::new(AtomicBool::new(true));
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let (control_tx, control_rx) = mpsc::unbounded_channel();

    // Vision loop thread: the single owner of all pipeline state.
    let vision_handle = {
        let pipeline = GesturePipeline::new(config.pipeline_config());
        let broadcaster = broadcaster.clone();
        let running = running.clone();
        let shutdown_tx = shutdown_tx.clone();
        let vision_cfg = config.vision.clone();
        let broadcast_cfg = config.broadcaster.clone();
        std::thread::Builder::new()
            .name("vision-loop".to_string())
            .spawn(move || {
                let exit = vision::run(
                    source,
                    pipeline,
                    broadcaster,
                    running,
                    control_rx,
                    vision_cfg,
                    broadcast_cfg,
                );
                if exit == vision::LoopExit::SourceFailed {
                    error!("vision loop died, shutting the server down");
                }
                let _ = shutdown_tx.send(true);
            })?
    };

    // Termination signals flip the running flag; the vision loop drains,
    // then subscribers are closed with a normal close code.
    tokio::spawn(shutdown_on_signal(running.clone(), shutdown_tx));

    // Once shutdown begins, tell every subscriber task to close so the
    // graceful shutdown below can complete.
    {
        let broadcaster = broadcaster.clone();
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            if shutdown_rx.changed().await.is_ok() {
                broadcaster.publish(Outbound::Shutdown);
            }
        });
    }

    let state = AppState {
        broadcaster,
        control_tx,
        idle_timeout: Duration::from_secs(config.broadcaster.idle_timeout_secs),
        started_at: std::time::Instant::now(),
    };
    let router = create_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await?;

    if vision_handle.join().is_err() {
        error!("vision loop thread panicked");
    }

    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM, then begin graceful shutdown.
async fn shutdown_on_signal(running: Arc<AtomicBool>, shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("SIGINT received"),
        () = terminate => info!("SIGTERM received"),
    }

    running.store(false, Ordering::SeqCst);
    let _ = shutdown_tx.send(true);
}
