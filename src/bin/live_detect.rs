//! live_detect - stream camera frames to a detection backend and overlay the results.
//!
//! Runs until interrupted. Commands typed on stdin:
//! - `retry` (`r`): restart readiness polling after an error
//! - `force` (`f`): start detecting without waiting for the backend
//! - `quit`  (`q`): stop and exit

use anyhow::Result;
use clap::Parser;
use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use live_detect::{
    config::LiveDetectConfig,
    ingest::open_source,
    ui::{StatusReporter, Ui},
    Control, ControlHandle, DetectionLoop, FailurePolicy, FramePacer, HttpInferenceClient,
    LiveInference, RasterOverlay, ReadinessMonitor, StopSignal,
};

const OVERLAY_SAVE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(
    name = "live_detect",
    version,
    about = "Stream camera frames to an object-detection backend and render predictions"
)]
struct Args {
    /// Backend base URL; health is `GET <url>/`, detection is `POST <url>/detect`
    #[arg(long, value_name = "URL")]
    backend_url: Option<String>,

    /// Camera source: stub://name, http(s):// snapshot or MJPEG URL, or a JPEG file/directory
    #[arg(long, value_name = "SOURCE")]
    camera_url: Option<String>,

    /// Start detecting immediately instead of waiting for the model to load
    #[arg(long)]
    force_start: bool,

    /// Consecutive failures that stop the session
    #[arg(long, value_name = "N")]
    failure_threshold: Option<u32>,

    /// Display refresh rate the detection loop is paced to
    #[arg(long, value_name = "HZ")]
    refresh_hz: Option<u32>,

    /// Write the current overlay to this PNG about once per second
    #[arg(long, value_name = "PATH")]
    overlay_out: Option<PathBuf>,

    /// Seconds between metrics lines
    #[arg(long, default_value_t = 2, value_name = "SECS")]
    metrics_every: u64,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = LiveDetectConfig::load()?;
    apply_args(&mut config, &args);
    config.validate()?;

    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let source = open_source(&config.camera)?;
    let client = HttpInferenceClient::new(&config.http_client())?;
    log::info!("backend: {}", config.backend_url);

    let stop = StopSignal::new();
    let mut monitor = ReadinessMonitor::new(config.readiness.clone());
    if args.force_start {
        monitor.force_start();
    }
    let detection = DetectionLoop::new(
        FailurePolicy::new(config.detection.failure_threshold),
        config.overlay.style_table(),
        stop.clone(),
    );
    let (mut runtime, controls) = LiveInference::new(
        monitor,
        detection,
        source,
        client,
        RasterOverlay::new()?,
        stop.clone(),
        FramePacer::new(config.detection.refresh_hz),
    );

    {
        let stop = stop.clone();
        let controls = controls.clone();
        ctrlc::set_handler(move || {
            stop.raise();
            let _ = controls.send(Control::Stop);
        })?;
    }
    spawn_command_reader(controls);

    let mut reporter = StatusReporter::new(ui, Duration::from_secs(args.metrics_every.max(1)));
    let overlay_path = config.overlay.output_path.clone();
    let mut last_saved: Option<Instant> = None;
    let mut last_saved_cycle = 0;

    runtime.run(|runtime| {
        reporter.observe(&runtime.status());
        let Some(path) = &overlay_path else {
            return;
        };
        let cycles = runtime.detection().cycles();
        let due = last_saved.map_or(true, |at| at.elapsed() >= OVERLAY_SAVE_INTERVAL);
        if due && cycles != last_saved_cycle {
            if let Err(err) = runtime.surface().save_png(path) {
                log::warn!("overlay not written: {:#}", err);
            }
            last_saved = Some(Instant::now());
            last_saved_cycle = cycles;
        }
    })?;

    if let Some(message) = runtime.monitor().state().error_message() {
        log::warn!("stopped with backend error: {}", message);
    }
    Ok(())
}

fn apply_args(config: &mut LiveDetectConfig, args: &Args) {
    if let Some(url) = &args.backend_url {
        config.backend_url = url.clone();
    }
    if let Some(url) = &args.camera_url {
        config.camera.url = url.clone();
    }
    if let Some(threshold) = args.failure_threshold {
        config.detection.failure_threshold = threshold;
    }
    if let Some(hz) = args.refresh_hz {
        config.detection.refresh_hz = hz;
    }
    if let Some(path) = &args.overlay_out {
        config.overlay.output_path = Some(path.clone());
    }
}

fn spawn_command_reader(controls: ControlHandle) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            let control = match line.trim().to_ascii_lowercase().as_str() {
                "" => continue,
                "retry" | "r" => Control::Retry,
                "force" | "f" => Control::ForceStart,
                "quit" | "q" | "exit" => Control::Stop,
                other => {
                    eprintln!("unknown command '{}' (retry | force | quit)", other);
                    continue;
                }
            };
            if controls.send(control).is_err() || control == Control::Stop {
                break;
            }
        }
    });
}
