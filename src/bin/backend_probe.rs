//! backend_probe - one-shot check of a detection backend.
//!
//! Queries the health endpoint and, given `--image`, submits that JPEG once and
//! prints the predictions as JSON on stdout.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use live_detect::{
    frame::{Frame, DEFAULT_JPEG_QUALITY},
    ui::Ui,
    HttpClientConfig, HttpInferenceClient, InferenceClient,
};

#[derive(Parser, Debug)]
#[command(name = "backend_probe", about = "Check a detection backend's health")]
struct Args {
    /// Backend base URL
    #[arg(
        long,
        env = "LIVE_DETECT_BACKEND_URL",
        default_value = "http://127.0.0.1:8000",
        value_name = "URL"
    )]
    backend_url: String,

    /// JPEG (or any image the decoder understands) to submit once
    #[arg(long, value_name = "PATH")]
    image: Option<PathBuf>,

    /// Per-request timeout in milliseconds
    #[arg(long, default_value_t = 10_000, value_name = "MS")]
    timeout_ms: u64,

    /// Exit non-zero unless the model reports loaded
    #[arg(long)]
    require_loaded: bool,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let client = HttpInferenceClient::new(&HttpClientConfig {
        backend_url: args.backend_url.clone(),
        request_timeout: Duration::from_millis(args.timeout_ms.max(1)),
    })?;

    let health = {
        let stage = ui.stage("Health check");
        let health = client.health(None)?;
        stage.finish_with(if health.model_loaded {
            "model loaded"
        } else {
            "model loading"
        });
        health
    };
    if args.require_loaded && !health.model_loaded {
        return Err(anyhow!("backend at {} has not loaded its model", args.backend_url));
    }

    let Some(path) = &args.image else {
        return Ok(());
    };
    let frame = {
        let _stage = ui.stage("Encode image");
        let bytes =
            std::fs::read(path).with_context(|| format!("read image {}", path.display()))?;
        Frame::reencode(&bytes, DEFAULT_JPEG_QUALITY)?
    };
    let predictions = {
        let stage = ui.stage("Detect");
        let predictions = client.detect(&frame)?;
        stage.finish_with(format!("{} predictions", predictions.len()));
        predictions
    };

    let report = serde_json::json!({
        "backend_url": args.backend_url,
        "model_loaded": health.model_loaded,
        "image": path.display().to_string(),
        "width": frame.width,
        "height": frame.height,
        "predictions": predictions
            .iter()
            .map(|p| serde_json::json!({
                "class": p.class_label,
                "score": p.confidence,
                "label": p.label(),
                "bbox": [p.bbox.x, p.bbox.y, p.bbox.w, p.bbox.h],
            }))
            .collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
