use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use crate::detection_loop::CycleOutcome;
use crate::readiness::{BackendState, ReadyReason};
use crate::runtime::LiveStatus;

#[derive(Clone, Copy, Debug)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
    outcome: Option<String>,
    failed: bool,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
            outcome: None,
            failed: false,
        }
    }

    pub fn set_message(&self, message: &str) {
        if let Some(spinner) = &self.spinner {
            spinner.set_message(format!("{}: {message}…", self.name));
        }
    }

    /// Text appended to the completion line, e.g. `"model loaded"`.
    pub fn finish_with(mut self, outcome: impl Into<String>) {
        self.outcome = Some(outcome.into());
    }

    pub fn fail_with(mut self, outcome: impl Into<String>) {
        self.outcome = Some(outcome.into());
        self.failed = true;
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let mark = if self.failed { "✘" } else { "✔" };
        let message = match &self.outcome {
            Some(outcome) => format!(
                "{} {}: {} ({})",
                mark,
                self.name,
                outcome,
                format_duration(elapsed)
            ),
            None => format!("{} {} ({})", mark, self.name, format_duration(elapsed)),
        };
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

/// Turns runtime snapshots into terminal output: a spinner while waiting for
/// the backend, a throttled metrics line while detecting, and the error with
/// its recovery commands when something is surfaced.
pub struct StatusReporter {
    ui: Ui,
    metrics_every: Duration,
    waiting: Option<StageGuard>,
    last_backend: Option<BackendState>,
    last_metrics_at: Option<Instant>,
}

impl StatusReporter {
    pub fn new(ui: Ui, metrics_every: Duration) -> Self {
        Self {
            ui,
            metrics_every,
            waiting: None,
            last_backend: None,
            last_metrics_at: None,
        }
    }

    pub fn observe(&mut self, status: &LiveStatus<'_>) {
        if self.last_backend.as_ref() != Some(status.backend) {
            self.on_backend_change(status);
            self.last_backend = Some(status.backend.clone());
        }
        if status.backend.is_ready() && status.session.running {
            self.maybe_print_metrics(status);
        }
    }

    fn on_backend_change(&mut self, status: &LiveStatus<'_>) {
        match status.backend {
            BackendState::Connecting | BackendState::ModelLoading => {
                let stage = self
                    .waiting
                    .get_or_insert_with(|| self.ui.stage("waiting for backend"));
                stage.set_message(&status.backend.to_string());
            }
            BackendState::Ready => {
                let outcome = match status.ready_reason {
                    Some(ReadyReason::ModelLoaded) => "model loaded",
                    Some(ReadyReason::WatchdogExpired) => "not confirmed, watchdog expired",
                    Some(ReadyReason::ForcedStart) => "forced start",
                    None => "ready",
                };
                match self.waiting.take() {
                    Some(stage) => stage.finish_with(outcome),
                    None => eprintln!("==> detecting ({})", outcome),
                }
            }
            BackendState::Error(message) => {
                match self.waiting.take() {
                    Some(stage) => stage.fail_with(message.clone()),
                    None => eprintln!("✘ {}", message),
                }
                eprintln!("  type 'retry' to reconnect or 'force' to start detecting anyway");
            }
        }
    }

    fn maybe_print_metrics(&mut self, status: &LiveStatus<'_>) {
        let due = self
            .last_metrics_at
            .map_or(true, |at| at.elapsed() >= self.metrics_every);
        if !due {
            return;
        }
        if !matches!(status.last_outcome, Some(CycleOutcome::Rendered { .. })) {
            return;
        }
        eprintln!("{}", status.metrics.summary());
        self.last_metrics_at = Some(Instant::now());
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
