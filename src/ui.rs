use anyhow::Result;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use vision_alert::detect::Detection;
use vision_alert::frame::Frame;
use vision_alert::render::FrameSink;

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

    fn spinner(template: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        spinner.set_draw_target(ProgressDrawTarget::stderr());
        spinner.enable_steady_tick(Duration::from_millis(120));
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = Self::spinner("{spinner} {msg}");
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Wrap `inner` so every shown frame ticks a progress line on stderr.
    /// Plain mode prints one line per frame that carried detections.
    pub fn frames<'a>(&self, label: &str, inner: Box<dyn FrameSink + 'a>) -> FrameProgress<'a> {
        let spinner = if self.use_pretty() {
            let spinner = Self::spinner("{spinner} {prefix} [{elapsed}] {pos} frames {msg}");
            spinner.set_prefix(label.to_string());
            Some(spinner)
        } else {
            eprintln!("==> {}", label);
            None
        };
        FrameProgress { spinner, inner }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

pub struct FrameProgress<'a> {
    spinner: Option<ProgressBar>,
    inner: Box<dyn FrameSink + 'a>,
}

impl FrameSink for FrameProgress<'_> {
    fn show(&mut self, frame: &Frame, detections: &[Detection]) -> Result<()> {
        let captions = detections
            .iter()
            .map(Detection::caption)
            .collect::<Vec<_>>()
            .join(", ");
        match &self.spinner {
            Some(spinner) => {
                spinner.inc(1);
                if !captions.is_empty() {
                    spinner.set_message(captions);
                }
            }
            None if !captions.is_empty() => eprintln!("frame {}: {}", frame.index, captions),
            None => {}
        }
        self.inner.show(frame, detections)
    }
}

impl Drop for FrameProgress<'_> {
    fn drop(&mut self) {
        if let Some(spinner) = &self.spinner {
            spinner.finish_and_clear();
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
