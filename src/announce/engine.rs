use std::process::{Command, Stdio};

use anyhow::{anyhow, Context, Result};

/// Words per minute used when nothing else is configured.
pub const DEFAULT_SPEECH_RATE: u32 = 150;

/// Blocking text-to-speech engine. `speak` returns once playback finished.
pub trait SpeechEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn speak(&self, text: &str) -> Result<()>;
}

/// Engine that only logs what it would have said.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogEngine;

impl SpeechEngine for LogEngine {
    fn name(&self) -> &'static str {
        "log"
    }

    fn speak(&self, text: &str) -> Result<()> {
        log::info!("speech: {}", text);
        Ok(())
    }
}

/// Engine that runs an external TTS program once per announcement.
///
/// Arguments may contain `{text}`, `{rate}` and `{amplitude}` placeholders.
/// When no argument carries `{text}`, the text is appended as the last argument.
#[derive(Clone, Debug)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
    rate: u32,
    volume: f32,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            rate: DEFAULT_SPEECH_RATE,
            volume: 1.0,
        }
    }

    /// `espeak-ng -s <rate> -a <amplitude> <text>`.
    pub fn espeak() -> Self {
        Self::new(
            "espeak-ng",
            ["-s", "{rate}", "-a", "{amplitude}", "{text}"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    pub fn with_rate(mut self, rate: u32) -> Self {
        self.rate = rate;
        self
    }

    /// Volume in [0, 1]; mapped to an espeak-style amplitude of 0..=100.
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn amplitude(&self) -> u32 {
        (self.volume * 100.0).round() as u32
    }

    fn build_args(&self, text: &str) -> Vec<String> {
        let mut has_text = false;
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.contains("{text}") {
                    has_text = true;
                }
                arg.replace("{text}", text)
                    .replace("{rate}", &self.rate.to_string())
                    .replace("{amplitude}", &self.amplitude().to_string())
            })
            .collect();
        if !has_text {
            args.push(text.to_string());
        }
        args
    }
}

impl SpeechEngine for CommandEngine {
    fn name(&self) -> &'static str {
        "command"
    }

    fn speak(&self, text: &str) -> Result<()> {
        let status = Command::new(&self.program)
            .args(self.build_args(text))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("failed to run speech program '{}'", self.program))?;
        if !status.success() {
            return Err(anyhow!(
                "speech program '{}' exited with {}",
                self.program,
                status
            ));
        }
        Ok(())
    }
}
