//! vision-alert - road-sign detection with spoken alerts
//!
//! Subcommands:
//! - `live`: watch a camera and announce every detected sign
//! - `upload <path>`: store a video in the library, then analyze it
//! - `saved`: list stored videos
//! - `play <name>`: analyze a stored video
//! - `demo`: synthetic clip with the scripted detector

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use vision_alert::alert::AlertMode;
use vision_alert::announce::{CommandEngine, LogEngine, QueuedAnnouncer, SpeechEngine};
use vision_alert::config::{SpeechEngineKind, VisionAlertConfig};
use vision_alert::detect::{BackendRegistry, DetectorBackend, ScriptedBackend};
#[cfg(feature = "backend-tract")]
use vision_alert::detect::{TractBackend, TractSettings};
use vision_alert::ingest::{CameraSource, FileConfig, FileSource, FrameSource};
use vision_alert::render::{FrameSink, NullSink};
use vision_alert::session::{Session, SessionKind, SessionSettings, SessionSummary};
use vision_alert::storage::VideoLibrary;

#[path = "../ui.rs"]
mod ui;

const SCRIPTED_BACKEND: &str = "scripted";
const DEMO_SOURCE: &str = "stub://demo";

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension). Defaults to $VISION_ALERT_CONFIG.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, global = true, default_value = "auto", value_name = "MODE")]
    ui: String,
    /// Write annotated JPEGs of frames with detections into this directory.
    #[arg(long, global = true, value_name = "DIR")]
    snapshots: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch a camera until Ctrl-C.
    Live {
        /// Camera index (overrides config).
        #[arg(long)]
        camera: Option<u32>,
    },
    /// Store a video in the library and analyze it.
    Upload { path: PathBuf },
    /// List videos in the library.
    Saved,
    /// Analyze a video already in the library.
    Play { name: String },
    /// Run the scripted detector over a synthetic clip.
    Demo {
        /// Length of the synthetic clip.
        #[arg(long, default_value_t = 60)]
        frames: u64,
        /// Announce every detection, as in live mode.
        #[arg(long)]
        unthrottled: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let cfg = match &args.config {
        Some(path) => VisionAlertConfig::load_from(Some(path))?,
        None => VisionAlertConfig::load()?,
    };

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::SeqCst);
        })
        .context("error setting Ctrl-C handler")?;
    }

    let ctx = RunContext {
        cfg: &cfg,
        ui: &ui,
        snapshots: args.snapshots.as_deref(),
        stop: &stop,
    };

    match args.command {
        Command::Live { camera } => {
            let mut camera_cfg = cfg.camera_config();
            if let Some(index) = camera {
                camera_cfg.device = format!("/dev/video{}", index);
            }
            let source = CameraSource::new(camera_cfg)?;
            let detector = {
                let _stage = ui.stage("Load detector");
                build_detector(&cfg, &cfg.detector.backend)?
            };
            ctx.run(
                SessionKind::Live,
                cfg.session_settings(SessionKind::Live),
                Box::new(source),
                detector,
            )
        }
        Command::Upload { path } => {
            let stored = if path.to_string_lossy().starts_with("stub://") {
                path
            } else {
                let _stage = ui.stage("Store upload");
                let library = VideoLibrary::open(&cfg.save_dir)?;
                library.import_file(&path)?
            };
            ctx.analyze_file(&stored)
        }
        Command::Saved => {
            let library = VideoLibrary::open(&cfg.save_dir)?;
            let names = library.list_saved()?;
            if names.is_empty() {
                eprintln!("no saved videos in {}", library.dir().display());
            }
            for name in names {
                println!("{}", name);
            }
            Ok(())
        }
        Command::Play { name } => {
            let library = VideoLibrary::open(&cfg.save_dir)?;
            let path = library.path_of(&name)?;
            ctx.analyze_file(&path)
        }
        Command::Demo {
            frames,
            unthrottled,
        } => {
            let mut settings = cfg.session_settings(SessionKind::Upload);
            if unthrottled {
                settings.mode = AlertMode::Unthrottled;
            }
            let source = FileSource::new(FileConfig {
                path: format!("{}?frames={}", DEMO_SOURCE, frames),
                width: cfg.live.width,
                height: cfg.live.height,
            })?;
            let detector = build_detector(&cfg, SCRIPTED_BACKEND)?;
            ctx.run(SessionKind::Upload, settings, Box::new(source), detector)
        }
    }
}

struct RunContext<'a> {
    cfg: &'a VisionAlertConfig,
    ui: &'a ui::Ui,
    snapshots: Option<&'a Path>,
    stop: &'a AtomicBool,
}

impl RunContext<'_> {
    fn analyze_file(&self, path: &Path) -> Result<()> {
        let source = FileSource::new(FileConfig::for_path(path.to_string_lossy()))?;
        let detector = {
            let _stage = self.ui.stage("Load detector");
            build_detector(self.cfg, &self.cfg.detector.backend)?
        };
        self.run(
            SessionKind::Upload,
            self.cfg.session_settings(SessionKind::Upload),
            Box::new(source),
            detector,
        )
    }

    fn run(
        &self,
        kind: SessionKind,
        settings: SessionSettings,
        source: Box<dyn FrameSource>,
        detector: Box<dyn DetectorBackend>,
    ) -> Result<()> {
        let announcer = build_announcer(self.cfg)?;
        let label = source.describe();
        let sink = self.ui.frames(&label, build_sink(self.snapshots)?);

        let result = Session::new(kind, settings, source, detector, &announcer)
            .and_then(|session| session.with_sink(Box::new(sink)).run(self.stop));

        let engine = announcer.engine_name();
        let stats = announcer.shutdown();
        log::info!(
            "announcer ({}): {} submitted, {} spoken, {} failed, {} dropped",
            engine,
            stats.submitted,
            stats.spoken,
            stats.failed,
            stats.dropped
        );
        let summary = result?;
        print_summary(&summary);
        Ok(())
    }
}

fn build_detector(cfg: &VisionAlertConfig, name: &str) -> Result<Box<dyn DetectorBackend>> {
    let mut registry = BackendRegistry::new();
    registry.register(ScriptedBackend::demo());
    registry.set_default(SCRIPTED_BACKEND)?;

    if name == "tract" {
        #[cfg(feature = "backend-tract")]
        {
            let settings = TractSettings {
                input_size: cfg.detector.input_size,
                min_confidence: cfg.detector.min_confidence,
                iou_threshold: cfg.detector.iou_threshold,
            };
            registry.register(TractBackend::new(&cfg.detector.model_path, settings)?);
        }
        #[cfg(not(feature = "backend-tract"))]
        {
            return Err(anyhow!(
                "detector backend 'tract' requires the backend-tract feature (model {})",
                cfg.detector.model_path.display()
            ));
        }
    }

    log::debug!("detector backends: {}", registry.list().join(", "));
    Ok(Box::new(registry.select(Some(name))?))
}

fn build_announcer(cfg: &VisionAlertConfig) -> Result<QueuedAnnouncer> {
    let engine: Arc<dyn SpeechEngine> = match cfg.speech.engine {
        SpeechEngineKind::Command => {
            let engine = CommandEngine::new(cfg.speech.program.clone(), cfg.speech.args.clone())
                .with_rate(cfg.speech.rate)
                .with_volume(cfg.speech.volume);
            log::info!("speaking through {} at {} wpm", engine.program(), cfg.speech.rate);
            Arc::new(engine)
        }
        SpeechEngineKind::Log => Arc::new(LogEngine),
    };
    QueuedAnnouncer::spawn(engine, cfg.announcer_settings())
}

fn build_sink(snapshots: Option<&Path>) -> Result<Box<dyn FrameSink>> {
    match snapshots {
        None => Ok(Box::new(NullSink)),
        #[cfg(feature = "snapshots")]
        Some(dir) => Ok(Box::new(vision_alert::render::JpegSnapshotSink::new(dir)?)),
        #[cfg(not(feature = "snapshots"))]
        Some(_) => Err(anyhow!("--snapshots requires the snapshots feature")),
    }
}

fn print_summary(summary: &SessionSummary) {
    println!(
        "frames read: {}, sampled: {}, detections: {}",
        summary.frames_read, summary.frames_sampled, summary.detections
    );
    if summary.detector_failures > 0 {
        println!("detector failures: {}", summary.detector_failures);
    }
    let alerts: Vec<&str> = summary.alerts.iter().map(|sign| sign.label()).collect();
    println!("alerts ({}): {}", alerts.len(), alerts.join(", "));
    println!("ended: {:?}", summary.end);
    if !summary.source_healthy {
        println!("source reported unhealthy at end of session");
    }
}
