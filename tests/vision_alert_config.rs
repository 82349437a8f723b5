use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::{Builder, NamedTempFile};

use vision_alert::alert::AlertMode;
use vision_alert::config::{SpeechEngineKind, VisionAlertConfig};
use vision_alert::session::{DetectorErrorPolicy, SessionKind};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "VISION_ALERT_CONFIG",
        "VISION_ALERT_SAVE_DIR",
        "VISION_ALERT_CAMERA",
        "VISION_ALERT_FRAME_INTERVAL",
        "VISION_ALERT_THRESHOLD",
        "VISION_ALERT_MODEL",
        "VISION_ALERT_TTS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "save_dir": "/var/lib/vision-alert/videos",
        "sampler": { "interval": 3 },
        "live": { "camera_index": 1, "width": 1280, "height": 720 },
        "upload": { "alerts": { "mode": "throttled", "threshold": 0.7 } },
        "detector": { "backend": "Scripted", "on_error": "skip" },
        "speech": { "engine": "log", "workers": 2, "queue_capacity": 4 }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("VISION_ALERT_CONFIG", file.path());
    std::env::set_var("VISION_ALERT_CAMERA", "2");
    std::env::set_var("VISION_ALERT_MODEL", "models/signs.onnx");
    std::env::set_var("VISION_ALERT_TTS", "say");

    let cfg = VisionAlertConfig::load().expect("load config");

    assert_eq!(cfg.save_dir, PathBuf::from("/var/lib/vision-alert/videos"));
    assert_eq!(cfg.frame_interval, 3);
    assert_eq!(cfg.live.camera_index, 2);
    assert_eq!(cfg.live.width, 1280);
    assert_eq!(cfg.live.height, 720);
    assert_eq!(cfg.camera_config().device, "/dev/video2");
    assert_eq!(cfg.upload.mode, AlertMode::Throttled { threshold: 0.7 });
    assert_eq!(cfg.detector.backend, "scripted");
    assert_eq!(cfg.detector.on_error, DetectorErrorPolicy::Skip);
    assert_eq!(cfg.detector.model_path, PathBuf::from("models/signs.onnx"));
    assert_eq!(cfg.speech.engine, SpeechEngineKind::Log);
    assert_eq!(cfg.speech.program, "say");
    assert_eq!(cfg.speech.workers, 2);
    assert_eq!(cfg.speech.queue_capacity, 4);

    let upload = cfg.session_settings(SessionKind::Upload);
    assert_eq!(upload.frame_interval, 3);
    assert_eq!(upload.on_detector_error, DetectorErrorPolicy::Skip);

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
save_dir = "clips"

[live]
device = "stub://dashcam"

[live.alerts]
mode = "throttled"
threshold = 0.5

[speech]
rate = 180
volume = 0.6
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");
    std::env::set_var("VISION_ALERT_CONFIG", file.path());

    let cfg = VisionAlertConfig::load().expect("load config");
    assert_eq!(cfg.save_dir, PathBuf::from("clips"));
    assert_eq!(cfg.camera_config().device, "stub://dashcam");
    assert_eq!(cfg.live.mode, AlertMode::Throttled { threshold: 0.5 });
    assert_eq!(cfg.upload.mode, AlertMode::throttled());
    assert_eq!(cfg.frame_interval, 5);
    assert_eq!(cfg.speech.rate, 180);
    assert!((cfg.speech.volume - 0.6).abs() < f32::EPSILON);

    clear_env();
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = VisionAlertConfig::load().expect("load defaults");
    assert_eq!(cfg.save_dir, PathBuf::from("recorded_videos"));
    assert_eq!(cfg.frame_interval, 5);
    assert_eq!(cfg.live.mode, AlertMode::Unthrottled);
    assert_eq!(cfg.upload.mode, AlertMode::Throttled { threshold: 0.8 });
    assert_eq!(cfg.detector.backend, "tract");
    assert_eq!(cfg.speech.program, "espeak-ng");

    clear_env();
}

#[test]
fn threshold_env_switches_upload_to_throttled() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{"upload": {"alerts": {"mode": "unthrottled"}}}"#)
        .expect("write config");
    std::env::set_var("VISION_ALERT_CONFIG", file.path());
    std::env::set_var("VISION_ALERT_THRESHOLD", "0.9");

    let cfg = VisionAlertConfig::load().expect("load config");
    assert_eq!(cfg.upload.mode, AlertMode::Throttled { threshold: 0.9 });

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("VISION_ALERT_FRAME_INTERVAL", "0");
    assert!(VisionAlertConfig::load().is_err());
    clear_env();

    std::env::set_var("VISION_ALERT_FRAME_INTERVAL", "five");
    assert!(VisionAlertConfig::load().is_err());
    clear_env();

    std::env::set_var("VISION_ALERT_THRESHOLD", "1.5");
    assert!(VisionAlertConfig::load().is_err());
    clear_env();

    std::env::set_var("VISION_ALERT_CAMERA", "-1");
    assert!(VisionAlertConfig::load().is_err());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{"speech": {"workers": 0}}"#).expect("write config");
    std::env::set_var("VISION_ALERT_CONFIG", file.path());
    assert!(VisionAlertConfig::load().is_err());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"{ not json").expect("write config");
    std::env::set_var("VISION_ALERT_CONFIG", file.path());
    assert!(VisionAlertConfig::load().is_err());
    clear_env();
}
