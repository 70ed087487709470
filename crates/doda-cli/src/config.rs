//! Configuration Vault – reads/writes `~/.doda/config.toml`.

use doda_game::{GameConfig, Thresholds};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// API key that is wiped from memory on drop and never printed.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(if self.is_empty() { "<not set>" } else { "<redacted>" })
    }
}

/// Persisted user configuration stored in `~/.doda/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Threshold preset name: `classic` or `quick`.
    #[serde(default = "default_preset")]
    pub thresholds: String,

    /// Explicit win threshold; overrides the preset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub win_threshold: Option<i32>,

    /// Explicit lose threshold; overrides the preset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lose_threshold: Option<i32>,

    /// Where the preference and session files live.  Defaults to
    /// `~/.doda/data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Base URL of an OpenAI-compatible endpoint (Ollama by default).
    #[serde(default = "default_llm_url")]
    pub llm_url: String,

    /// Vision model used to classify gifts.
    #[serde(default = "default_model")]
    pub model: String,

    /// Bearer token for hosted endpoints.
    #[serde(default, skip_serializing_if = "ApiKey::is_empty")]
    pub api_key: ApiKey,

    /// Ask the model for a second-opinion score before falling back to the
    /// keyword table.
    #[serde(default)]
    pub reasoning: bool,

    /// Image file refreshed by an external frame grabber.  Without it a
    /// simulated camera is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_snapshot: Option<PathBuf>,

    /// Reject snapshots older than this many seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_max_age_secs: Option<u64>,

    /// Keep every gift photo and its description under `<data_dir>/gift_photos`.
    #[serde(default)]
    pub keep_photos: bool,

    /// Bound for capture, classification and evaluation.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Behavior playback speed; 0 skips the pauses entirely.
    #[serde(default = "default_time_scale")]
    pub time_scale: f32,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("thresholds", &self.thresholds)
            .field("win_threshold", &self.win_threshold)
            .field("lose_threshold", &self.lose_threshold)
            .field("data_dir", &self.data_dir)
            .field("llm_url", &self.llm_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key)
            .field("reasoning", &self.reasoning)
            .field("camera_snapshot", &self.camera_snapshot)
            .field("snapshot_max_age_secs", &self.snapshot_max_age_secs)
            .field("keep_photos", &self.keep_photos)
            .field("timeout_secs", &self.timeout_secs)
            .field("time_scale", &self.time_scale)
            .finish()
    }
}

fn default_preset() -> String {
    "classic".to_string()
}
fn default_llm_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "llava".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_time_scale() -> f32 {
    1.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            thresholds: default_preset(),
            win_threshold: None,
            lose_threshold: None,
            data_dir: None,
            llm_url: default_llm_url(),
            model: default_model(),
            api_key: ApiKey::default(),
            reasoning: false,
            camera_snapshot: None,
            snapshot_max_age_secs: None,
            keep_photos: false,
            timeout_secs: default_timeout_secs(),
            time_scale: default_time_scale(),
        }
    }
}

impl Config {
    /// Effective thresholds: the preset, with explicit values on top.  An
    /// unknown preset name falls back to `classic`.
    pub fn thresholds(&self) -> Thresholds {
        let base = Thresholds::preset(&self.thresholds).unwrap_or_else(|| {
            warn!(preset = %self.thresholds, "unknown threshold preset; using classic");
            Thresholds::classic()
        });
        Thresholds::new(
            self.win_threshold.unwrap_or(base.win),
            self.lose_threshold.unwrap_or(base.lose),
        )
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| doda_home().join("data"))
    }

    pub fn game_config(&self) -> GameConfig {
        GameConfig::in_dir(self.data_dir(), self.thresholds())
    }

    pub fn photo_dir(&self) -> Option<PathBuf> {
        self.keep_photos.then(|| self.data_dir().join("gift_photos"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

fn doda_home() -> PathBuf {
    PathBuf::from(home_dir()).join(".doda")
}

/// Return the path to `~/.doda/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".doda").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `DODA_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `DODA_LLM_URL` | `llm_url` |
/// | `DODA_MODEL` | `model` |
/// | `DODA_WIN_THRESHOLD` | `win_threshold` |
/// | `DODA_LOSE_THRESHOLD` | `lose_threshold` |
/// | `DODA_DATA_DIR` | `data_dir` |
/// | `DODA_CAMERA_SNAPSHOT` | `camera_snapshot` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("DODA_LLM_URL") {
        cfg.llm_url = v;
    }
    if let Some(v) = lookup("DODA_MODEL") {
        cfg.model = v;
    }
    if let Some(v) = lookup("DODA_WIN_THRESHOLD")
        && let Ok(win) = v.trim().parse::<i32>()
    {
        cfg.win_threshold = Some(win);
    }
    if let Some(v) = lookup("DODA_LOSE_THRESHOLD")
        && let Ok(lose) = v.trim().parse::<i32>()
    {
        cfg.lose_threshold = Some(lose);
    }
    if let Some(v) = lookup("DODA_DATA_DIR") {
        cfg.data_dir = Some(PathBuf::from(v));
    }
    if let Some(v) = lookup("DODA_CAMERA_SNAPSHOT") {
        cfg.camera_snapshot = Some(PathBuf::from(v));
    }
}

/// Save the config to disk, creating `~/.doda/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    // Owner-only (rw-------): the file may hold an API key.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn config_debug_redacts_api_key() {
        let cfg = Config {
            api_key: ApiKey::new("sk-super-secret"),
            ..Config::default()
        };
        let debug_str = format!("{:?}", cfg);
        assert!(!debug_str.contains("sk-super-secret"));
        assert!(debug_str.contains("<redacted>"));
        assert!(format!("{:?}", Config::default()).contains("<not set>"));
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .expect("dir metadata")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn roundtrip_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = Config {
            thresholds: "quick".to_string(),
            keep_photos: true,
            time_scale: 0.5,
            ..Config::default()
        };
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.thresholds, "quick");
        assert_eq!(loaded.model, "llava");
        assert!(loaded.keep_photos);
        assert_eq!(loaded.time_scale, 0.5);
        assert!(loaded.api_key.is_empty());
    }

    #[test]
    fn partial_file_gets_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model = \"moondream\"\n").unwrap();

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.model, "moondream");
        assert_eq!(loaded.thresholds(), Thresholds::classic());
        assert_eq!(loaded.timeout_secs, 30);
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn config_path_points_to_doda_dir() {
        let p = config_path_for_home("/home/testuser");
        assert_eq!(p, PathBuf::from("/home/testuser/.doda/config.toml"));
    }

    #[test]
    fn explicit_thresholds_override_preset() {
        let cfg = Config {
            thresholds: "quick".to_string(),
            lose_threshold: Some(-50),
            ..Config::default()
        };
        assert_eq!(cfg.thresholds(), Thresholds::new(15, -50));

        let unknown = Config {
            thresholds: "marathon".to_string(),
            ..Config::default()
        };
        assert_eq!(unknown.thresholds(), Thresholds::classic());
    }

    #[test]
    fn overrides_apply_and_ignore_garbage() {
        let mut cfg = Config::default();
        apply_overrides(
            &mut cfg,
            vars(&[
                ("DODA_LLM_URL", "http://robot-host:11434"),
                ("DODA_MODEL", "llava:13b"),
                ("DODA_WIN_THRESHOLD", "45"),
                ("DODA_LOSE_THRESHOLD", "minus ten"),
                ("DODA_DATA_DIR", "/tmp/doda"),
                ("DODA_CAMERA_SNAPSHOT", "/tmp/cam.jpg"),
            ]),
        );
        assert_eq!(cfg.llm_url, "http://robot-host:11434");
        assert_eq!(cfg.model, "llava:13b");
        assert_eq!(cfg.win_threshold, Some(45));
        assert_eq!(cfg.lose_threshold, None);
        assert_eq!(cfg.data_dir(), PathBuf::from("/tmp/doda"));
        assert_eq!(cfg.camera_snapshot, Some(PathBuf::from("/tmp/cam.jpg")));
        assert_eq!(cfg.thresholds(), Thresholds::new(45, -30));
    }

    #[test]
    fn game_config_points_into_data_dir() {
        let cfg = Config {
            data_dir: Some(PathBuf::from("/srv/doda")),
            keep_photos: true,
            ..Config::default()
        };
        let game = cfg.game_config();
        assert_eq!(
            game.preferences_path,
            Some(PathBuf::from("/srv/doda").join(doda_game::config::PREFERENCES_FILE))
        );
        assert_eq!(cfg.photo_dir(), Some(PathBuf::from("/srv/doda/gift_photos")));
    }
}
