//! Configuration – reads/writes `~/.tfboard/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use tfboard_middleware::{ColorMode, ViewerSettings};
use tfboard_perception::MAX_FRAME_DEPTH;
use tfboard_types::BoardError;

/// Persisted user configuration stored in `~/.tfboard/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Frame every layer is drawn in. Empty draws data in its own frame.
    #[serde(default)]
    pub base_frame: String,

    /// Render every Nth point of each cloud.
    #[serde(default = "default_decimation_stride")]
    pub decimation_stride: usize,

    /// Hop bound for frame-graph walks.
    #[serde(default = "default_max_frame_depth")]
    pub max_frame_depth: usize,

    #[serde(default = "default_point_size")]
    pub point_size: f32,

    #[serde(default)]
    pub color_mode: ColorMode,
}

fn default_decimation_stride() -> usize {
    1
}
fn default_max_frame_depth() -> usize {
    MAX_FRAME_DEPTH
}
fn default_point_size() -> f32 {
    1.5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_frame: String::new(),
            decimation_stride: default_decimation_stride(),
            max_frame_depth: default_max_frame_depth(),
            point_size: default_point_size(),
            color_mode: ColorMode::default(),
        }
    }
}

impl Config {
    /// Viewer knobs derived from this config.
    pub fn viewer_settings(&self) -> ViewerSettings {
        ViewerSettings {
            decimation_stride: self.decimation_stride.max(1),
            base_frame: self.base_frame.clone(),
            color_mode: self.color_mode,
            point_size: self.point_size,
            ..ViewerSettings::default()
        }
    }
}

/// Return the path to `~/.tfboard/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".tfboard").join("config.toml")
}

/// Load the effective config: the file at [`config_path`] (defaults when it
/// does not exist) with `TFBOARD_*` overrides applied.
pub fn load() -> Result<Config, BoardError> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Parse the config file at `path` as written.  Returns `None` if the file
/// does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, BoardError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| BoardError::Config(format!("Failed to read config at {}: {}", path.display(), e)))?;
    toml::from_str(&raw)
        .map(Some)
        .map_err(|e| BoardError::Config(format!("Failed to parse config: {}", e)))
}

/// Apply `TFBOARD_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TFBOARD_BASE_FRAME` | `base_frame` |
/// | `TFBOARD_DECIMATION_STRIDE` | `decimation_stride` |
/// | `TFBOARD_MAX_FRAME_DEPTH` | `max_frame_depth` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("TFBOARD_BASE_FRAME") {
        cfg.base_frame = v;
    }
    if let Ok(v) = std::env::var("TFBOARD_DECIMATION_STRIDE")
        && let Ok(stride) = v.parse::<usize>()
    {
        cfg.decimation_stride = stride;
    }
    if let Ok(v) = std::env::var("TFBOARD_MAX_FRAME_DEPTH")
        && let Ok(depth) = v.parse::<usize>()
    {
        cfg.max_frame_depth = depth;
    }
}

/// Write a default config to [`config_path`], creating `~/.tfboard/` if
/// necessary.  An existing file is left alone; returns `true` when a file
/// was written.
pub fn init() -> Result<bool, BoardError> {
    init_at(&config_path())
}

/// Write a default config to `path` unless one already exists.
///
/// Returns `true` when a file was written.
pub(crate) fn init_at(path: &Path) -> Result<bool, BoardError> {
    if path.exists() {
        return Ok(false);
    }
    save_to(&Config::default(), path)?;
    Ok(true)
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), BoardError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| BoardError::Config(format!("Failed to create config directory: {}", e)))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| BoardError::Config(format!("Failed to set config directory permissions: {}", e)))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| BoardError::Config(format!("Failed to serialize config: {}", e)))?;
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
            .map_err(|e| BoardError::Config(format!("Failed to write config at {}: {}", path.display(), e)))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| BoardError::Config(format!("Failed to write config at {}: {}", path.display(), e)))?;
    Ok(())
}
