//! Configuration – reads/writes `~/.hyperspace/config.toml`.

use hyperspace_runtime::{LogFormat, SetupConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Frames per second of the main loop.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// Stop after this many frames; run until Ctrl-C when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_frames: Option<u64>,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Scene description; the built-in demo when the table is missing.
    #[serde(default = "SetupConfig::demo")]
    pub setup: SetupConfig,
}

fn default_frame_rate() -> u32 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            max_frames: None,
            log_format: LogFormat::default(),
            setup: SetupConfig::demo(),
        }
    }
}

/// Return the path to `~/.hyperspace/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".hyperspace").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `HYPERSPACE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `HYPERSPACE_FRAME_RATE` | `frame_rate` |
/// | `HYPERSPACE_MAX_FRAMES` | `max_frames` |
/// | `HYPERSPACE_TOTAL_GLASSES` | `setup.total_glasses` |
/// | `HYPERSPACE_SHUTTER_CONFIG` | `setup.shutter_config_path` |
///
/// Unparsable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("HYPERSPACE_FRAME_RATE")
        && let Ok(rate) = v.parse::<u32>()
        && rate > 0
    {
        cfg.frame_rate = rate;
    }
    if let Ok(v) = std::env::var("HYPERSPACE_MAX_FRAMES")
        && let Ok(frames) = v.parse::<u64>()
    {
        cfg.max_frames = Some(frames);
    }
    if let Ok(v) = std::env::var("HYPERSPACE_TOTAL_GLASSES")
        && let Ok(total) = v.parse::<u32>()
    {
        cfg.setup.total_glasses = total;
    }
    if let Ok(v) = std::env::var("HYPERSPACE_SHUTTER_CONFIG")
        && !v.is_empty()
    {
        cfg.setup.shutter_config_path = Some(PathBuf::from(v));
    }
}

/// Save the config to disk, creating `~/.hyperspace/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
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
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
