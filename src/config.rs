// Engine configuration - RON file with defaults
//
// A missing or unreadable file never prevents the engine from starting: the
// defaults are used and a warning is logged.

use crate::effect::EffectRegistry;
use crate::render::engine::RenderSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("RON serialization error: {0}")]
    Ron(#[from] ron::Error),
}

/// Tunables for the history and render engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Undo/redo depth
    pub undo_capacity: usize,
    /// Memoized renders kept by the render cache
    pub render_cache_capacity: usize,
    /// Samples per automation chunk
    pub automation_chunk_size: usize,
    /// Upper bound for the default fade length
    pub clip_fade_seconds: f64,
    /// Anti-click fade used by reverse, stutter and time-stretch
    pub micro_fade_samples: usize,
    /// Slots in the render worker's notification ring
    pub notification_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            undo_capacity: crate::command::manager::DEFAULT_MAX_HISTORY,
            render_cache_capacity: 32,
            automation_chunk_size: crate::automation::DEFAULT_CHUNK_SIZE,
            clip_fade_seconds: 0.5,
            micro_fade_samples: crate::effect::builtin::DEFAULT_MICRO_FADE_SAMPLES,
            notification_capacity: 64,
        }
    }
}

impl EngineConfig {
    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            automation_chunk_size: self.automation_chunk_size,
            clip_fade_seconds: self.clip_fade_seconds,
            cache_capacity: self.render_cache_capacity,
        }
    }

    /// Registry with the built-in effects tuned by this config
    pub fn registry(&self) -> EffectRegistry {
        EffectRegistry::with_builtins_micro_fade(self.micro_fade_samples)
    }
}

/// `<config dir>/glitch_history/config.ron`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("glitch_history").join("config.ron"))
}

/// Load configuration from a RON file
///
/// If the file doesn't exist, returns the default config.
/// If the file exists but is invalid, logs a warning and returns the default config.
pub fn load_config(path: &Path) -> EngineConfig {
    if !path.exists() {
        log::info!("Config file {:?} not found, using defaults", path);
        return EngineConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match ron::from_str::<EngineConfig>(&contents) {
            Ok(config) => {
                log::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                log::warn!("Failed to parse config {:?}: {}, using defaults", path, e);
                EngineConfig::default()
            }
        },
        Err(e) => {
            log::warn!("Failed to read config {:?}: {}, using defaults", path, e);
            EngineConfig::default()
        }
    }
}

/// Save configuration to a RON file, creating parent directories
pub fn save_config(config: &EngineConfig, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let ron = ron::ser::to_string_pretty(config, ron::ser::PrettyConfig::default())?;
    std::fs::write(path, ron)?;

    log::info!("Config saved to {:?}", path);
    Ok(())
}
