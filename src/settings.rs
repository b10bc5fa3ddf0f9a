use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::raymarch::{DEFAULT_FIELD_SIZE, DEFAULT_STEPS, MAX_STEPS};
use crate::rule::RuleOverrides;

pub const SETTINGS_FILE_NAME: &str = "weighted_life.json";
pub const SETTINGS_ENV_VAR: &str = "WEIGHTED_LIFE_SETTINGS";

const MAX_GRID_DIM: u32 = 8192;
const MAX_FIELD_SIZE: u32 = 256;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LifeSettings {
    pub width: u32,
    pub height: u32,
    /// Pins the born mask instead of drawing it at random.
    pub born_override: Option<i64>,
    pub survive_override: Option<i64>,
    /// Seed for the initial grid, rule and palette; entropy when absent.
    pub seed: Option<u64>,
    /// Upper bound on ticks per second, 0 = uncapped.
    pub limit_fps: f32,
}

impl Default for LifeSettings {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            born_override: None,
            survive_override: None,
            seed: None,
            limit_fps: 60.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RaymarchSettings {
    pub field_size: u32,
    pub steps: u32,
    pub fov_y_degrees: f32,
    pub camera_position: [f32; 3],
    pub seed: Option<u64>,
}

impl Default for RaymarchSettings {
    fn default() -> Self {
        Self {
            field_size: DEFAULT_FIELD_SIZE,
            steps: DEFAULT_STEPS,
            fov_y_degrees: 39.0,
            camera_position: [2.0, 2.0, 2.0],
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub life: LifeSettings,
    pub raymarch: RaymarchSettings,
}

impl Settings {
    /// `$WEIGHTED_LIFE_SETTINGS` if set, else `weighted_life.json` in the
    /// working directory.
    pub fn default_path() -> PathBuf {
        if let Some(path) = std::env::var_os(SETTINGS_ENV_VAR) {
            return PathBuf::from(path);
        }
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(SETTINGS_FILE_NAME)
    }

    pub fn load_from_disk(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&data)?;
        Ok(settings)
    }

    pub fn save_to_disk(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Defaults when the file does not exist; parse errors still surface.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            log::info!("no settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let mut settings = Self::load_from_disk(path)?;
        settings.sanitize();
        log::info!("loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Clamps values that only affect display into usable ranges.
    pub fn sanitize(&mut self) {
        self.life.width = self.life.width.min(MAX_GRID_DIM);
        self.life.height = self.life.height.min(MAX_GRID_DIM);
        if !self.life.limit_fps.is_finite() {
            self.life.limit_fps = 0.0;
        }
        self.life.limit_fps = self.life.limit_fps.clamp(0.0, 1000.0);
        self.raymarch.field_size = self.raymarch.field_size.min(MAX_FIELD_SIZE);
        self.raymarch.steps = self.raymarch.steps.min(MAX_STEPS);
        if !self.raymarch.fov_y_degrees.is_finite() {
            self.raymarch.fov_y_degrees = RaymarchSettings::default().fov_y_degrees;
        }
        self.raymarch.fov_y_degrees = self.raymarch.fov_y_degrees.clamp(1.0, 170.0);
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.rule_overrides().validate()?;
        if self.life.width == 0 || self.life.height == 0 {
            return Err(ConfigurationError::EmptyGrid {
                width: self.life.width,
                height: self.life.height,
            });
        }
        if self.raymarch.field_size == 0 {
            return Err(ConfigurationError::EmptyField);
        }
        if self.raymarch.steps == 0 || self.raymarch.steps > MAX_STEPS {
            return Err(ConfigurationError::InvalidStepCount(self.raymarch.steps as f32));
        }
        Ok(())
    }

    pub fn rule_overrides(&self) -> RuleOverrides {
        RuleOverrides {
            born: self.life.born_override,
            survive: self.life.survive_override,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_clamps_display_values() {
        let mut settings = Settings::default();
        settings.life.limit_fps = f32::NAN;
        settings.raymarch.fov_y_degrees = 500.0;
        settings.life.width = 1 << 20;
        settings.sanitize();
        assert_eq!(settings.life.limit_fps, 0.0);
        assert_eq!(settings.raymarch.fov_y_degrees, 170.0);
        assert_eq!(settings.life.width, MAX_GRID_DIM);
    }

    #[test]
    fn save_then_load_preserves_overrides() {
        let dir = std::env::temp_dir().join(format!("weighted_life_settings_{}", std::process::id()));
        let path = dir.join(SETTINGS_FILE_NAME);
        let mut settings = Settings::default();
        settings.life.born_override = Some(113);
        settings.life.seed = Some(7);
        settings.save_to_disk(&path).unwrap();
        let loaded = Settings::load_from_disk(&path).unwrap();
        assert_eq!(loaded, settings);
        let _ = fs::remove_dir_all(&dir);
    }
}
