//! Engine configuration loaded from `fable.toml`.
//!
//! Every field has a default, so a partial file only overrides what it names.
//! A missing or unparseable file is not fatal: the engine logs a warning and
//! runs with [`EngineConfig::default`].

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shortest per-character reveal delay regardless of text speed.
const MIN_CHAR_DELAY_MS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Typewriter speed; higher is faster.
    pub text_speed: u32,
    pub auto_advance_ms: u64,
    pub toast_ms: u64,
    pub inventory_capacity: usize,
    pub default_stack_limit: u32,
    pub save_slots: usize,
    pub save_dir: PathBuf,
    /// Refuse to start when story validation reports problems.
    pub strict_validation: bool,
    /// Seed for check rolls and random events; entropy when absent.
    pub rng_seed: Option<u64>,
    /// Story file, relative to the data directory.
    pub story_file: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            text_speed: 5,
            auto_advance_ms: 500,
            toast_ms: 1000,
            inventory_capacity: 20,
            default_stack_limit: 99,
            save_slots: 10,
            save_dir: PathBuf::from(crate::save_files::SAVE_DIR),
            strict_validation: false,
            rng_seed: None,
            story_file: PathBuf::from("story.ron"),
        }
    }
}

impl EngineConfig {
    /// Delay between revealed characters: `max(10, 60 - text_speed * 5)` milliseconds.
    pub fn char_delay(&self) -> Duration {
        let speed_ms = u64::from(self.text_speed.saturating_mul(5));
        Duration::from_millis(60u64.saturating_sub(speed_ms).max(MIN_CHAR_DELAY_MS))
    }

    pub fn auto_advance(&self) -> Duration {
        Duration::from_millis(self.auto_advance_ms)
    }

    pub fn toast(&self) -> Duration {
        Duration::from_millis(self.toast_ms)
    }

    pub fn limits(&self) -> InventoryLimits {
        InventoryLimits {
            capacity: self.inventory_capacity,
            default_stack_limit: self.default_stack_limit.max(1),
        }
    }
}

/// Inventory bounds applied by the effect applier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryLimits {
    /// Maximum number of stacks.
    pub capacity: usize,
    /// Stack cap for items that do not declare their own.
    pub default_stack_limit: u32,
}

impl Default for InventoryLimits {
    fn default() -> Self {
        EngineConfig::default().limits()
    }
}

/// Loads engine configuration from a TOML file, falling back to defaults on error.
pub fn load_config(toml_path: &Path) -> EngineConfig {
    match try_load_config(toml_path) {
        Ok(config) => {
            info!("engine configuration loaded from '{}'", toml_path.display());
            config
        },
        Err(e) => {
            warn!(
                "Could not load engine configuration from '{}': {:#}. Using defaults.",
                toml_path.display(),
                e
            );
            EngineConfig::default()
        },
    }
}

/// Parse an engine configuration from TOML text.
///
/// # Errors
/// Returns an error if the text is not valid TOML for [`EngineConfig`].
pub fn parse_config(raw: &str) -> Result<EngineConfig> {
    let mut config: EngineConfig = toml::from_str(raw).context("parsing engine configuration")?;
    if config.default_stack_limit == 0 {
        warn!("default_stack_limit must be at least 1; using 1");
        config.default_stack_limit = 1;
    }
    Ok(config)
}

fn try_load_config(toml_path: &Path) -> Result<EngineConfig> {
    let raw = fs::read_to_string(toml_path)
        .with_context(|| format!("reading engine configuration from '{}'", toml_path.display()))?;
    parse_config(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = parse_config("text_speed = 8\ninventory_capacity = 5\n").expect("valid toml");
        assert_eq!(config.text_speed, 8);
        assert_eq!(config.inventory_capacity, 5);
        assert_eq!(config.auto_advance_ms, 500);
        assert_eq!(config.save_slots, 10);
    }

    #[test]
    fn zero_stack_limit_is_raised_to_one() {
        let config = parse_config("default_stack_limit = 0\n").expect("valid toml");
        assert_eq!(config.default_stack_limit, 1);

        let config = EngineConfig {
            default_stack_limit: 0,
            ..EngineConfig::default()
        };
        assert_eq!(config.limits().default_stack_limit, 1);
    }

    #[test]
    fn char_delay_has_a_floor() {
        let mut config = EngineConfig::default();
        assert_eq!(config.char_delay(), Duration::from_millis(35));
        config.text_speed = 20;
        assert_eq!(config.char_delay(), Duration::from_millis(10));
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("fable.toml");
        fs::write(&path, "text_speed = \"fast\"")?;
        assert_eq!(load_config(&path), EngineConfig::default());
        assert_eq!(load_config(&dir.path().join("missing.toml")), EngineConfig::default());
        Ok(())
    }
}
