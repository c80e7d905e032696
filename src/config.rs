use crate::decode::PaletteSize;
use crate::reload::ReloadOptions;
use crate::slot::{PaletteLayout, SlotKey};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct ReloadConfig {
    #[serde(default = "ReloadConfig::default_roots")]
    pub roots: Vec<PathBuf>,
    #[serde(default = "ReloadConfig::default_prefer_last_root")]
    pub prefer_last_root: bool,
    /// Slots the standalone watcher keeps active, e.g. `["0", "1", "terrain-main"]`.
    #[serde(default = "ReloadConfig::default_slots")]
    pub slots: Vec<String>,
    #[serde(default)]
    pub layout: PaletteLayout,
    #[serde(default)]
    pub palette: PaletteSize,
    #[serde(default = "ReloadConfig::default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "ReloadConfig::default_skip_unchanged")]
    pub skip_unchanged: bool,
    #[serde(default = "ReloadConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "ReloadConfig::default_tick_ms")]
    pub tick_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadConfigOverrides {
    pub roots: Vec<PathBuf>,
    pub slots: Vec<SlotKey>,
    pub debounce_ms: Option<u64>,
}

impl ReloadConfig {
    fn default_roots() -> Vec<PathBuf> {
        vec![PathBuf::from(".")]
    }

    const fn default_prefer_last_root() -> bool {
        true
    }

    fn default_slots() -> Vec<String> {
        vec!["0".to_string()]
    }

    const fn default_debounce_ms() -> u64 {
        50
    }

    const fn default_skip_unchanged() -> bool {
        true
    }

    const fn default_poll_interval_ms() -> u64 {
        250
    }

    const fn default_tick_ms() -> u64 {
        16
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                let error = format!("{err:#}");
                warn!(%error, "config load error; falling back to defaults");
                Self::default()
            }
        }
    }

    /// Command-line roots and slots replace the configured lists rather than extending them.
    pub fn apply_overrides(&mut self, overrides: &ReloadConfigOverrides) {
        if !overrides.roots.is_empty() {
            self.roots = overrides.roots.clone();
        }
        if !overrides.slots.is_empty() {
            self.slots = overrides.slots.iter().map(|slot| slot.to_string()).collect();
        }
        if let Some(debounce_ms) = overrides.debounce_ms {
            self.debounce_ms = debounce_ms;
        }
    }

    pub fn active_slots(&self) -> Vec<SlotKey> {
        self.slots.iter().filter_map(|raw| SlotKey::parse(raw)).collect()
    }

    pub fn reload_options(&self) -> ReloadOptions {
        ReloadOptions { debounce: Duration::from_millis(self.debounce_ms), skip_unchanged: self.skip_unchanged }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            roots: Self::default_roots(),
            prefer_last_root: Self::default_prefer_last_root(),
            slots: Self::default_slots(),
            layout: PaletteLayout::default(),
            palette: PaletteSize::default(),
            debounce_ms: Self::default_debounce_ms(),
            skip_unchanged: Self::default_skip_unchanged(),
            poll_interval_ms: Self::default_poll_interval_ms(),
            tick_ms: Self::default_tick_ms(),
        }
    }
}

impl ReloadConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty() && self.slots.is_empty() && self.debounce_ms.is_none()
    }
}
