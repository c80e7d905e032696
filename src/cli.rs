use crate::config::ReloadConfigOverrides;
use crate::slot::SlotKey;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOverrides {
    config: Option<PathBuf>,
    roots: Vec<PathBuf>,
    slots: Vec<SlotKey>,
    debounce_ms: Option<u64>,
    ticks: Option<u64>,
}

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            let Some(key) = flag.strip_prefix("--") else {
                bail!("Unexpected argument '{flag}'. Use --root/--slot/--config/--debounce/--ticks with values.");
            };
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "config" => overrides.config = Some(PathBuf::from(value)),
                "root" => overrides.roots.push(PathBuf::from(value)),
                "slot" => {
                    let slot = SlotKey::parse(&value).ok_or_else(|| anyhow!("Invalid slot '{value}'"))?;
                    if !overrides.slots.contains(&slot) {
                        overrides.slots.push(slot);
                    }
                }
                "debounce" => {
                    overrides.debounce_ms =
                        Some(value.parse::<u64>().with_context(|| format!("Invalid debounce '{value}'"))?);
                }
                "ticks" => {
                    overrides.ticks =
                        Some(value.parse::<u64>().with_context(|| format!("Invalid tick count '{value}'"))?);
                }
                _ => bail!("Unknown flag '{flag}'. Supported flags: --root, --slot, --config, --debounce, --ticks."),
            }
        }
        Ok(overrides)
    }

    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config.as_ref()
    }

    /// Frames to run before exiting; `None` runs until interrupted.
    pub fn ticks(&self) -> Option<u64> {
        self.ticks
    }

    pub fn into_config_overrides(self) -> ReloadConfigOverrides {
        ReloadConfigOverrides { roots: self.roots, slots: self.slots, debounce_ms: self.debounce_ms }
    }
}
