use serde::Deserialize;
use std::fmt;

/// Identifies which palette role a piece of render state is bound to.
///
/// Camera palettes are numbered, terrain palettes are named. Keys compare by
/// equality only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotKey {
    Index(u32),
    Named(String),
}

impl SlotKey {
    pub fn named(name: impl Into<String>) -> Self {
        SlotKey::Named(name.into())
    }

    /// Parses a command-line style slot: digits become an index, anything else a name.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.parse::<u32>() {
            Ok(index) => Some(SlotKey::Index(index)),
            Err(_) => Some(SlotKey::Named(trimmed.to_string())),
        }
    }

    pub fn family(&self) -> &'static str {
        match self {
            SlotKey::Index(_) => "palette",
            SlotKey::Named(_) => "terrain",
        }
    }

    /// Logical path of the slot's palette file, relative to the asset roots.
    pub fn logical_path(&self, layout: &PaletteLayout) -> String {
        let template = match self {
            SlotKey::Index(_) => &layout.indexed,
            SlotKey::Named(_) => &layout.named,
        };
        template.replacen("{}", &self.to_string(), 1)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKey::Index(index) => write!(f, "{index}"),
            SlotKey::Named(name) => f.write_str(name),
        }
    }
}

impl From<u32> for SlotKey {
    fn from(index: u32) -> Self {
        SlotKey::Index(index)
    }
}

impl From<&str> for SlotKey {
    fn from(name: &str) -> Self {
        SlotKey::Named(name.to_string())
    }
}

/// Path templates for each slot family. `{}` is replaced by the slot's display form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaletteLayout {
    #[serde(default = "PaletteLayout::default_indexed")]
    pub indexed: String,
    #[serde(default = "PaletteLayout::default_named")]
    pub named: String,
}

impl PaletteLayout {
    fn default_indexed() -> String {
        "palettes/palette{}.png".to_string()
    }

    fn default_named() -> String {
        "palettes/terrain/{}.png".to_string()
    }
}

impl Default for PaletteLayout {
    fn default() -> Self {
        Self { indexed: Self::default_indexed(), named: Self::default_named() }
    }
}
