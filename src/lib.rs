//! Live reload of palette textures for a running renderer.
//!
//! A [`ReloadCoordinator`] is driven once per frame by the host. It keeps one
//! file watch per active palette slot, collects change notifications from
//! watcher threads into a [`PendingChangeSet`], and reloads each changed slot
//! at most once per frame before asking the host to commit.

pub mod cli;
pub mod config;
pub mod decode;
pub mod host;
pub mod pending;
pub mod reload;
pub mod slot;
pub mod watch;

#[cfg(test)]
mod test_support;

pub use config::ReloadConfig;
pub use decode::{PaletteDecoder, PaletteImage, PaletteSize};
pub use host::{PaletteHost, PathResolver, SearchPathResolver, TextureUploader};
pub use pending::PendingChangeSet;
pub use reload::{FrameReport, ReloadCoordinator, ReloadOptions, SlotOutcome};
pub use slot::{PaletteLayout, SlotKey};
pub use watch::{DirtyNotifier, NotifyBackend, ReconcileReport, WatchBackend, WatchRegistry};
