use crate::host::{PaletteHost, PathResolver, TextureUploader};
use crate::pending::PendingChangeSet;
use crate::slot::{PaletteLayout, SlotKey};
use crate::watch::{ReconcileReport, WatchBackend, WatchRegistry};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadOptions {
    /// A dirty slot is only read once its latest change is this old.
    pub debounce: Duration,
    /// Skip uploads whose bytes match what was last applied for the slot.
    pub skip_unchanged: bool,
}

impl Default for ReloadOptions {
    fn default() -> Self {
        Self { debounce: Duration::from_millis(50), skip_unchanged: true }
    }
}

/// What happened to one drained slot during a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome {
    Reloaded,
    /// Bytes identical to the last applied upload.
    Unchanged,
    /// Neither active nor held by the host any more.
    Stale,
    Unresolved,
    Unreadable { path: PathBuf, error: String },
    DecodeFailed { error: String },
}

#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub reconcile: ReconcileReport,
    pub outcomes: Vec<(SlotKey, SlotOutcome)>,
    pub committed: bool,
    pub elapsed: Duration,
}

impl FrameReport {
    pub fn outcome(&self, slot: &SlotKey) -> Option<&SlotOutcome> {
        self.outcomes.iter().find(|(key, _)| key == slot).map(|(_, outcome)| outcome)
    }

    pub fn reloaded(&self) -> impl Iterator<Item = &SlotKey> {
        self.outcomes.iter().filter(|(_, outcome)| *outcome == SlotOutcome::Reloaded).map(|(slot, _)| slot)
    }

    pub fn reload_count(&self) -> usize {
        self.reloaded().count()
    }
}

/// Drives the per-frame reload cycle: reconcile watches, drain dirty slots,
/// reload each once, then commit everything in a single call.
pub struct ReloadCoordinator<B: WatchBackend, R, U> {
    registry: WatchRegistry<B>,
    pending: PendingChangeSet,
    resolver: R,
    uploader: U,
    options: ReloadOptions,
    applied: HashMap<SlotKey, blake3::Hash>,
    frames: u64,
}

impl<B, R, U> ReloadCoordinator<B, R, U>
where
    B: WatchBackend,
    R: PathResolver,
    U: TextureUploader,
{
    pub fn new(backend: B, resolver: R, uploader: U, layout: PaletteLayout, options: ReloadOptions) -> Self {
        let pending = PendingChangeSet::new();
        let registry = WatchRegistry::new(backend, layout, pending.clone());
        Self { registry, pending, resolver, uploader, options, applied: HashMap::new(), frames: 0 }
    }

    /// Handle for producers other than the registry's watches.
    pub fn pending(&self) -> &PendingChangeSet {
        &self.pending
    }

    pub fn registry(&self) -> &WatchRegistry<B> {
        &self.registry
    }

    pub fn options(&self) -> ReloadOptions {
        self.options
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn on_frame_tick<H>(&mut self, host: &mut H) -> FrameReport
    where
        H: PaletteHost<Texture = U::Texture>,
    {
        let start = Instant::now();
        self.frames += 1;

        let active = host.active_slots();
        let reconcile = self.registry.reconcile(&active, &self.resolver);
        let registry = &self.registry;
        self.applied.retain(|slot, _| registry.is_watching(slot));

        let changed = self.pending.drain_settled(self.options.debounce);
        let mut outcomes = Vec::with_capacity(changed.len());
        for slot in changed {
            let outcome = if active.contains(&slot) || host.texture(&slot).is_some() {
                self.reload_slot(&slot, host)
            } else {
                trace!(slot = %slot, "dropping change for inactive palette");
                SlotOutcome::Stale
            };
            outcomes.push((slot, outcome));
        }

        let reloaded = outcomes.iter().filter(|(_, outcome)| *outcome == SlotOutcome::Reloaded).count();
        let committed = reloaded > 0;
        if committed {
            host.commit();
            info!(reloaded, "committed palette reload");
        }

        let elapsed = start.elapsed();
        if !outcomes.is_empty() || !reconcile.is_noop() {
            debug!(frame = self.frames, elapsed_ms = elapsed.as_secs_f64() * 1000.0, "palette reload check");
        }
        FrameReport { reconcile, outcomes, committed, elapsed }
    }

    /// Releases every watch and forgets pending changes.
    pub fn shutdown(&mut self) {
        let released = self.registry.release_all();
        let discarded = self.pending.drain_all().len();
        self.applied.clear();
        debug!(released, discarded, "palette hot reload stopped");
    }

    fn reload_slot<H>(&mut self, slot: &SlotKey, host: &mut H) -> SlotOutcome
    where
        H: PaletteHost<Texture = U::Texture>,
    {
        let logical = slot.logical_path(self.registry.layout());
        let Some(path) = self.resolver.resolve(&logical) else {
            warn!(slot = %slot, logical = %logical, "changed palette no longer resolves");
            return SlotOutcome::Unresolved;
        };
        let bytes = match read_palette(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(slot = %slot, path = %path.display(), error = %err, "could not read modified palette");
                return SlotOutcome::Unreadable { path, error: err.to_string() };
            }
        };
        let fingerprint = blake3::hash(&bytes);
        if self.options.skip_unchanged && self.applied.get(slot) == Some(&fingerprint) {
            debug!(slot = %slot, "palette bytes unchanged; skipping upload");
            return SlotOutcome::Unchanged;
        }
        match self.uploader.decode_and_upload(slot, &bytes) {
            Ok(texture) => {
                host.replace_texture(slot, texture);
                self.applied.insert(slot.clone(), fingerprint);
                info!(slot = %slot, path = %path.display(), "reloaded palette");
                SlotOutcome::Reloaded
            }
            Err(err) => {
                let error = format!("{err:#}");
                warn!(slot = %slot, path = %path.display(), %error, "palette failed to decode");
                SlotOutcome::DecodeFailed { error }
            }
        }
    }
}

fn read_palette(path: &Path) -> std::io::Result<Vec<u8>> {
    let bytes = fs::read(path)?;
    if bytes.is_empty() {
        // A truncate-then-write save shows up as an empty file first.
        return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "palette file is empty"));
    }
    Ok(bytes)
}
