use crate::host::PathResolver;
use crate::pending::PendingChangeSet;
use crate::slot::{PaletteLayout, SlotKey};
use anyhow::{anyhow, Context, Result};
use notify::event::{MetadataKind, ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Handed to a watch callback; marks its slot dirty when the watched file changes.
#[derive(Debug, Clone)]
pub struct DirtyNotifier {
    slot: SlotKey,
    pending: PendingChangeSet,
}

impl DirtyNotifier {
    pub fn new(slot: SlotKey, pending: PendingChangeSet) -> Self {
        Self { slot, pending }
    }

    pub fn slot(&self) -> &SlotKey {
        &self.slot
    }

    pub fn notify(&self) {
        self.pending.mark_dirty(self.slot.clone());
    }
}

/// Installs one file watch per call. Dropping the returned handle releases the watch.
pub trait WatchBackend {
    type Handle;

    fn install(&mut self, path: &Path, notifier: DirtyNotifier) -> Result<Self::Handle>;
}

/// Filesystem watches backed by `notify`.
///
/// Each handle owns its own watcher on the file's parent directory; events
/// are filtered down to the watched file name and to content or write-time
/// changes, so sibling renames and deletions never fire.
#[derive(Debug, Clone)]
pub struct NotifyBackend {
    poll_interval: Duration,
}

impl NotifyBackend {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    fn touches_file(event: &Event, file_name: &OsString) -> bool {
        let matches_name = |path: &PathBuf| path.file_name() == Some(file_name.as_os_str());
        match event.kind {
            EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime))
            | EventKind::Modify(ModifyKind::Name(RenameMode::To))
            | EventKind::Create(_) => event.paths.iter().any(matches_name),
            // Editors that save through a temp file rename it onto the target.
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event.paths.last().is_some_and(matches_name),
            _ => false,
        }
    }
}

impl Default for NotifyBackend {
    fn default() -> Self {
        Self::new(Duration::from_millis(250))
    }
}

pub struct NotifyWatch {
    _watcher: RecommendedWatcher,
}

impl WatchBackend for NotifyBackend {
    type Handle = NotifyWatch;

    fn install(&mut self, path: &Path, notifier: DirtyNotifier) -> Result<NotifyWatch> {
        let directory = path.parent().ok_or_else(|| anyhow!("'{}' has no parent directory", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| anyhow!("'{}' has no file name", path.display()))?;
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if Self::touches_file(&event, &file_name) {
                    trace!(slot = %notifier.slot(), kind = ?event.kind, "palette file event");
                    notifier.notify();
                }
            }
            Err(err) => trace!(slot = %notifier.slot(), error = %err, "palette watcher error"),
        })
        .context("create palette watcher")?;
        if let Err(err) = watcher.configure(
            NotifyConfig::default().with_compare_contents(false).with_poll_interval(self.poll_interval),
        ) {
            warn!(error = %err, "palette watcher configuration warning");
        }
        watcher
            .watch(directory, RecursiveMode::NonRecursive)
            .with_context(|| format!("watch {}", directory.display()))?;
        Ok(NotifyWatch { _watcher: watcher })
    }
}

/// A live watch for one slot.
pub struct WatchBinding<H> {
    path: PathBuf,
    handle: H,
}

impl<H> WatchBinding<H> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParkedSlot {
    Unresolved,
    InstallFailed(PathBuf),
}

/// What a single `reconcile` call changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub installed: Vec<SlotKey>,
    pub released: Vec<SlotKey>,
    /// Slots that stopped resolving to a file during this call.
    pub unresolved: Vec<SlotKey>,
    pub install_failed: Vec<(SlotKey, String)>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.installed.is_empty()
            && self.released.is_empty()
            && self.unresolved.is_empty()
            && self.install_failed.is_empty()
    }
}

/// Keeps exactly one watch per active slot, re-pointing it when the slot's
/// resolved file changes and releasing it when the slot goes inactive.
///
/// Only the frame thread touches the registry; watch callbacks reach the
/// frame thread solely through the shared [`PendingChangeSet`].
pub struct WatchRegistry<B: WatchBackend> {
    backend: B,
    layout: PaletteLayout,
    pending: PendingChangeSet,
    bindings: HashMap<SlotKey, WatchBinding<B::Handle>>,
    parked: HashMap<SlotKey, ParkedSlot>,
}

impl<B: WatchBackend> WatchRegistry<B> {
    pub fn new(backend: B, layout: PaletteLayout, pending: PendingChangeSet) -> Self {
        Self { backend, layout, pending, bindings: HashMap::new(), parked: HashMap::new() }
    }

    pub fn layout(&self) -> &PaletteLayout {
        &self.layout
    }

    pub fn pending(&self) -> &PendingChangeSet {
        &self.pending
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn reconcile<R: PathResolver + ?Sized>(
        &mut self,
        active: &HashSet<SlotKey>,
        resolver: &R,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let inactive: Vec<SlotKey> = self.bindings.keys().filter(|slot| !active.contains(*slot)).cloned().collect();
        for slot in inactive {
            if self.release(&slot) {
                report.released.push(slot);
            }
        }
        self.parked.retain(|slot, _| active.contains(slot));

        for slot in active {
            let logical = slot.logical_path(&self.layout);
            let resolved = resolver.resolve(&logical).filter(|path| path.is_file());
            match resolved {
                None => {
                    if self.release(slot) {
                        report.released.push(slot.clone());
                    }
                    if self.parked.get(slot) != Some(&ParkedSlot::Unresolved) {
                        warn!(slot = %slot, logical = %logical, "palette not found; hot reload disabled for slot");
                        self.parked.insert(slot.clone(), ParkedSlot::Unresolved);
                        report.unresolved.push(slot.clone());
                    }
                }
                Some(path) => {
                    if self.bindings.get(slot).is_some_and(|binding| binding.path == path) {
                        continue;
                    }
                    if let Some(ParkedSlot::InstallFailed(failed)) = self.parked.get(slot) {
                        if *failed == path {
                            continue;
                        }
                    }
                    if self.release(slot) {
                        report.released.push(slot.clone());
                    }
                    let notifier = DirtyNotifier::new(slot.clone(), self.pending.clone());
                    match self.backend.install(&path, notifier) {
                        Ok(handle) => {
                            debug!(slot = %slot, path = %path.display(), "watching palette");
                            self.parked.remove(slot);
                            self.bindings.insert(slot.clone(), WatchBinding { path, handle });
                            report.installed.push(slot.clone());
                        }
                        Err(err) => {
                            warn!(slot = %slot, path = %path.display(), error = %err, "failed to watch palette");
                            report.install_failed.push((slot.clone(), format!("{err:#}")));
                            self.parked.insert(slot.clone(), ParkedSlot::InstallFailed(path));
                        }
                    }
                }
            }
        }
        report
    }

    /// Drops the slot's watch, if it has one.
    pub fn release(&mut self, slot: &SlotKey) -> bool {
        match self.bindings.remove(slot) {
            Some(binding) => {
                debug!(slot = %slot, path = %binding.path.display(), "released palette watch");
                true
            }
            None => false,
        }
    }

    pub fn release_all(&mut self) -> usize {
        let slots: Vec<SlotKey> = self.bindings.keys().cloned().collect();
        slots.iter().filter(|slot| self.release(slot)).count()
    }

    pub fn binding(&self, slot: &SlotKey) -> Option<&WatchBinding<B::Handle>> {
        self.bindings.get(slot)
    }

    pub fn watched_path(&self, slot: &SlotKey) -> Option<&Path> {
        self.bindings.get(slot).map(|binding| binding.path.as_path())
    }

    pub fn is_watching(&self, slot: &SlotKey) -> bool {
        self.bindings.contains_key(slot)
    }

    pub fn watched_slots(&self) -> impl Iterator<Item = &SlotKey> {
        self.bindings.keys()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
