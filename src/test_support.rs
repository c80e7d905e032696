//! Shared doubles for unit tests.

use crate::decode::PaletteImage;
use crate::host::PaletteHost;
use crate::slot::SlotKey;
use crate::watch::{DirtyNotifier, WatchBackend};
use anyhow::{bail, Result};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub(crate) fn encode_palette(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(color));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png).expect("png encodes");
    bytes
}

pub(crate) fn write_palette(root: &Path, logical: &str, width: u32, height: u32) -> PathBuf {
    write_palette_color(root, logical, width, height, [0, 0, 0, 255])
}

pub(crate) fn write_palette_color(root: &Path, logical: &str, width: u32, height: u32, color: [u8; 4]) -> PathBuf {
    let path = root.join(logical);
    fs::create_dir_all(path.parent().expect("palette parent")).expect("palette dir");
    fs::write(&path, encode_palette(width, height, color)).expect("palette written");
    path
}

#[derive(Default)]
struct ScriptedState {
    next_id: u64,
    attempts: usize,
    installs: Vec<(SlotKey, PathBuf)>,
    releases: Vec<(SlotKey, PathBuf)>,
    live: HashMap<SlotKey, (u64, DirtyNotifier)>,
    failing: HashSet<PathBuf>,
}

/// Records installs and releases; tests fire callbacks by hand.
#[derive(Clone, Default)]
pub(crate) struct ScriptedBackend {
    state: Arc<Mutex<ScriptedState>>,
}

pub(crate) struct ScriptedHandle {
    id: u64,
    slot: SlotKey,
    path: PathBuf,
    state: Arc<Mutex<ScriptedState>>,
}

impl Drop for ScriptedHandle {
    fn drop(&mut self) {
        let mut state = self.state.lock().expect("scripted state");
        state.releases.push((self.slot.clone(), self.path.clone()));
        if state.live.get(&self.slot).is_some_and(|(id, _)| *id == self.id) {
            state.live.remove(&self.slot);
        }
    }
}

impl ScriptedBackend {
    pub(crate) fn fail_on(&self, path: &Path) {
        self.state.lock().expect("scripted state").failing.insert(path.to_path_buf());
    }

    pub(crate) fn installs(&self) -> Vec<(SlotKey, PathBuf)> {
        self.state.lock().expect("scripted state").installs.clone()
    }

    pub(crate) fn releases(&self) -> Vec<(SlotKey, PathBuf)> {
        self.state.lock().expect("scripted state").releases.clone()
    }

    pub(crate) fn attempts(&self) -> usize {
        self.state.lock().expect("scripted state").attempts
    }

    pub(crate) fn live_count(&self) -> usize {
        self.state.lock().expect("scripted state").live.len()
    }

    /// Runs the slot's watch callback as the OS would. Returns false when no watch is live.
    pub(crate) fn fire(&self, slot: &SlotKey) -> bool {
        let notifier = self.state.lock().expect("scripted state").live.get(slot).map(|(_, n)| n.clone());
        match notifier {
            Some(notifier) => {
                notifier.notify();
                true
            }
            None => false,
        }
    }
}

impl WatchBackend for ScriptedBackend {
    type Handle = ScriptedHandle;

    fn install(&mut self, path: &Path, notifier: DirtyNotifier) -> Result<ScriptedHandle> {
        let mut state = self.state.lock().expect("scripted state");
        state.attempts += 1;
        if state.failing.contains(path) {
            bail!("permission denied: {}", path.display());
        }
        state.next_id += 1;
        let id = state.next_id;
        let slot = notifier.slot().clone();
        state.installs.push((slot.clone(), path.to_path_buf()));
        state.live.insert(slot.clone(), (id, notifier));
        Ok(ScriptedHandle { id, slot, path: path.to_path_buf(), state: Arc::clone(&self.state) })
    }
}

#[derive(Default)]
pub(crate) struct RecordingHost {
    pub(crate) active: HashSet<SlotKey>,
    pub(crate) textures: HashMap<SlotKey, PaletteImage>,
    pub(crate) replacements: Vec<SlotKey>,
    pub(crate) commits: usize,
    pub(crate) replacements_at_commit: Vec<usize>,
}

impl RecordingHost {
    pub(crate) fn with_active<I: IntoIterator<Item = SlotKey>>(slots: I) -> Self {
        Self { active: slots.into_iter().collect(), ..Self::default() }
    }
}

impl PaletteHost for RecordingHost {
    type Texture = PaletteImage;

    fn active_slots(&self) -> HashSet<SlotKey> {
        self.active.clone()
    }

    fn texture(&self, slot: &SlotKey) -> Option<&PaletteImage> {
        self.textures.get(slot)
    }

    fn replace_texture(&mut self, slot: &SlotKey, texture: PaletteImage) -> Option<PaletteImage> {
        self.replacements.push(slot.clone());
        self.textures.insert(slot.clone(), texture)
    }

    fn commit(&mut self) {
        self.commits += 1;
        self.replacements_at_commit.push(self.replacements.len());
    }
}
