use anyhow::Result;
use palette_reload::{
    DirtyNotifier, PaletteDecoder, PaletteHost, PaletteImage, PaletteLayout, ReloadCoordinator, ReloadOptions,
    SearchPathResolver, SlotKey, SlotOutcome, WatchBackend,
};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;
use tempfile::tempdir;

fn palette_png(color: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(32, 16, image::Rgba(color));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png).expect("png encodes");
    bytes
}

fn write_palette(root: &Path, logical: &str, color: [u8; 4]) -> PathBuf {
    let path = root.join(logical);
    fs::create_dir_all(path.parent().expect("parent")).expect("palette dir");
    fs::write(&path, palette_png(color)).expect("palette written");
    path
}

#[derive(Default)]
struct Watches {
    live: HashMap<SlotKey, DirtyNotifier>,
    installed: Vec<(SlotKey, PathBuf)>,
    released: Vec<SlotKey>,
}

/// Single-threaded stand-in for OS watches.
#[derive(Clone, Default)]
struct ManualBackend(Rc<RefCell<Watches>>);

struct ManualWatch {
    slot: SlotKey,
    watches: Rc<RefCell<Watches>>,
}

impl Drop for ManualWatch {
    fn drop(&mut self) {
        let mut watches = self.watches.borrow_mut();
        watches.live.remove(&self.slot);
        watches.released.push(self.slot.clone());
    }
}

impl WatchBackend for ManualBackend {
    type Handle = ManualWatch;

    fn install(&mut self, path: &Path, notifier: DirtyNotifier) -> Result<ManualWatch> {
        let slot = notifier.slot().clone();
        let mut watches = self.0.borrow_mut();
        watches.installed.push((slot.clone(), path.to_path_buf()));
        watches.live.insert(slot.clone(), notifier);
        Ok(ManualWatch { slot, watches: Rc::clone(&self.0) })
    }
}

impl ManualBackend {
    fn fire(&self, slot: &SlotKey) {
        let notifier = self.0.borrow().live.get(slot).cloned().expect("slot is watched");
        notifier.notify();
    }
}

#[derive(Default)]
struct Camera {
    active: HashSet<SlotKey>,
    palettes: HashMap<SlotKey, PaletteImage>,
    commits: usize,
}

impl PaletteHost for Camera {
    type Texture = PaletteImage;

    fn active_slots(&self) -> HashSet<SlotKey> {
        self.active.clone()
    }

    fn texture(&self, slot: &SlotKey) -> Option<&PaletteImage> {
        self.palettes.get(slot)
    }

    fn replace_texture(&mut self, slot: &SlotKey, texture: PaletteImage) -> Option<PaletteImage> {
        self.palettes.insert(slot.clone(), texture)
    }

    fn commit(&mut self) {
        self.commits += 1;
    }
}

fn immediate() -> ReloadOptions {
    ReloadOptions { debounce: Duration::ZERO, skip_unchanged: true }
}

#[test]
fn edited_palette_is_reloaded_on_the_next_frame() {
    let dir = tempdir().expect("temp dir");
    write_palette(dir.path(), "palettes/palette0.png", [0, 0, 0, 255]);
    let backend = ManualBackend::default();
    let mut coordinator = ReloadCoordinator::new(
        backend.clone(),
        SearchPathResolver::new([dir.path()]),
        PaletteDecoder::default(),
        PaletteLayout::default(),
        immediate(),
    );
    let mut camera = Camera { active: [SlotKey::Index(0)].into_iter().collect(), ..Camera::default() };

    coordinator.on_frame_tick(&mut camera);
    write_palette(dir.path(), "palettes/palette0.png", [255, 128, 0, 255]);
    backend.fire(&SlotKey::Index(0));

    let report = coordinator.on_frame_tick(&mut camera);
    assert_eq!(report.outcome(&SlotKey::Index(0)), Some(&SlotOutcome::Reloaded));
    assert_eq!(camera.commits, 1);
    let palette = camera.palettes.get(&SlotKey::Index(0)).expect("palette swapped in");
    assert_eq!((palette.width, palette.height), (32, 16));
    assert_eq!(palette.pixel(5, 5), Some([255, 128, 0, 255]));
}

#[test]
fn switching_active_palettes_moves_watches() {
    let dir = tempdir().expect("temp dir");
    for index in 0..3 {
        write_palette(dir.path(), &format!("palettes/palette{index}.png"), [0, 0, 0, 255]);
    }
    let backend = ManualBackend::default();
    let mut coordinator = ReloadCoordinator::new(
        backend.clone(),
        SearchPathResolver::new([dir.path()]),
        PaletteDecoder::default(),
        PaletteLayout::default(),
        immediate(),
    );
    let mut camera = Camera { active: [SlotKey::Index(0), SlotKey::Index(1)].into_iter().collect(), ..Camera::default() };
    coordinator.on_frame_tick(&mut camera);

    camera.active = [SlotKey::Index(1), SlotKey::Index(2)].into_iter().collect();
    let report = coordinator.on_frame_tick(&mut camera);

    assert_eq!(report.reconcile.released, vec![SlotKey::Index(0)]);
    assert_eq!(report.reconcile.installed, vec![SlotKey::Index(2)]);
    let watches = backend.0.borrow();
    assert_eq!(watches.released, vec![SlotKey::Index(0)]);
    assert_eq!(watches.installed.iter().filter(|(slot, _)| *slot == SlotKey::Index(1)).count(), 1);
    let live: HashSet<SlotKey> = watches.live.keys().cloned().collect();
    assert_eq!(live, [SlotKey::Index(1), SlotKey::Index(2)].into_iter().collect());
}

#[test]
fn missing_terrain_palette_is_never_drained() {
    let dir = tempdir().expect("temp dir");
    write_palette(dir.path(), "palettes/terrain/terrain-main.png", [0, 0, 0, 255]);
    let backend = ManualBackend::default();
    let mut coordinator = ReloadCoordinator::new(
        backend.clone(),
        SearchPathResolver::new([dir.path()]),
        PaletteDecoder::default(),
        PaletteLayout::default(),
        immediate(),
    );
    let mut camera = Camera {
        active: [SlotKey::named("terrain-main"), SlotKey::named("terrain-fade")].into_iter().collect(),
        ..Camera::default()
    };

    let first = coordinator.on_frame_tick(&mut camera);
    assert_eq!(first.reconcile.unresolved, vec![SlotKey::named("terrain-fade")]);
    assert!(!coordinator.registry().is_watching(&SlotKey::named("terrain-fade")));

    for _ in 0..3 {
        let report = coordinator.on_frame_tick(&mut camera);
        assert!(report.outcome(&SlotKey::named("terrain-fade")).is_none());
    }
    assert_eq!(camera.commits, 0);
}
