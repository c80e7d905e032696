use anyhow::Result;
use palette_reload::cli::CliOverrides;
use palette_reload::{
    NotifyBackend, PaletteDecoder, PaletteHost, PaletteImage, PathResolver, ReloadConfig, ReloadCoordinator,
    SearchPathResolver, SlotKey,
};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::thread;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Stand-in for a renderer: holds decoded palettes and reports what each commit applied.
struct WatchHost {
    active: HashSet<SlotKey>,
    textures: HashMap<SlotKey, PaletteImage>,
    staged: Vec<SlotKey>,
    commits: u64,
}

impl WatchHost {
    fn new(active: impl IntoIterator<Item = SlotKey>) -> Self {
        Self { active: active.into_iter().collect(), textures: HashMap::new(), staged: Vec::new(), commits: 0 }
    }

    fn load_initial(&mut self, config: &ReloadConfig, resolver: &SearchPathResolver, decoder: &PaletteDecoder) {
        for slot in &self.active {
            let logical = slot.logical_path(&config.layout);
            let Some(path) = resolver.resolve(&logical) else {
                warn!(slot = %slot, logical = %logical, "palette not found at startup");
                continue;
            };
            match fs::read(&path).map_err(anyhow::Error::from).and_then(|bytes| decoder.decode(slot, &bytes)) {
                Ok(image) => {
                    info!(slot = %slot, path = %path.display(), "loaded palette");
                    self.textures.insert(slot.clone(), image);
                }
                Err(err) => {
                    let error = format!("{err:#}");
                    warn!(slot = %slot, %error, "palette failed to load");
                }
            }
        }
    }
}

impl PaletteHost for WatchHost {
    type Texture = PaletteImage;

    fn active_slots(&self) -> HashSet<SlotKey> {
        self.active.clone()
    }

    fn texture(&self, slot: &SlotKey) -> Option<&PaletteImage> {
        self.textures.get(slot)
    }

    fn replace_texture(&mut self, slot: &SlotKey, texture: PaletteImage) -> Option<PaletteImage> {
        self.staged.push(slot.clone());
        self.textures.insert(slot.clone(), texture)
    }

    fn commit(&mut self) {
        self.commits += 1;
        let applied: Vec<String> = self.staged.drain(..).map(|slot| slot.to_string()).collect();
        info!(commit = self.commits, slots = ?applied, "applied palettes");
    }
}

fn run(cli: CliOverrides) -> Result<()> {
    let mut config = match cli.config_path() {
        Some(path) => ReloadConfig::load(path)?,
        None => ReloadConfig::default(),
    };
    let ticks = cli.ticks();
    config.apply_overrides(&cli.into_config_overrides());

    let resolver = SearchPathResolver::new(&config.roots).with_prefer_last(config.prefer_last_root);
    let decoder = PaletteDecoder::new(config.palette);
    let mut host = WatchHost::new(config.active_slots());
    host.load_initial(&config, &resolver, &decoder);

    let mut coordinator = ReloadCoordinator::new(
        NotifyBackend::new(config.poll_interval()),
        resolver,
        decoder,
        config.layout.clone(),
        config.reload_options(),
    );
    info!(roots = ?config.roots, slots = ?config.slots, "watching palettes");

    let tick = config.tick();
    loop {
        coordinator.on_frame_tick(&mut host);
        if ticks.is_some_and(|limit| coordinator.frames() >= limit) {
            break;
        }
        thread::sleep(tick);
    }
    coordinator.shutdown();
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = match CliOverrides::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("[cli] {err}");
            std::process::exit(2);
        }
    };
    if let Err(err) = run(cli) {
        let error = format!("{err:#}");
        error!(%error, "palette watcher stopped");
        std::process::exit(1);
    }
}
