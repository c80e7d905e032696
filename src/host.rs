use crate::slot::SlotKey;
use anyhow::Result;
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

/// Render-side state the reload pass reads from and writes into once per frame.
pub trait PaletteHost {
    type Texture;

    /// Slots referenced by the frame about to render.
    fn active_slots(&self) -> HashSet<SlotKey>;

    /// Texture currently bound to `slot`, if any.
    fn texture(&self, slot: &SlotKey) -> Option<&Self::Texture>;

    /// Swap in a freshly uploaded texture, returning the previous one.
    fn replace_texture(&mut self, slot: &SlotKey, texture: Self::Texture) -> Option<Self::Texture>;

    /// Apply every replacement made this frame. Called at most once per frame.
    fn commit(&mut self);
}

/// Maps a logical asset path to an existing file on disk.
pub trait PathResolver {
    fn resolve(&self, logical: &str) -> Option<PathBuf>;
}

impl<F> PathResolver for F
where
    F: Fn(&str) -> Option<PathBuf>,
{
    fn resolve(&self, logical: &str) -> Option<PathBuf> {
        self(logical)
    }
}

/// Turns raw palette bytes into something the host can render.
pub trait TextureUploader {
    type Texture;

    fn decode_and_upload(&mut self, slot: &SlotKey, bytes: &[u8]) -> Result<Self::Texture>;
}

/// Resolves logical paths against an ordered list of asset roots.
///
/// With `prefer_last` set, later roots shadow earlier ones, which is how
/// override folders layered on top of the base assets behave.
#[derive(Debug, Clone)]
pub struct SearchPathResolver {
    roots: Vec<PathBuf>,
    prefer_last: bool,
}

impl SearchPathResolver {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let roots = roots
            .into_iter()
            .map(|root| absolute_root(root.as_ref()))
            .collect();
        Self { roots, prefer_last: true }
    }

    pub fn with_prefer_last(mut self, prefer_last: bool) -> Self {
        self.prefer_last = prefer_last;
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn candidate(root: &Path, logical: &str) -> Option<PathBuf> {
        let candidate = root.join(logical.trim_start_matches(['/', '\\']));
        candidate.is_file().then_some(candidate)
    }
}

fn absolute_root(root: &Path) -> PathBuf {
    if root.is_absolute() {
        return root.to_path_buf();
    }
    match env::current_dir() {
        Ok(cwd) => cwd.join(root),
        Err(_) => root.to_path_buf(),
    }
}

impl PathResolver for SearchPathResolver {
    fn resolve(&self, logical: &str) -> Option<PathBuf> {
        if self.prefer_last {
            self.roots.iter().rev().find_map(|root| Self::candidate(root, logical))
        } else {
            self.roots.iter().find_map(|root| Self::candidate(root, logical))
        }
    }
}
