use crate::host::TextureUploader;
use crate::slot::SlotKey;
use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PaletteSize {
    #[serde(default = "PaletteSize::default_width")]
    pub width: u32,
    #[serde(default = "PaletteSize::default_height")]
    pub height: u32,
}

impl PaletteSize {
    const fn default_width() -> u32 {
        32
    }

    const fn default_height() -> u32 {
        16
    }
}

impl Default for PaletteSize {
    fn default() -> Self {
        Self { width: Self::default_width(), height: Self::default_height() }
    }
}

/// CPU copy of a decoded palette, RGBA8 rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl PaletteImage {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y * self.width + x) * 4) as usize;
        let texel = self.rgba.get(offset..offset + 4)?;
        Some([texel[0], texel[1], texel[2], texel[3]])
    }
}

/// Decodes palette files with `image` and rejects anything not matching the expected size.
#[derive(Debug, Clone, Default)]
pub struct PaletteDecoder {
    size: PaletteSize,
}

impl PaletteDecoder {
    pub fn new(size: PaletteSize) -> Self {
        Self { size }
    }

    pub fn size(&self) -> PaletteSize {
        self.size
    }

    pub fn decode(&self, slot: &SlotKey, bytes: &[u8]) -> Result<PaletteImage> {
        let img = image::load_from_memory(bytes).with_context(|| format!("decode palette {slot}"))?.to_rgba8();
        let (width, height) = img.dimensions();
        if width != self.size.width || height != self.size.height {
            bail!(
                "palette {slot} is {width}x{height}, expected {}x{}",
                self.size.width,
                self.size.height
            );
        }
        Ok(PaletteImage { width, height, rgba: img.into_raw() })
    }
}

impl TextureUploader for PaletteDecoder {
    type Texture = PaletteImage;

    fn decode_and_upload(&mut self, slot: &SlotKey, bytes: &[u8]) -> Result<PaletteImage> {
        self.decode(slot, bytes)
    }
}
