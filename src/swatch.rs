//! Swatch strip rendering and PNG output.

use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};
use tracing::info;

use crate::color::{rgb_to_hex, Color};
use crate::error::{Error, Result};

/// Geometry of a rendered strip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwatchLayout {
    /// Width of each color's rectangle in pixels.
    pub swatch_width: u32,
    /// Height of the whole strip in pixels.
    pub height: u32,
}

impl Default for SwatchLayout {
    fn default() -> Self {
        Self {
            swatch_width: 60,
            height: 100,
        }
    }
}

/// A row of solid swatches plus the hex code of each, left to right.
#[derive(Clone, Debug)]
pub struct SwatchStrip {
    pub image: RgbImage,
    pub hex: Vec<String>,
}

/// Render `colors` with the default 60x100 swatches.
pub fn render_swatch_strip(colors: &[Color]) -> Result<SwatchStrip> {
    render_swatch_strip_with(colors, SwatchLayout::default())
}

/// Render `colors` side by side, one `layout.swatch_width` wide block each.
///
/// Colors may be in either channel order; every pixel written is RGB. Fails
/// if the strip would be wider than `u32::MAX` pixels.
pub fn render_swatch_strip_with(colors: &[Color], layout: SwatchLayout) -> Result<SwatchStrip> {
    let width = u32::try_from(colors.len())
        .ok()
        .and_then(|n| n.checked_mul(layout.swatch_width))
        .ok_or_else(|| {
            Error::invalid(
                "swatch layout",
                format!(
                    "{} swatches of {}px overflow the strip width",
                    colors.len(),
                    layout.swatch_width
                ),
            )
        })?;

    let fills: Vec<Rgb<u8>> = colors.iter().map(|&c| Rgb::from(c)).collect();
    let image = RgbImage::from_fn(width, layout.height, |x, _| {
        fills[(x / layout.swatch_width) as usize]
    });
    let hex = colors.iter().map(|&c| rgb_to_hex(c)).collect();

    Ok(SwatchStrip { image, hex })
}

impl SwatchStrip {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// PNG-encoded bytes of the strip.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|source| Error::Encode { source })?;
        Ok(buf)
    }

    /// Write the strip to `path` as PNG, whatever the extension says.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.image
            .save_with_format(path, ImageFormat::Png)
            .map_err(|source| Error::Encode { source })?;
        info!(path = %path.display(), swatches = self.hex.len(), "saved swatch strip");
        Ok(())
    }
}
