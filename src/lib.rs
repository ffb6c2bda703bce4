//! Dominant-color palettes from images.
//!
//! The pipeline is: decode an image, cluster its pixels with k-means, then
//! render the centroids as a strip of solid swatches with their `#rrggbb`
//! codes. Front ends (the `palette-cli` binary, or a web page through
//! [`extract_palette`]) own file selection and display; this crate only
//! computes.
//!
//! ```no_run
//! use palette_extractor::{extract, render_swatch_strip};
//!
//! let colors = extract("photo.jpg", 4)?;
//! let strip = render_swatch_strip(&colors)?;
//! for hex in &strip.hex {
//!     println!("{hex}");
//! }
//! strip.save_png("palette.png")?;
//! # Ok::<(), palette_extractor::Error>(())
//! ```

use js_sys::{Array, Object, Reflect, Uint8Array};
use wasm_bindgen::prelude::*;

pub mod color;
pub mod error;
pub mod extract;
pub mod swatch;

pub use color::{bgr_to_rgb, parse_hex, rgb_to_bgr, rgb_to_hex, swap_channels, ChannelOrder, Color};
pub use error::{Error, Result};
pub use extract::{
    extract, extract_from_image, extract_from_memory, extract_with, validate_count, ClusterSpace,
    ExtractOptions, PaletteEntry, DEFAULT_COLORS, MAX_COLORS,
};
pub use swatch::{render_swatch_strip, render_swatch_strip_with, SwatchLayout, SwatchStrip};

/// Build a palette from an uploaded image.
///
/// Returns `{ image: Uint8Array, palette: string[] }` where `image` is the
/// PNG-encoded swatch strip and `palette` holds one `#rrggbb` per swatch.
/// Pass a `seed` to get the same palette for the same input.
#[wasm_bindgen]
pub fn extract_palette(
    input: Vec<u8>,
    n_colors: usize,
    seed: Option<u64>,
) -> std::result::Result<Object, JsValue> {
    let mut options = ExtractOptions::default().with_colors(n_colors);
    options.seed = seed;

    let palette = extract_from_memory(&input, &options).map_err(to_js)?;
    let colors: Vec<Color> = palette.iter().map(|entry| entry.color).collect();
    let strip = render_swatch_strip(&colors).map_err(to_js)?;
    let png = strip.encode_png().map_err(to_js)?;

    let palette_js = Array::new();
    for hex in &strip.hex {
        palette_js.push(&JsValue::from_str(hex));
    }

    let result = Object::new();
    Reflect::set(&result, &JsValue::from_str("image"), &Uint8Array::from(png.as_slice()))?;
    Reflect::set(&result, &JsValue::from_str("palette"), &palette_js)?;
    Ok(result)
}

fn to_js(err: Error) -> JsValue {
    JsValue::from_str(&err.to_string())
}
