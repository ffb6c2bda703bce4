//! Dominant-color extraction: decode, sample, cluster.

use std::collections::HashMap;
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use kmeans_colors::{get_kmeans, Calculate, Kmeans, Sort};
use palette::{IntoColor, Lab, LinSrgb, Srgb};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::color::{rgb_to_hex, Color};
use crate::error::{Error, Result};

/// Palette size used when the caller does not ask for one.
pub const DEFAULT_COLORS: usize = 4;

/// Upper bound on the palette size. Cluster indices are stored as `u8`.
pub const MAX_COLORS: usize = 256;

/// Color space the samples are clustered in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterSpace {
    /// Plain sRGB components in [0, 1].
    #[default]
    Rgb,
    /// CIE L*a*b*, perceptually closer but slower to convert.
    Lab,
}

/// Tunables for a single extraction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractOptions {
    pub num_colors: usize,
    pub space: ClusterSpace,
    /// Iteration cap per k-means run.
    pub max_iter: usize,
    /// Convergence threshold on centroid movement.
    pub converge: f32,
    /// Independent k-means restarts; the lowest-score run wins.
    pub runs: usize,
    /// Fixed RNG seed. `None` draws a fresh seed from the OS on every call.
    pub seed: Option<u64>,
    /// Ignore fully transparent pixels instead of sampling them as black.
    pub skip_transparent: bool,
    /// Order the result by descending pixel share instead of cluster order.
    pub sort_by_share: bool,
    /// Shrink the image so its longest side is at most this many pixels
    /// before sampling. Nearest-neighbour, so no new colors are introduced.
    pub downscale: Option<u32>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            num_colors: DEFAULT_COLORS,
            space: ClusterSpace::Rgb,
            max_iter: 20,
            converge: 1e-4,
            runs: 1,
            seed: None,
            skip_transparent: false,
            sort_by_share: false,
            downscale: None,
        }
    }
}

impl ExtractOptions {
    pub fn with_colors(mut self, num_colors: usize) -> Self {
        self.num_colors = num_colors;
        self
    }

    pub fn with_space(mut self, space: ClusterSpace) -> Self {
        self.space = space;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_runs(mut self, runs: usize) -> Self {
        self.runs = runs;
        self
    }

    pub fn skip_transparent(mut self, skip: bool) -> Self {
        self.skip_transparent = skip;
        self
    }

    pub fn sort_by_share(mut self, sort: bool) -> Self {
        self.sort_by_share = sort;
        self
    }

    pub fn with_downscale(mut self, longest_side: u32) -> Self {
        self.downscale = Some(longest_side);
        self
    }

    /// Reject settings the clusterer cannot honor. Runs before any IO.
    pub fn validate(&self) -> Result<()> {
        check_count(self.num_colors)?;
        if self.runs == 0 {
            return Err(Error::invalid("runs", "must be at least 1"));
        }
        if self.max_iter == 0 {
            return Err(Error::invalid("max_iter", "must be at least 1"));
        }
        if self.downscale == Some(0) {
            return Err(Error::invalid("downscale", "must be at least 1 pixel"));
        }
        if !self.converge.is_finite() || self.converge < 0.0 {
            return Err(Error::invalid(
                "converge",
                format!("{} is not a non-negative number", self.converge),
            ));
        }
        Ok(())
    }
}

/// One palette color together with how much of the image it covers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaletteEntry {
    /// Always RGB ordered.
    pub color: Color,
    pub hex: String,
    /// Fraction of sampled pixels assigned to this color, in [0, 1].
    pub share: f32,
}

impl PaletteEntry {
    /// Normalizes `color` to RGB and derives its hex code.
    pub fn new(color: Color, share: f32) -> Self {
        let color = color.to_rgb();
        Self {
            hex: rgb_to_hex(color),
            color,
            share,
        }
    }
}

/// Validate a palette size coming from an untyped source (CLI, JS).
pub fn validate_count(requested: i64) -> Result<usize> {
    let n = usize::try_from(requested).map_err(|_| {
        Error::invalid(
            "num_colors",
            format!("{requested} is negative; expected 1..={MAX_COLORS}"),
        )
    })?;
    check_count(n)
}

fn check_count(n: usize) -> Result<usize> {
    if n == 0 {
        return Err(Error::invalid(
            "num_colors",
            format!("0 is out of range; expected 1..={MAX_COLORS}"),
        ));
    }
    if n > MAX_COLORS {
        return Err(Error::invalid(
            "num_colors",
            format!("{n} is out of range; expected 1..={MAX_COLORS}"),
        ));
    }
    Ok(n)
}

/// Extract `num_colors` dominant colors from the image at `image_path`.
///
/// Uses [`ExtractOptions::default`] for everything but the count, which means
/// an unseeded run: repeated calls may return the same colors in a different
/// order or with slightly different centroids.
pub fn extract(image_path: impl AsRef<Path>, num_colors: usize) -> Result<Vec<Color>> {
    let options = ExtractOptions::default().with_colors(num_colors);
    Ok(extract_with(image_path, &options)?
        .into_iter()
        .map(|entry| entry.color)
        .collect())
}

/// Extract a palette from a file with explicit options.
#[instrument(
    level = "debug",
    skip(image_path, options),
    fields(path = %image_path.as_ref().display())
)]
pub fn extract_with(
    image_path: impl AsRef<Path>,
    options: &ExtractOptions,
) -> Result<Vec<PaletteEntry>> {
    let path = image_path.as_ref();
    options.validate()?;

    let img = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| Error::decode(Some(path.to_path_buf()), e))?
        .decode()
        .map_err(|e| Error::decode(Some(path.to_path_buf()), e))?;

    palette_from_image(&img, options, Some(path))
}

/// Extract a palette from an encoded image held in memory.
pub fn extract_from_memory(bytes: &[u8], options: &ExtractOptions) -> Result<Vec<PaletteEntry>> {
    options.validate()?;
    let img = image::load_from_memory(bytes).map_err(|e| Error::decode(None, e))?;
    palette_from_image(&img, options, None)
}

/// Extract a palette from an already decoded image.
pub fn extract_from_image(
    img: &DynamicImage,
    options: &ExtractOptions,
) -> Result<Vec<PaletteEntry>> {
    options.validate()?;
    palette_from_image(img, options, None)
}

fn palette_from_image(
    img: &DynamicImage,
    options: &ExtractOptions,
    path: Option<&Path>,
) -> Result<Vec<PaletteEntry>> {
    let (w, h) = img.dimensions();
    debug!(width = w, height = h, "sampling image");
    let samples = match options.downscale {
        Some(side) if w.max(h) > side => {
            let small = shrink(img, side);
            debug!(from = ?(w, h), to = ?small.dimensions(), "downscaled before sampling");
            collect_samples(&small, options.skip_transparent)
        }
        _ => collect_samples(img, options.skip_transparent),
    };
    debug!(samples = samples.len(), "collected samples");

    if samples.is_empty() {
        return Err(Error::decode(
            path.map(Path::to_path_buf),
            "image has no pixels to sample",
        ));
    }

    let distinct = count_distinct(&samples);
    let mut entries = if distinct.len() <= options.num_colors {
        // Too few colors to cluster: the palette is the image's own colors.
        debug!(
            distinct = distinct.len(),
            requested = options.num_colors,
            "saturating palette to distinct colors"
        );
        saturated_palette(distinct, samples.len())
    } else {
        let seed = resolve_seed(options.seed);
        match options.space {
            ClusterSpace::Rgb => {
                let buf: Vec<Srgb<f32>> = samples
                    .iter()
                    .map(|&[r, g, b]| Srgb::<u8>::new(r, g, b).into_format())
                    .collect();
                let km = run_kmeans(&buf, options, seed);
                entries_from_kmeans(&km, |c| c.into_format::<u8>())
            }
            ClusterSpace::Lab => {
                let buf: Vec<Lab> = samples
                    .iter()
                    .map(|&[r, g, b]| Srgb::<u8>::new(r, g, b).into_linear::<f32>().into_color())
                    .collect();
                let km = run_kmeans(&buf, options, seed);
                entries_from_kmeans(&km, |&lab| {
                    let lin: LinSrgb = lab.into_color();
                    clamp_unit(Srgb::from_linear(lin)).into_format::<u8>()
                })
            }
        }
    };

    if options.sort_by_share {
        entries.sort_by(|a, b| b.share.total_cmp(&a.share));
    }
    Ok(entries)
}

fn shrink(img: &DynamicImage, longest_side: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    let ratio = longest_side as f32 / w.max(h) as f32;
    let nw = ((w as f32) * ratio).round().max(1.0) as u32;
    let nh = ((h as f32) * ratio).round().max(1.0) as u32;
    img.resize_exact(nw, nh, FilterType::Nearest)
}

fn collect_samples(img: &DynamicImage, skip_transparent: bool) -> Vec<[u8; 3]> {
    if skip_transparent {
        img.to_rgba8()
            .pixels()
            .filter(|p| p[3] != 0)
            .map(|p| [p[0], p[1], p[2]])
            .collect()
    } else {
        img.to_rgb8().pixels().map(|p| p.0).collect()
    }
}

fn count_distinct(samples: &[[u8; 3]]) -> HashMap<[u8; 3], usize> {
    let mut counts = HashMap::new();
    for &px in samples {
        *counts.entry(px).or_insert(0usize) += 1;
    }
    counts
}

/// Every distinct color, most frequent first; ties broken by channel value.
fn saturated_palette(distinct: HashMap<[u8; 3], usize>, total: usize) -> Vec<PaletteEntry> {
    let mut colors: Vec<_> = distinct.into_iter().collect();
    colors.sort_by(|(ca, na), (cb, nb)| nb.cmp(na).then(ca.cmp(cb)));
    colors
        .into_iter()
        .map(|([r, g, b], n)| PaletteEntry::new(Color::rgb(r, g, b), n as f32 / total as f32))
        .collect()
}

fn resolve_seed(seed: Option<u64>) -> u64 {
    match seed {
        Some(seed) => seed,
        None => getrandom::u64().unwrap_or_else(|e| {
            warn!(error = %e, "OS randomness unavailable, using seed 0");
            0
        }),
    }
}

fn run_kmeans<C: Calculate + Clone>(buf: &[C], options: &ExtractOptions, seed: u64) -> Kmeans<C> {
    let cluster = |seed| {
        get_kmeans(
            options.num_colors,
            options.max_iter,
            options.converge,
            false,
            buf,
            seed,
        )
    };
    let mut best = cluster(seed);
    for run in 1..options.runs {
        let candidate = cluster(seed.wrapping_add(run as u64));
        if candidate.score < best.score {
            best = candidate;
        }
    }
    debug!(seed, runs = options.runs, score = best.score, "k-means finished");
    best
}

fn entries_from_kmeans<C>(km: &Kmeans<C>, to_srgb: impl Fn(&C) -> Srgb<u8>) -> Vec<PaletteEntry>
where
    C: Calculate + Sort,
{
    let mut clusters = C::sort_indexed_colors(&km.centroids, &km.indices);
    // Comes back sorted by luminance; restore k-means order.
    clusters.sort_by_key(|c| c.index);
    clusters
        .iter()
        .map(|c| PaletteEntry::new(Color::from(to_srgb(&c.centroid)), c.percentage))
        .collect()
}

fn clamp_unit(c: Srgb<f32>) -> Srgb<f32> {
    Srgb::new(
        c.red.clamp(0.0, 1.0),
        c.green.clamp(0.0, 1.0),
        c.blue.clamp(0.0, 1.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn two_tone(w: u32, h: u32) -> DynamicImage {
        let img = RgbImage::from_fn(w, h, |x, _| {
            if x < w / 2 { Rgb([250, 10, 10]) } else { Rgb([10, 10, 250]) }
        });
        DynamicImage::ImageRgb8(img)
    }

    fn gradient(w: u32, h: u32) -> DynamicImage {
        let img = RgbImage::from_fn(w, h, |x, y| Rgb([(x * 8) as u8, (y * 8) as u8, 128]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn solid_red_gives_single_exact_color() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([255, 0, 0])));
        let opts = ExtractOptions::default().with_colors(1);
        let palette = extract_from_image(&img, &opts).unwrap();
        assert_eq!(palette.len(), 1);
        assert_eq!(palette[0].hex, "#ff0000");
        assert_eq!(palette[0].share, 1.0);
    }

    #[test]
    fn saturates_when_fewer_distinct_colors() {
        let opts = ExtractOptions::default().with_colors(8);
        let palette = extract_from_image(&two_tone(10, 4), &opts).unwrap();
        let hexes: Vec<_> = palette.iter().map(|e| e.hex.as_str()).collect();
        // Equal counts, so ties fall back to channel order: blue first.
        assert_eq!(hexes, ["#0a0afa", "#fa0a0a"]);
    }

    #[test]
    fn saturated_order_is_by_frequency() {
        let img = RgbImage::from_fn(10, 1, |x, _| {
            if x < 7 { Rgb([200, 0, 0]) } else { Rgb([0, 0, 0]) }
        });
        let img = DynamicImage::ImageRgb8(img);
        let palette = extract_from_image(&img, &ExtractOptions::default()).unwrap();
        assert_eq!(palette[0].color, Color::rgb(200, 0, 0));
        assert!((palette[0].share - 0.7).abs() < 1e-6);
        assert!((palette[1].share - 0.3).abs() < 1e-6);
    }

    #[test]
    fn returns_requested_count_with_shares_summing_to_one() {
        for space in [ClusterSpace::Rgb, ClusterSpace::Lab] {
            let opts = ExtractOptions::default().with_colors(5).with_seed(7).with_space(space);
            let palette = extract_from_image(&gradient(32, 32), &opts).unwrap();
            assert_eq!(palette.len(), 5);
            let total: f32 = palette.iter().map(|e| e.share).sum();
            assert!((total - 1.0).abs() < 1e-4, "{space:?}: {total}");
            for entry in &palette {
                assert_eq!(entry.hex, entry.color.to_hex());
                assert_eq!(entry.hex.len(), 7);
            }
        }
    }

    #[test]
    fn shares_follow_their_centroids() {
        // Three well separated groups with a one-step jitter so clustering runs.
        let img = RgbImage::from_fn(10, 10, |x, y| {
            let j = (x % 2) as u8;
            match y {
                0..=5 => Rgb([10 + j, 10 + j, 10 + j]),
                6..=8 => Rgb([250 - j, 250 - j, 250 - j]),
                _ => Rgb([200 + j, 0, 0]),
            }
        });
        let opts = ExtractOptions::default().with_colors(3).with_seed(11);
        let palette = extract_from_image(&DynamicImage::ImageRgb8(img), &opts).unwrap();
        assert_eq!(palette.len(), 3);

        let share_of = |pred: fn([u8; 3]) -> bool| {
            let hits: Vec<_> = palette.iter().filter(|e| pred(e.color.channels)).collect();
            assert_eq!(hits.len(), 1, "{palette:?}");
            hits[0].share
        };
        assert!((share_of(|[r, _, _]| r < 30) - 0.6).abs() < 1e-6);
        assert!((share_of(|[_, g, _]| g > 200) - 0.3).abs() < 1e-6);
        assert!((share_of(|[r, g, _]| r > 150 && g < 30) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let opts = ExtractOptions::default().with_colors(3).with_seed(42).with_runs(3);
        let a = extract_from_image(&gradient(20, 20), &opts).unwrap();
        let b = extract_from_image(&gradient(20, 20), &opts).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn sort_by_share_orders_descending() {
        let opts = ExtractOptions::default().with_colors(4).with_seed(1).sort_by_share(true);
        let palette = extract_from_image(&gradient(24, 24), &opts).unwrap();
        assert!(palette.windows(2).all(|w| w[0].share >= w[1].share));
    }

    #[test]
    fn transparent_pixels_can_be_skipped() {
        let img = RgbaImage::from_fn(4, 4, |x, _| {
            if x == 0 { Rgba([0, 200, 0, 255]) } else { Rgba([0, 0, 0, 0]) }
        });
        let img = DynamicImage::ImageRgba8(img);

        let kept = extract_from_image(&img, &ExtractOptions::default()).unwrap();
        assert_eq!(kept.len(), 2);

        let opts = ExtractOptions::default().skip_transparent(true);
        let skipped = extract_from_image(&img, &opts).unwrap();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].hex, "#00c800");
    }

    #[test]
    fn fully_transparent_image_has_nothing_to_sample() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(3, 3));
        let opts = ExtractOptions::default().skip_transparent(true);
        let err = extract_from_image(&img, &opts).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn downscale_keeps_colors_and_shares() {
        let img = RgbImage::from_fn(200, 100, |x, _| {
            if x < 150 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) }
        });
        let opts = ExtractOptions::default().with_colors(2).with_downscale(20);
        let palette = extract_from_image(&DynamicImage::ImageRgb8(img), &opts).unwrap();
        assert_eq!(palette[0].hex, "#000000");
        assert_eq!(palette[1].hex, "#ffffff");
        assert!((palette[0].share - 0.75).abs() < 0.06);
        let zero = ExtractOptions {
            downscale: Some(0),
            ..ExtractOptions::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn count_validation() {
        assert!(validate_count(0).unwrap_err().is_invalid_argument());
        assert!(validate_count(-3).unwrap_err().is_invalid_argument());
        assert!(validate_count(257).unwrap_err().is_invalid_argument());
        assert_eq!(validate_count(4).unwrap(), 4);
        assert_eq!(validate_count(256).unwrap(), 256);
    }

    #[test]
    fn zero_colors_rejected_before_decoding() {
        let opts = ExtractOptions::default().with_colors(0);
        let err = extract_from_memory(b"not an image", &opts).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn bad_options_rejected() {
        let base = ExtractOptions::default();
        assert!(ExtractOptions { runs: 0, ..base.clone() }.validate().is_err());
        assert!(ExtractOptions { max_iter: 0, ..base.clone() }.validate().is_err());
        assert!(ExtractOptions { converge: f32::NAN, ..base.clone() }.validate().is_err());
        assert!(base.validate().is_ok());
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let opts = ExtractOptions::default();
        let err = extract_from_memory(b"definitely not a png", &opts).unwrap_err();
        assert!(err.is_decode());
    }
}
