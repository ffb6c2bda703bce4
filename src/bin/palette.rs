use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use palette_extractor::{
    extract_with, parse_hex, render_swatch_strip, validate_count, ClusterSpace, Color,
    ExtractOptions, PaletteEntry,
};
use tracing_subscriber::EnvFilter;

/// Pull the dominant colors out of an image and print their hex codes.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input image (JPEG, PNG, BMP or GIF)
    #[arg(required_unless_present = "colors")]
    input: Option<PathBuf>,

    /// Number of palette colors
    #[arg(short = 'k', long, default_value_t = 4, allow_negative_numbers = true)]
    n_colors: i64,

    /// Comma-separated hex colors to render instead of extracting from an image
    #[arg(short = 'c', long, conflicts_with = "input")]
    colors: Option<String>,

    /// Save the swatch strip as PNG to this path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Fixed k-means seed for reproducible palettes
    #[arg(long)]
    seed: Option<u64>,

    /// Number of k-means restarts; the best one is kept
    #[arg(long, default_value_t = 1)]
    runs: usize,

    /// Cluster in CIE Lab instead of sRGB
    #[arg(long)]
    lab: bool,

    /// Sort colors by how much of the image they cover
    #[arg(long)]
    sort: bool,

    /// Shrink the image to this longest side before clustering
    #[arg(long)]
    downscale: Option<u32>,

    /// Ignore fully transparent pixels
    #[arg(long)]
    skip_transparent: bool,

    /// Print the palette as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let entries: Vec<PaletteEntry> = match (&args.colors, &args.input) {
        (Some(list), _) => list
            .split(',')
            .map(|s| parse_hex(s).map(|color| PaletteEntry::new(color, 0.0)))
            .collect::<palette_extractor::Result<_>>()
            .context("invalid --colors")?,
        (None, Some(input)) => {
            let mut options = ExtractOptions::default()
                .with_colors(validate_count(args.n_colors)?)
                .with_space(if args.lab { ClusterSpace::Lab } else { ClusterSpace::Rgb })
                .with_runs(args.runs)
                .skip_transparent(args.skip_transparent)
                .sort_by_share(args.sort);
            options.seed = args.seed;
            options.downscale = args.downscale;
            extract_with(input, &options)
                .with_context(|| format!("palette extraction failed for {}", input.display()))?
        }
        (None, None) => anyhow::bail!("either an input image or --colors is required"),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for entry in &entries {
            println!("{}", entry.hex);
        }
    }

    if let Some(out) = &args.output {
        let colors: Vec<Color> = entries.iter().map(|e| e.color).collect();
        render_swatch_strip(&colors)
            .and_then(|strip| strip.save_png(out))
            .with_context(|| format!("could not save {}", out.display()))?;
        eprintln!("Saved → {}", out.display());
    }

    Ok(())
}
