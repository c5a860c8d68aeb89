use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "floatpet",
    author,
    version,
    about = "Floating desktop pets cut out of looping video clips",
    arg_required_else_help = false
)]
pub struct Cli {
    /// Config file to load instead of the usual lookup.
    #[arg(long, global = true, value_name = "FILE", env = "FLOATPET_CONFIG")]
    pub config: Option<PathBuf>,
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Per-channel distance from the backdrop colour still treated as background.
    #[arg(long, value_name = "0-255")]
    pub tolerance: Option<u8>,

    /// Backdrop colour to key out (e.g. `140,140,140`).
    #[arg(long, value_name = "R,G,B", value_parser = parse_background)]
    pub background: Option<[u8; 3]>,

    /// Radius of the mask softening kernel (0 disables softening).
    #[arg(long, value_name = "PIXELS")]
    pub blur_radius: Option<u32>,

    /// Playback rate for every window; overrides `playback.frame_interval`.
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Decode each clip fully into memory before playing it.
    #[arg(long)]
    pub preload: bool,

    /// Seed for random placement (defaults to the current time).
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Start with one window per animation instead of a single window.
    #[arg(long)]
    pub rave: bool,

    /// Animation for the first window and for "Spawn New" (catalog name).
    #[arg(long, value_name = "NAME")]
    pub animation: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the resolved animation catalog.
    Catalog(CatalogArgs),
    /// Probe every clip in the catalog and report the ones that cannot be played.
    Check,
}

#[derive(Parser, Debug)]
pub struct CatalogArgs {
    /// Emit the catalog as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_background(value: &str) -> Result<[u8; 3], String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!(
            "background must be three comma-separated channels, got '{value}'"
        ));
    }
    let mut rgb = [0u8; 3];
    for (slot, part) in rgb.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .map_err(|_| format!("invalid colour channel '{part}'; expected 0-255"))?;
    }
    Ok(rgb)
}
