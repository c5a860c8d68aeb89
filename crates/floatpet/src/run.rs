use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail, Context, Result};
use compositor::{probe_clip, FfmpegTools, KeySettings};
use petconfig::{interval_for_fps, PetConfig};
use renderer::{DisplayConfig, MenuModel, Startup};
use scheduler::{FfmpegOpener, ManagerOptions, Point, WindowManager};
use tracing_subscriber::EnvFilter;

use crate::cli::{CatalogArgs, Cli, RunArgs};
use crate::paths::{AppPaths, ConfigSource};

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Loads the config from the resolved source and applies command-line
/// overrides on top of it.
pub fn load_config(cli: &Cli) -> Result<(PetConfig, ConfigSource)> {
    let paths = AppPaths::discover();
    let source = paths.resolve_config(cli.config.as_deref())?;
    let mut config = match &source {
        ConfigSource::File(path) => PetConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        ConfigSource::Builtin => PetConfig::builtin(),
    };
    apply_overrides(&mut config, &cli.run)?;
    tracing::debug!(
        source = %source,
        search = ?paths.config_dirs(),
        animations = config.animations.len(),
        "resolved floatpet config"
    );
    Ok((config, source))
}

pub fn apply_overrides(config: &mut PetConfig, args: &RunArgs) -> Result<()> {
    if let Some(tolerance) = args.tolerance {
        config.keying.tolerance = tolerance;
    }
    if let Some(background) = args.background {
        config.keying.background = background;
    }
    if let Some(radius) = args.blur_radius {
        config.keying.blur_radius = radius;
    }
    if let Some(fps) = args.fps {
        config.playback.frame_interval = interval_for_fps(fps)
            .ok_or_else(|| anyhow!("--fps {fps} does not give a usable frame interval"))?;
    }
    if args.preload {
        config.playback.preload = true;
    }
    config.validate().context("invalid settings")?;
    Ok(())
}

fn media_tools(config: &PetConfig) -> FfmpegTools {
    FfmpegTools {
        ffmpeg: config.media.ffmpeg.clone(),
        ffprobe: config.media.ffprobe.clone(),
    }
}

fn key_settings(config: &PetConfig) -> KeySettings {
    KeySettings {
        tolerance: config.keying.tolerance,
        background: config.keying.background,
        blur_radius: config.keying.blur_radius,
    }
}

fn placement_seed(args: &RunArgs) -> u64 {
    args.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or_default()
    })
}

pub fn run(cli: Cli) -> Result<()> {
    let (config, source) = load_config(&cli)?;
    let args = &cli.run;
    let catalog = Arc::new(config.catalog());

    let spawn_animation = match args.animation.as_deref() {
        Some(name) => catalog
            .position(name)
            .ok_or_else(|| anyhow!("animation '{name}' is not in the catalog"))?,
        None => 0,
    };

    let [x, y] = config.placement.default_position;
    let options = ManagerOptions {
        key_settings: key_settings(&config),
        frame_interval: config.playback.frame_interval,
        default_offset: Point::new(x, y),
        spawn_animation,
    };
    let seed = placement_seed(args);
    tracing::info!(
        config = %source,
        animations = catalog.len(),
        interval_ms = options.frame_interval.as_millis() as u64,
        tolerance = options.key_settings.tolerance,
        seed,
        "starting floatpet"
    );

    let opener = FfmpegOpener::new(media_tools(&config), config.playback.preload);
    let mut display = DisplayConfig::new(MenuModel::new(
        config.menu.animations_label.clone(),
        &catalog,
    ));
    display.startup = if args.rave {
        Startup::Rave
    } else {
        Startup::Single
    };
    let manager = WindowManager::new(
        catalog,
        Box::new(opener),
        options,
        display.fallback_screen,
        seed,
    );
    renderer::run(manager, display)
}

pub fn print_catalog(cli: &Cli, args: &CatalogArgs) -> Result<()> {
    let (config, source) = load_config(cli)?;
    if args.json {
        let json = serde_json::to_string_pretty(&config.animations)
            .context("failed to serialise catalog")?;
        println!("{json}");
        return Ok(());
    }

    println!("Catalog ({source}):");
    for (index, animation) in config.animations.iter().enumerate() {
        let status = if animation.path.is_file() {
            "present"
        } else {
            "missing"
        };
        println!(
            "  {:>2}  {:<12} {:<8} {}",
            index + 1,
            animation.name,
            status,
            animation.path.display()
        );
    }
    Ok(())
}

pub fn check_catalog(cli: &Cli) -> Result<()> {
    let (config, _) = load_config(cli)?;
    let tools = media_tools(&config);
    let mut failures = 0usize;
    for animation in &config.animations {
        match probe_clip(&tools, &animation.path) {
            Ok(info) => println!(
                "  ok    {:<12} {}x{} @ {:.2} fps",
                animation.name,
                info.width,
                info.height,
                info.fps()
            ),
            Err(err) => {
                failures += 1;
                println!("  FAIL  {:<12} {err}", animation.name);
            }
        }
    }
    if failures > 0 {
        bail!(
            "{failures} of {} animations cannot be played",
            config.animations.len()
        );
    }
    println!("All {} animations are playable.", config.animations.len());
    Ok(())
}
