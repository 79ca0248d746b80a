//! datmo - display adaptive tone mapping CLI
//!
//! Reads an HDR frame, computes a display-adaptive tone curve for the chosen
//! display and viewing conditions, and writes the display-referred result.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "datmo")]
#[command(author, version, about = "Display adaptive tone mapping")]
#[command(long_about = "
Tone-maps HDR images for a specific display and viewing distance by
maximizing the visibility of reproduced contrast.

Examples:
  datmo tonemap memorial.hdr -o memorial.png
  datmo tonemap in.hdr -o out.pfm -d lcd_bright -e 1.2 -s 0.8
  datmo tonemap in.hdr -o out.png -d g=2.2:l=250:b=0.5:k=0.01:a=100
  datmo tonemap in.hdr -o out.png --display-size vd=0.7:d=24 -f curve.csv
  datmo tonemap in.pfm -o out.png --config settings.yaml
  datmo info memorial.hdr --stats
  datmo displays
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (repeat for more: -v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Number of threads (0 = auto)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Tone-map an HDR image for a display
    #[command(visible_alias = "t")]
    Tonemap(TonemapArgs),

    /// Display frame information
    #[command(visible_alias = "i")]
    Info(InfoArgs),

    /// List display presets
    Displays(DisplaysArgs),
}

#[derive(Args)]
struct TonemapArgs {
    /// Input image (.hdr, .pic, .pfm)
    input: PathBuf,

    /// Output image (.hdr, .pfm, .png)
    #[arg(short, long)]
    output: PathBuf,

    /// Contrast enhancement factor (> 0)
    #[arg(short = 'e', long = "contrast")]
    contrast: Option<f32>,

    /// Color saturation factor (0-2)
    #[arg(short, long)]
    saturation: Option<f32>,

    /// Scene luminance mapped to the display peak (cd/m^2)
    #[arg(short = 'l', long = "white-y")]
    white_y: Option<f32>,

    /// Ignore --white-y and the settings file white; a WHITE_Y tag in the input still applies
    #[arg(long)]
    no_white_y: bool,

    /// Display: preset name or g=..:l=..:b=..:k=..:a=..
    #[arg(short, long)]
    display: Option<String>,

    /// Viewing geometry: vd=<distance m>:d=<diagonal in> or ppd=<n>
    #[arg(long)]
    display_size: Option<String>,

    /// RGB working space: srgb, rec2020
    #[arg(long)]
    working_space: Option<String>,

    /// Maximum optimizer iterations
    #[arg(long)]
    max_iterations: Option<usize>,

    /// YAML settings file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the tone curve as CSV
    #[arg(short = 'f', long = "tone-curve")]
    tone_curve: Option<PathBuf>,
}

#[derive(Args)]
struct InfoArgs {
    /// Input image(s)
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// Show luminance statistics
    #[arg(short, long)]
    stats: bool,
}

#[derive(Args)]
struct DisplaysArgs {
    /// Viewing geometry to describe alongside the presets
    #[arg(long, default_value = "vd=0.5:d=30")]
    display_size: String,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Configure thread pool
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    match cli.command {
        Commands::Tonemap(args) => commands::tonemap::run(args, cli.verbose),
        Commands::Info(args) => commands::info::run(args, cli.verbose),
        Commands::Displays(args) => commands::displays::run(args, cli.verbose),
    }
}
