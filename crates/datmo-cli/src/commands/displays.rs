//! Displays command
//!
//! Lists the display presets with their luminance range and the viewing
//! geometry they would be used with.

use crate::DisplaysArgs;
use anyhow::{Context, Result};
use datmo_tmo::{DisplayFunction, DisplayPreset, DisplaySize};

pub fn run(args: DisplaysArgs, verbose: u8) -> Result<()> {
    let size = DisplaySize::parse(&args.display_size)
        .with_context(|| format!("Invalid display size: {}", args.display_size))?;

    println!("{:<12} {:>6} {:>10} {:>10} {:>10}", "NAME", "GAMMA", "PEAK", "BLACK", "RANGE");
    for preset in DisplayPreset::ALL {
        let params = preset.params();
        let display = DisplayFunction::Ggba(params);
        let (lo, hi) = (display.min_luminance(), display.max_luminance());
        println!(
            "{:<12} {:>6.2} {:>10.2} {:>10.3} {:>10.2}",
            preset.name(),
            params.gamma,
            hi,
            lo,
            (hi / lo).log10()
        );
        if verbose > 0 {
            println!("  {display}");
        }
    }

    println!();
    println!("{}", size.describe());
    println!("Custom displays: -d g=<gamma>:l=<peak>:b=<black>:k=<reflectivity>:a=<ambient lux>");

    Ok(())
}
