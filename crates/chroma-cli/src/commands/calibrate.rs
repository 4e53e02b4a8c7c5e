//! Calibrate command.
//!
//! Runs a complete white/black reference session on the rig: the white
//! tile is placed first, then the black trap, and the references are saved.
//! The countdowns are skipped; a scan may be submitted at any time.

use anyhow::{Context, Result};
use chroma_core::{BlackCalibration, WhiteCalibration};

use super::{open, Bench};
use crate::sim::{self, BLACK_TRAP_AMBIENT, WHITE_TILE};
use crate::{CalibrateArgs, GlobalArgs};

/// Runs the calibrate command.
pub fn run(args: CalibrateArgs, global: &GlobalArgs) -> Result<()> {
    let white_counts = match &args.white {
        Some(s) => sim::parse_counts(s).context("Invalid --white")?,
        None => WHITE_TILE,
    };
    let black_ambient = match &args.black {
        Some(s) => sim::parse_counts(s).context("Invalid --black")?,
        None => BLACK_TRAP_AMBIENT,
    };

    let mut bench = open(global)?;
    let result = session(&mut bench, white_counts, black_ambient, args.brightness, args.white_only);
    if result.is_err() {
        bench.device.cancel_calibration();
    }
    result
}

fn session(
    bench: &mut Bench,
    white_counts: [f32; 4],
    black_ambient: [f32; 4],
    brightness: Option<u8>,
    white_only: bool,
) -> Result<()> {
    bench
        .device
        .start_calibration(brightness)
        .context("Failed to start calibration")?;
    println!("{}", bench.device.calibration_status().message);

    bench.show(white_counts, [0.0; 4]);
    let white = bench
        .device
        .submit_white_scan()
        .with_context(|| failure(bench, "White scan failed"))?;
    print_white(&white);

    if !white_only {
        bench
            .device
            .confirm_black()
            .context("Failed to confirm black scan")?;
        bench.show([0.0; 4], black_ambient);
        let black = bench
            .device
            .submit_black_scan()
            .with_context(|| failure(bench, "Black scan failed"))?;
        print_black(&black);
    }

    bench
        .device
        .save_calibration()
        .context("Failed to save calibration")?;
    println!("{}", bench.device.calibration_status().message);
    Ok(())
}

fn failure(bench: &Bench, what: &str) -> String {
    match bench.device.calibration_status().error {
        Some(reason) => format!("{what}: {reason}"),
        None => what.to_string(),
    }
}

fn print_white(white: &WhiteCalibration) {
    println!(
        "White reference: X={} Y={} Z={} IR={} at LED {}",
        white.x, white.y, white.z, white.ir, white.brightness
    );
}

fn print_black(black: &BlackCalibration) {
    println!(
        "Black reference: X={} Y={} Z={} IR={}",
        black.x, black.y, black.z, black.ir
    );
}
