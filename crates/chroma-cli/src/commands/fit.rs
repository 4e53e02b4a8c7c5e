//! Fit command.
//!
//! Loads a reference set, shows each patch to the sensor at a fixed LED
//! level, fits the chosen matrix and reports the per-patch Delta-E.

use anyhow::{Context, Result};
use chroma_calib::{CalibrationStats, ReferencePoint};
use chroma_color::MatrixType;
use chroma_device::ReferenceSet;
use tracing::info;

use super::{open, print_json};
use crate::sim::patch_counts;
use crate::{FitArgs, GlobalArgs, MatrixSlot, PatchSet};

/// Runs the fit command.
pub fn run(args: FitArgs, global: &GlobalArgs) -> Result<()> {
    let mut bench = open(global)?;
    let set = match args.set {
        PatchSet::ColorChecker => ReferenceSet::ColorChecker,
        PatchSet::Primaries => ReferenceSet::Primaries,
    };
    let ty = match args.matrix {
        MatrixSlot::Low => MatrixType::LowIr,
        MatrixSlot::High => MatrixType::HighIr,
    };

    let count = bench.device.load_reference_set(set);
    let patches: Vec<[u8; 3]> = bench
        .device
        .reference_points()
        .iter()
        .map(|p| p.reference)
        .collect();

    let level = bench.device.config().sensor.led_brightness;
    bench.device.set_led_manual(Some(level));
    let measured = measure_all(&mut bench, &patches);
    bench.device.set_led_manual(None);
    measured?;
    info!(count, ?set, led = level, "reference set measured");

    let stats = bench
        .device
        .fit_matrix(ty)
        .with_context(|| format!("Failed to fit {ty} matrix"))?;

    if let Some(path) = &args.export {
        let json = bench
            .device
            .export_calibration()
            .context("Failed to export calibration")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if args.json {
        return print_json(&serde_json::json!({
            "matrix": ty.name(),
            "statistics": stats,
            "reference_points": bench.device.reference_points(),
        }));
    }

    print_points(bench.device.reference_points());
    print_stats(ty, &stats);
    if let Some(path) = &args.export {
        println!("Calibration exported to {}", path.display());
    }
    Ok(())
}

fn measure_all(bench: &mut super::Bench, patches: &[[u8; 3]]) -> Result<()> {
    for (i, &rgb) in patches.iter().enumerate() {
        bench.show(patch_counts(rgb), [0.0; 4]);
        bench
            .device
            .measure_reference(i)
            .with_context(|| format!("Failed to measure patch {i} {rgb:?}"))?;
    }
    Ok(())
}

fn print_points(points: &[ReferencePoint]) {
    for p in points {
        let [r, g, b] = p.reference;
        let [x, y, z, ir] = p.sensor;
        println!(
            "  {:<14} #{r:02x}{g:02x}{b:02x}  X={x:<5} Y={y:<5} Z={z:<5} IR={ir:<5} dE={:.2}",
            p.name, p.delta_e
        );
    }
}

fn print_stats(ty: MatrixType, stats: &CalibrationStats) {
    println!("{ty} matrix fitted over {} points", stats.total_points);
    println!(
        "  mean dE {:.2}  std {:.2}  max {:.2}",
        stats.mean_delta_e, stats.std_delta_e, stats.max_delta_e
    );
    println!(
        "  under 2: {}  under 5: {}  quality {:.0}/100",
        stats.points_under_2, stats.points_under_5, stats.quality_score
    );
}
