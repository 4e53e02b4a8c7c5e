//! Diagnostics command.

use anyhow::Result;

use super::{open, print_json};
use crate::{DiagnosticsArgs, GlobalArgs};

/// Runs the diagnostics command.
pub fn run(args: DiagnosticsArgs, global: &GlobalArgs) -> Result<()> {
    let bench = open(global)?;
    let d = bench.device.diagnostics();
    if args.json {
        return print_json(&d);
    }

    let s = &d.sensor;
    println!("Sensor");
    println!(
        "  ATIME {}  gain {}  LED {}  lighting {}{}",
        s.integration_time,
        s.gain,
        s.led_brightness,
        d.lighting_condition,
        if d.initialized { "" } else { "  (not initialized)" }
    );
    if d.adjustment_failures > 0 {
        println!("  preset failures: {}", d.adjustment_failures);
    }
    if let Some(err) = &d.last_sensor_error {
        println!("  last error: {err}");
    }

    println!("Calibration");
    println!(
        "  valid {}  dual {}  IR thresholds {:.2}..{:.2}",
        d.calibration_valid, d.dual_mode, d.ir_thresholds.low, d.ir_thresholds.high
    );
    println!("  low IR: {}  high IR: {}", d.low_ir_source, d.high_ir_source);
    if d.calibration_stats.total_points > 0 {
        println!(
            "  last fit: {} points, mean dE {:.2}, quality {:.0}",
            d.calibration_stats.total_points,
            d.calibration_stats.mean_delta_e,
            d.calibration_stats.quality_score
        );
    }
    println!(
        "  white reference {}  black reference {}  reference points {}",
        yes_no(d.white_valid),
        yes_no(d.black_valid),
        d.reference_points
    );
    println!("  session: {} ({})", d.workflow.state, d.workflow.message);

    println!("Samples: {}", d.sample_count);
    println!("Uptime:  {} ms", d.uptime_ms);
    Ok(())
}

fn yes_no(v: bool) -> &'static str {
    if v { "yes" } else { "no" }
}
