//! Scan command.
//!
//! Single scans run the full pipeline (sensor tuning, LED search, quality
//! burst, correction). Continuous scans report channel stability instead.

use anyhow::{Context, Result};
use chroma_device::{ContinuousScan, ScanResult};

use super::{open, print_json};
use crate::{GlobalArgs, ScanArgs};

/// Runs the scan command.
pub fn run(args: ScanArgs, global: &GlobalArgs) -> Result<()> {
    let mut bench = open(global)?;
    if args.led.is_some() {
        bench.device.set_led_manual(args.led);
    }

    if args.continuous {
        let result = bench
            .device
            .continuous_scan()
            .context("Continuous scan failed")?;
        if args.json {
            return print_json(&result);
        }
        print_continuous(&result);
        return Ok(());
    }

    let scan = bench.device.perform_scan().context("Scan failed")?;
    let sample = if args.save {
        Some(bench.device.save_sample(scan.rgb).context("Failed to save sample")?)
    } else {
        None
    };

    if args.json {
        return print_json(&serde_json::json!({ "scan": scan, "sample": sample }));
    }
    print_scan(&scan, global.verbose);
    if let Some(sample) = sample {
        println!(
            "Saved sample {} ({}, {}) - {} stored",
            sample.hex(),
            sample.paint.name,
            sample.paint.code,
            bench.device.sample_count()
        );
    }
    Ok(())
}

fn print_scan(scan: &ScanResult, verbose: bool) {
    let [r, g, b] = scan.rgb;
    println!("Colour:      {} (R={r} G={g} B={b})", scan.hex());
    println!("Calibration: {}", scan.mode);
    println!(
        "Quality:     {} (score {})",
        scan.quality.level(),
        scan.quality.quality_score
    );
    println!("LED:         {}", scan.brightness);
    println!(
        "xyY:         {:.4}, {:.4}, {:.1}",
        scan.xyy.x, scan.xyy.y, scan.xyy.big_y
    );
    println!("CCT:         {:.0} K", scan.cct);
    if verbose {
        let raw = &scan.raw;
        println!(
            "Raw:         X={} Y={} Z={} IR1={} IR2={}",
            raw.r, raw.g, raw.b, raw.ir, raw.ir2
        );
        let [x, y, z] = scan.calibrated;
        println!("Corrected:   X={x:.1} Y={y:.1} Z={z:.1}");
        println!(
            "CV:          {:.4}{}{}",
            scan.quality.coefficient_of_variation,
            if scan.quality.has_saturation { " saturated" } else { "" },
            if scan.quality.has_low_signal { " low-signal" } else { "" }
        );
    }
}

fn print_continuous(result: &ContinuousScan) {
    println!(
        "{} readings over {} ms, consistency {}",
        result.readings, result.duration_ms, result.consistency
    );
    for (name, ch) in ["X", "Y", "Z", "IR"].iter().zip(&result.channels) {
        println!(
            "  {name:<2} mean {:>8.1}  min {:>5}  max {:>5}  variation {:>5.1}%",
            ch.mean, ch.min, ch.max, ch.variation_pct
        );
    }
    let [r, g, b] = result.rgb;
    println!(
        "Mean colour: #{r:02x}{g:02x}{b:02x} ({}), peak variation {:.1}%",
        result.mode, result.max_variation_pct
    );
}
