//! Samples command.

use anyhow::{Context, Result};
use chroma_device::ColorSample;

use super::{open, print_json};
use crate::{GlobalArgs, SampleAction, SamplesArgs};

/// Runs the samples command.
pub fn run(args: SamplesArgs, global: &GlobalArgs) -> Result<()> {
    let mut bench = open(global)?;
    match args.action.unwrap_or(SampleAction::List) {
        SampleAction::List => {
            let samples: Vec<&ColorSample> = bench.device.samples().collect();
            if args.json {
                return print_json(&samples);
            }
            if samples.is_empty() {
                println!("No samples");
            }
            for (i, s) in samples.iter().enumerate() {
                println!(
                    "{i:>3}  {}  {:<20} {:<10} LRV {:>5.1}  t={} ms",
                    s.hex(),
                    s.paint.name,
                    s.paint.code,
                    s.paint.lrv,
                    s.timestamp_ms
                );
            }
        }
        SampleAction::Delete { index } => {
            let removed = bench
                .device
                .delete_sample(index)
                .with_context(|| format!("Failed to delete sample {index}"))?;
            if args.json {
                return print_json(&removed);
            }
            println!(
                "Deleted {} - {} remaining",
                removed.hex(),
                bench.device.sample_count()
            );
        }
        SampleAction::Clear => {
            let count = bench.device.sample_count();
            bench.device.clear_samples().context("Failed to clear samples")?;
            println!("Cleared {count} samples");
        }
    }
    Ok(())
}
