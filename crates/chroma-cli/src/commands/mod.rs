//! CLI command implementations.

pub mod calibrate;
pub mod diagnostics;
pub mod fit;
pub mod samples;
pub mod scan;

use anyhow::{Context, Result};
use chroma_calib::FileStore;
use chroma_device::{Colorimeter, DeviceConfig, Peripherals};
use chroma_sensor::sim::{SceneState, SimRig};
use chroma_sensor::SystemClock;
use serde::Serialize;
use std::rc::Rc;
use tracing::debug;

use crate::{sim, GlobalArgs, ResetArgs};

/// An initialised device and the rig it looks through.
pub struct Bench {
    pub device: Colorimeter,
    pub rig: SimRig,
}

impl Bench {
    /// Puts a surface with the given reference-level counts in front of
    /// the sensor.
    pub fn show(&self, counts: [f32; 4], ambient: [f32; 4]) {
        self.rig.set_surface(sim::response(counts), ambient);
    }
}

/// Loads the config file, or the defaults when none was given.
pub fn load_config(global: &GlobalArgs) -> Result<DeviceConfig> {
    match &global.config {
        Some(path) => DeviceConfig::from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => Ok(DeviceConfig::default()),
    }
}

/// Opens the store, builds the rig and initialises the device.
pub fn open(global: &GlobalArgs) -> Result<Bench> {
    let config = load_config(global)?;
    let counts = sim::surface_counts(&global.surface)?;
    let ambient = match &global.ambient {
        Some(s) => sim::parse_counts(s).context("Invalid --ambient")?,
        None => [0.0; 4],
    };

    let rig = SimRig::new(SceneState::dark());
    rig.set_surface(sim::response(counts), ambient);

    let store = FileStore::open(&global.store)
        .with_context(|| format!("Failed to open store: {}", global.store.display()))?;
    let mut hw = Peripherals::simulated(&rig, Box::new(store));
    if global.realtime {
        hw.clock = Rc::new(SystemClock::new());
    }

    let mut device = Colorimeter::new(config, hw);
    device.initialize().context("Failed to initialize colorimeter")?;
    debug!(store = %global.store.display(), surface = %global.surface, "device ready");
    Ok(Bench { device, rig })
}

/// Prints a value as pretty JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

/// Restores the factory matrices.
pub fn reset(args: ResetArgs, global: &GlobalArgs) -> Result<()> {
    let mut bench = open(global)?;
    bench
        .device
        .reset_calibration()
        .context("Failed to reset calibration")?;
    if !args.keep_references {
        bench
            .device
            .clear_references()
            .context("Failed to clear references")?;
    }
    println!("Calibration reset to factory defaults");
    if !args.keep_references {
        println!("White and black references cleared");
    }
    Ok(())
}

/// Prints the effective configuration.
pub fn print_config(global: &GlobalArgs) -> Result<()> {
    let config = load_config(global)?;
    print!("{}", config.to_yaml().context("Failed to serialize config")?);
    Ok(())
}
