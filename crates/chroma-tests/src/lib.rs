//! Integration tests for the chroma crates.
//!
//! End-to-end runs of the colorimeter over the simulated rig: reference
//! sessions, matrix fitting, scanning, and persistence across restarts.

#[cfg(test)]
mod persistence;

#[cfg(test)]
mod rig {
    use chroma_calib::{FileStore, KeyValueStore, MemoryStore};
    use chroma_device::{Colorimeter, DeviceConfig, Peripherals};
    use chroma_sensor::sim::{SceneState, SimRig};
    use std::path::Path;

    pub const WHITE_TILE: [f32; 4] = [50000.0, 52000.0, 48000.0, 3000.0];
    pub const BLACK_TRAP: [f32; 4] = [300.0, 320.0, 280.0, 40.0];

    /// Counts at LED 128 for a painted patch, affine in its sRGB value.
    pub fn patch_counts(rgb: [u8; 3]) -> [f32; 4] {
        let [r, g, b] = rgb.map(f32::from);
        [
            800.0 + 120.0 * r + 50.0 * g + 30.0 * b,
            800.0 + 60.0 * r + 140.0 * g + 20.0 * b,
            800.0 + 10.0 * r + 30.0 * g + 160.0 * b,
            400.0 + 8.0 * r + 4.0 * g + 2.0 * b,
        ]
    }

    pub fn show(rig: &SimRig, counts: [f32; 4]) {
        rig.set_surface(counts.map(|c| c / 128.0), [0.0; 4]);
    }

    pub fn open(rig: &SimRig, config: DeviceConfig, kv: Box<dyn KeyValueStore>) -> Colorimeter {
        let mut dev = Colorimeter::new(config, Peripherals::simulated(rig, kv));
        dev.initialize().unwrap();
        dev
    }

    pub fn open_file(rig: &SimRig, path: &Path) -> Colorimeter {
        open(rig, DeviceConfig::default(), Box::new(FileStore::open(path).unwrap()))
    }

    pub fn bench() -> (Colorimeter, SimRig) {
        let rig = SimRig::new(SceneState::dark());
        show(&rig, WHITE_TILE);
        let dev = open(&rig, DeviceConfig::default(), Box::new(MemoryStore::new()));
        (dev, rig)
    }

    /// White tile then black trap, saved.
    pub fn calibrate(dev: &mut Colorimeter, rig: &SimRig) {
        show(rig, WHITE_TILE);
        dev.start_calibration(Some(128)).unwrap();
        dev.submit_white_scan().unwrap();
        rig.set_surface([0.0; 4], BLACK_TRAP);
        dev.confirm_black().unwrap();
        dev.submit_black_scan().unwrap();
        dev.save_calibration().unwrap();
    }

    /// Measures every loaded reference patch at LED 128.
    pub fn measure_patches(dev: &mut Colorimeter, rig: &SimRig) {
        let patches: Vec<[u8; 3]> = dev.reference_points().iter().map(|p| p.reference).collect();
        dev.set_led_manual(Some(128));
        for (i, rgb) in patches.into_iter().enumerate() {
            show(rig, patch_counts(rgb));
            dev.measure_reference(i).unwrap();
        }
        dev.set_led_manual(None);
    }

    pub fn assert_close(actual: [u8; 3], expected: [u8; 3]) {
        for (a, e) in actual.iter().zip(expected) {
            assert!(a.abs_diff(e) <= 1, "{actual:?} vs {expected:?}");
        }
    }
}
