//! White and black reference persistence.
//!
//! References are stored as scalar keys next to the matrix blobs. A
//! reference whose `has_*` flag is unset or missing loads as invalid.

use chroma_core::{BlackCalibration, WhiteCalibration, DEFAULT_LED_BRIGHTNESS};
use tracing::info;

use crate::error::CalibResult;
use crate::kv::KeyValueStore;

/// Storage keys.
pub mod keys {
    /// White reference present.
    pub const HAS_WHITE: &str = "has_white_cal";
    /// Black reference present.
    pub const HAS_BLACK: &str = "has_black_cal";
    /// White X count.
    pub const WHITE_X: &str = "white_cal_x";
    /// White Y count.
    pub const WHITE_Y: &str = "white_cal_y";
    /// White Z count.
    pub const WHITE_Z: &str = "white_cal_z";
    /// White IR count.
    pub const WHITE_IR: &str = "white_cal_ir";
    /// White LED brightness.
    pub const WHITE_BRIGHTNESS: &str = "white_cal_brightness";
    /// White capture time.
    pub const WHITE_TIMESTAMP: &str = "white_cal_timestamp";
    /// White point X.
    pub const WHITE_POINT_X: &str = "white_point_x";
    /// White point Y.
    pub const WHITE_POINT_Y: &str = "white_point_y";
    /// White point Z.
    pub const WHITE_POINT_Z: &str = "white_point_z";
    /// White scaling factor.
    pub const WHITE_SCALE: &str = "white_scale";
    /// Black X count.
    pub const BLACK_X: &str = "black_cal_x";
    /// Black Y count.
    pub const BLACK_Y: &str = "black_cal_y";
    /// Black Z count.
    pub const BLACK_Z: &str = "black_cal_z";
    /// Black IR count.
    pub const BLACK_IR: &str = "black_cal_ir";
    /// Black capture time.
    pub const BLACK_TIMESTAMP: &str = "black_cal_timestamp";
}

fn get_u16(kv: &dyn KeyValueStore, key: &str) -> u16 {
    u16::try_from(kv.get_u64(key, 0)).unwrap_or(u16::MAX)
}

/// Writes both references. An invalid reference clears its flag.
pub fn save_references(
    kv: &mut dyn KeyValueStore,
    white: &WhiteCalibration,
    black: &BlackCalibration,
) -> CalibResult<()> {
    kv.put_bool(keys::HAS_WHITE, white.valid)?;
    if white.valid {
        kv.put_u64(keys::WHITE_X, white.x.into())?;
        kv.put_u64(keys::WHITE_Y, white.y.into())?;
        kv.put_u64(keys::WHITE_Z, white.z.into())?;
        kv.put_u64(keys::WHITE_IR, white.ir.into())?;
        kv.put_u64(keys::WHITE_BRIGHTNESS, white.brightness.into())?;
        kv.put_u64(keys::WHITE_TIMESTAMP, white.timestamp_ms)?;
        kv.put_f32(keys::WHITE_POINT_X, white.white_point[0])?;
        kv.put_f32(keys::WHITE_POINT_Y, white.white_point[1])?;
        kv.put_f32(keys::WHITE_POINT_Z, white.white_point[2])?;
        kv.put_f32(keys::WHITE_SCALE, white.scaling_factor)?;
    }

    kv.put_bool(keys::HAS_BLACK, black.valid)?;
    if black.valid {
        kv.put_u64(keys::BLACK_X, black.x.into())?;
        kv.put_u64(keys::BLACK_Y, black.y.into())?;
        kv.put_u64(keys::BLACK_Z, black.z.into())?;
        kv.put_u64(keys::BLACK_IR, black.ir.into())?;
        kv.put_u64(keys::BLACK_TIMESTAMP, black.timestamp_ms)?;
    }
    info!(white = white.valid, black = black.valid, "references saved");
    Ok(())
}

/// Reads both references; missing data yields invalid defaults.
///
/// A white reference stored without white point keys takes its raw
/// counts as the white point.
pub fn load_references(kv: &dyn KeyValueStore) -> (WhiteCalibration, BlackCalibration) {
    let mut white = WhiteCalibration::default();
    if kv.get_bool(keys::HAS_WHITE, false) {
        white = WhiteCalibration {
            x: get_u16(kv, keys::WHITE_X),
            y: get_u16(kv, keys::WHITE_Y),
            z: get_u16(kv, keys::WHITE_Z),
            ir: get_u16(kv, keys::WHITE_IR),
            brightness: u8::try_from(kv.get_u64(keys::WHITE_BRIGHTNESS, DEFAULT_LED_BRIGHTNESS.into()))
                .unwrap_or(DEFAULT_LED_BRIGHTNESS),
            timestamp_ms: kv.get_u64(keys::WHITE_TIMESTAMP, 0),
            valid: true,
            white_point: [0.0; 3],
            scaling_factor: kv.get_f32(keys::WHITE_SCALE, 0.0),
        };
        let xyz = white.xyz();
        white.white_point = [
            kv.get_f32(keys::WHITE_POINT_X, xyz[0]),
            kv.get_f32(keys::WHITE_POINT_Y, xyz[1]),
            kv.get_f32(keys::WHITE_POINT_Z, xyz[2]),
        ];
        info!(x = white.x, y = white.y, z = white.z, ir = white.ir, "white reference loaded");
    }

    let mut black = BlackCalibration::default();
    if kv.get_bool(keys::HAS_BLACK, false) {
        black = BlackCalibration {
            x: get_u16(kv, keys::BLACK_X),
            y: get_u16(kv, keys::BLACK_Y),
            z: get_u16(kv, keys::BLACK_Z),
            ir: get_u16(kv, keys::BLACK_IR),
            timestamp_ms: kv.get_u64(keys::BLACK_TIMESTAMP, 0),
            valid: true,
        };
        info!(x = black.x, y = black.y, z = black.z, ir = black.ir, "black reference loaded");
    }
    (white, black)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;

    #[test]
    fn test_roundtrip() {
        let white = WhiteCalibration {
            x: 50000,
            y: 52000,
            z: 48000,
            ir: 3000,
            brightness: 128,
            timestamp_ms: 1234,
            valid: true,
            white_point: [49700.0, 51700.0, 47700.0],
            scaling_factor: 0.000_967,
        };
        let black = BlackCalibration {
            x: 300,
            y: 320,
            z: 280,
            ir: 40,
            timestamp_ms: 2345,
            valid: true,
        };
        let mut kv = MemoryStore::new();
        save_references(&mut kv, &white, &black).unwrap();
        let (w, b) = load_references(&kv);
        assert_eq!(w, white);
        assert_eq!(b, black);
    }

    #[test]
    fn test_invalid_black_clears_flag() {
        let mut kv = MemoryStore::new();
        let white = WhiteCalibration {
            x: 40000,
            y: 40000,
            z: 40000,
            valid: true,
            ..Default::default()
        };
        let black = BlackCalibration {
            x: 200,
            y: 200,
            z: 200,
            valid: true,
            ..Default::default()
        };
        save_references(&mut kv, &white, &black).unwrap();
        save_references(&mut kv, &white, &BlackCalibration::default()).unwrap();
        let (w, b) = load_references(&kv);
        assert!(w.valid);
        assert!(!b.valid);
    }

    #[test]
    fn test_white_point_defaults_to_counts() {
        let mut kv = MemoryStore::new();
        kv.put_bool(keys::HAS_WHITE, true).unwrap();
        kv.put_u64(keys::WHITE_X, 41000).unwrap();
        kv.put_u64(keys::WHITE_Y, 42000).unwrap();
        kv.put_u64(keys::WHITE_Z, 40000).unwrap();
        let (w, b) = load_references(&kv);
        assert!(w.valid);
        assert_eq!(w.white_point, [41000.0, 42000.0, 40000.0]);
        assert_eq!(w.brightness, DEFAULT_LED_BRIGHTNESS);
        assert!(!b.valid);
    }

    #[test]
    fn test_fresh_store() {
        let (w, b) = load_references(&MemoryStore::new());
        assert!(!w.valid);
        assert!(!b.valid);
    }
}
