//! Surfaces for the simulated rig.
//!
//! Surfaces are described by their counts at the reference LED level and
//! converted to the per-level response the rig expects. Painted patches
//! follow an affine model of their sRGB value, so a fitted matrix can
//! recover them.

use anyhow::{bail, Context, Result};
use chroma_core::DEFAULT_LED_BRIGHTNESS;

/// LED level the surface counts are given at.
pub const REFERENCE_LED: f32 = DEFAULT_LED_BRIGHTNESS as f32;

/// White calibration tile counts.
pub const WHITE_TILE: [f32; 4] = [50000.0, 52000.0, 48000.0, 3000.0];

/// Ambient counts inside a black trap.
pub const BLACK_TRAP_AMBIENT: [f32; 4] = [300.0, 320.0, 280.0, 40.0];

const PATCH_BASE: [f32; 4] = [800.0, 800.0, 800.0, 400.0];

const PATCH_GAIN: [[f32; 3]; 4] = [
    [120.0, 50.0, 30.0],
    [60.0, 140.0, 20.0],
    [10.0, 30.0, 160.0],
    [8.0, 4.0, 2.0],
];

/// Counts at the reference LED level for a painted patch.
pub fn patch_counts(rgb: [u8; 3]) -> [f32; 4] {
    let c = rgb.map(f32::from);
    std::array::from_fn(|i| {
        let g = PATCH_GAIN[i];
        PATCH_BASE[i] + g[0] * c[0] + g[1] * c[1] + g[2] * c[2]
    })
}

/// Rig response per LED level for counts at the reference level.
pub fn response(counts: [f32; 4]) -> [f32; 4] {
    counts.map(|c| c / REFERENCE_LED)
}

/// Parses `X,Y,Z,IR` counts.
pub fn parse_counts(s: &str) -> Result<[f32; 4]> {
    let values = s
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f32>()
                .with_context(|| format!("Invalid count '{}'", v.trim()))
        })
        .collect::<Result<Vec<_>>>()?;
    let counts: [f32; 4] = values
        .try_into()
        .map_err(|v: Vec<f32>| anyhow::anyhow!("Expected X,Y,Z,IR, got {} values", v.len()))?;
    if counts.iter().any(|c| !c.is_finite() || *c < 0.0) {
        bail!("Counts must be non-negative: {s}");
    }
    Ok(counts)
}

fn parse_hex(s: &str) -> Result<[u8; 3]> {
    let hex = s.trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        bail!("Invalid colour '{s}', expected #rrggbb");
    }
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16).with_context(|| format!("Invalid colour '{s}'"))
    };
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

/// Counts at the reference LED level for a surface given by name,
/// `#rrggbb` or `X,Y,Z,IR`.
pub fn surface_counts(surface: &str) -> Result<[f32; 4]> {
    let rgb = match surface.to_ascii_lowercase().as_str() {
        "white" => return Ok(WHITE_TILE),
        "black" => [0, 0, 0],
        "grey" | "gray" => [128, 128, 128],
        "red" => [255, 0, 0],
        "green" => [0, 255, 0],
        "blue" => [0, 0, 255],
        "cyan" => [0, 255, 255],
        "magenta" => [255, 0, 255],
        "yellow" => [255, 255, 0],
        s if s.starts_with('#') => parse_hex(s)?,
        s if s.contains(',') => return parse_counts(s),
        other => bail!("Unknown surface '{other}'"),
    };
    Ok(patch_counts(rgb))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_counts() {
        assert_eq!(parse_counts("1, 2,3,4").unwrap(), [1.0, 2.0, 3.0, 4.0]);
        assert!(parse_counts("1,2,3").is_err());
        assert!(parse_counts("1,2,3,x").is_err());
        assert!(parse_counts("1,2,3,-4").is_err());
    }

    #[test]
    fn test_surfaces() {
        assert_eq!(surface_counts("WHITE").unwrap(), WHITE_TILE);
        assert_eq!(surface_counts("black").unwrap(), PATCH_BASE);
        assert_eq!(surface_counts("#ff0000").unwrap(), patch_counts([255, 0, 0]));
        assert_eq!(surface_counts("10,20,30,40").unwrap(), [10.0, 20.0, 30.0, 40.0]);
        assert!(surface_counts("plaid").is_err());
        assert!(surface_counts("#ff00").is_err());
    }

    #[test]
    fn test_patches_stay_in_range() {
        for rgb in [[0, 0, 0], [255, 255, 255], [224, 163, 46]] {
            let counts = patch_counts(rgb);
            assert!(counts.iter().all(|&c| c >= 400.0 && c < 60000.0), "{rgb:?}");
        }
        assert_eq!(response([128.0, 256.0, 0.0, 64.0]), [1.0, 2.0, 0.0, 0.5]);
    }
}
