//! State that must survive a restart.

use crate::rig::*;
use chroma_color::{CalibrationMode, MatrixKind, MatrixType};
use chroma_device::ReferenceSet;
use chroma_sensor::sim::{SceneState, SimRig};

#[test]
fn test_calibration_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.yaml");
    let rig = SimRig::new(SceneState::dark());

    let mut dev = open_file(&rig, &path);
    calibrate(&mut dev, &rig);
    dev.load_reference_set(ReferenceSet::ColorChecker);
    measure_patches(&mut dev, &rig);
    dev.fit_matrix(MatrixType::LowIr).unwrap();
    dev.set_ir_thresholds(0.2, 0.4).unwrap();

    let patch = [98, 122, 157];
    show(&rig, patch_counts(patch));
    dev.set_led_manual(Some(128));
    let before = dev.perform_scan().unwrap();
    drop(dev);

    let mut dev = open_file(&rig, &path);
    assert!(dev.white_reference().valid);
    assert!(dev.black_reference().valid);
    assert_eq!(dev.black_reference().x, 300);
    let low = dev.calibration().matrix(MatrixType::LowIr);
    assert!(low.valid);
    assert_eq!(low.kind, MatrixKind::DisplayRgb);
    let t = dev.calibration().ir_thresholds();
    assert_eq!((t.low, t.high), (0.2, 0.4));

    dev.set_led_manual(Some(128));
    let after = dev.perform_scan().unwrap();
    assert_eq!(after.mode, CalibrationMode::TwoPoint);
    assert_eq!(after.rgb, before.rgb);
    assert_close(after.rgb, patch);
}

#[test]
fn test_reset_restores_factory_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.yaml");
    let rig = SimRig::new(SceneState::dark());

    let mut dev = open_file(&rig, &path);
    calibrate(&mut dev, &rig);
    dev.load_reference_set(ReferenceSet::ColorChecker);
    measure_patches(&mut dev, &rig);
    dev.fit_matrix(MatrixType::LowIr).unwrap();
    dev.reset_calibration().unwrap();
    dev.clear_references().unwrap();
    drop(dev);

    let dev = open_file(&rig, &path);
    let low = dev.calibration().matrix(MatrixType::LowIr);
    assert_eq!(low.kind, MatrixKind::Tristimulus);
    let d = dev.diagnostics();
    assert_eq!(d.low_ir_source, "stored_low_ir");
    assert!(d.dual_mode);
    assert!(!d.white_valid);
    assert!(!d.black_valid);
}

#[test]
fn test_samples_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.yaml");
    let rig = SimRig::new(SceneState::white_tile());

    let mut dev = open_file(&rig, &path);
    let scan = dev.perform_scan().unwrap();
    dev.save_sample(scan.rgb).unwrap();
    dev.save_sample([10, 20, 30]).unwrap();
    dev.delete_sample(1).unwrap();
    drop(dev);

    let dev = open_file(&rig, &path);
    let stored: Vec<[u8; 3]> = dev.samples().map(|s| s.rgb).collect();
    assert_eq!(stored, vec![[10, 20, 30]]);
    let sample = dev.samples().next().unwrap();
    assert_eq!(sample.paint.name, "Unknown");
    assert_eq!(sample.paint.code, "N/A");
}

#[test]
fn test_export_document() {
    let (mut dev, rig) = bench();
    calibrate(&mut dev, &rig);
    dev.load_reference_set(ReferenceSet::Primaries);
    measure_patches(&mut dev, &rig);
    dev.fit_matrix(MatrixType::LowIr).unwrap();

    let json: serde_json::Value = serde_json::from_str(&dev.export_calibration().unwrap()).unwrap();
    assert!(json["low_ir"].is_object());
    assert!(json["high_ir"].is_object());
    assert_eq!(json["dual_mode"], true);
    assert_eq!(json["reference_points"].as_array().unwrap().len(), 7);
    assert_eq!(json["statistics"]["total_points"], 7);
}
