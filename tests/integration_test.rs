//! Integration tests for tier selection, matrix fitting and persistence
//!
//! These tests drive the calibration manager end to end against a simulated
//! sensor whose channels cross-talk through a fixed 3x3 matrix.

mod common;

use colorsense::calibration::{CalibrationManager, CompensationLevel};
use colorsense::storage::{persist, JsonFileStore, KeyValueStore, MemoryStore};
use colorsense::{CalibrationColor, CalibrationError, CalibrationTier, CorrectionMethod, RawReading, RgbColor};

use common::{manager, simulate_color, test_config, FakeLed, FlakyStore, ScriptedSensor};

fn add(manager: &mut common::TestManager<impl KeyValueStore>, color: CalibrationColor) {
    manager
        .add_or_update_point(color.reference().name, simulate_color(color), 1.0)
        .unwrap();
}

// ============================================================================
// Tier Selection Tests
// ============================================================================

#[test]
fn test_fallback_without_points() {
    let manager = manager();
    let correction = manager.correct(RawReading::new(25600, 51200, 12800));
    assert_eq!(manager.active_tier(), CalibrationTier::Fallback);
    assert_eq!(correction.method, CorrectionMethod::Fallback);
    assert_eq!(correction.rgb, RgbColor::new(100, 200, 50));
    assert!(!correction.is_calibrated());
}

#[test]
fn test_two_point_worked_example() {
    let mut manager = manager();
    manager.add_or_update_point("black", RawReading::new(500, 600, 400), 1.0).unwrap();
    manager
        .add_or_update_point("white", RawReading::new(45000, 50000, 35000), 1.0)
        .unwrap();

    assert_eq!(manager.active_tier(), CalibrationTier::TwoPoint);
    let correction = manager.correct(RawReading::new(22750, 25300, 17700));
    assert_eq!(correction.method, CorrectionMethod::TwoPoint);
    assert_eq!(correction.rgb, RgbColor::new(126, 126, 124));
}

#[test]
fn test_two_point_boundary_exactness() {
    let mut manager = manager();
    manager.add_or_update_point("black", RawReading::new(500, 600, 400), 1.0).unwrap();
    manager
        .add_or_update_point("white", RawReading::new(45000, 50000, 35000), 1.0)
        .unwrap();

    assert_eq!(manager.correct(RawReading::new(500, 600, 400)).rgb, RgbColor::new(5, 5, 5));
    assert_eq!(
        manager.correct(RawReading::new(45000, 50000, 35000)).rgb,
        RgbColor::new(247, 248, 244)
    );
}

#[test]
fn test_white_alone_stays_fallback() {
    let mut manager = manager();
    add(&mut manager, CalibrationColor::White);
    assert_eq!(manager.active_tier(), CalibrationTier::Fallback);
    assert!(!manager.status().is_complete());
}

#[test]
fn test_fifth_diverse_point_activates_matrix() {
    let mut manager = manager();
    add(&mut manager, CalibrationColor::Black);
    add(&mut manager, CalibrationColor::White);
    add(&mut manager, CalibrationColor::Red);
    add(&mut manager, CalibrationColor::Green);
    assert_eq!(manager.active_tier(), CalibrationTier::TwoPoint);
    assert!(!manager.matrix().is_valid);

    add(&mut manager, CalibrationColor::Blue);
    assert_eq!(manager.active_tier(), CalibrationTier::Matrix);
    assert!(manager.matrix().is_valid);
    assert!(manager.matrix().condition_number <= 1000.0);
    assert!(manager.last_error().is_none());

    let correction = manager.correct(simulate_color(CalibrationColor::Red));
    assert_eq!(correction.method, CorrectionMethod::Matrix(CompensationLevel::None));
}

#[test]
fn test_matrix_reproduces_targets() {
    let mut manager = manager();
    for color in CalibrationColor::SEQUENCE {
        add(&mut manager, color);
    }
    assert_eq!(manager.active_tier(), CalibrationTier::Matrix);

    let report = manager.accuracy_report();
    assert_eq!(report.tier, CalibrationTier::Matrix);
    assert_eq!(report.residuals.len(), 6);
    assert!(report.max_delta_e < 3.0, "max delta E {}", report.max_delta_e);
}

#[test]
fn test_refit_is_idempotent() {
    let mut manager = manager();
    for color in CalibrationColor::SEQUENCE {
        add(&mut manager, color);
    }
    let first = *manager.matrix();
    add(&mut manager, CalibrationColor::Yellow);
    let yellow = manager.points().iter().find(|p| p.target == CalibrationColor::Yellow.target()).unwrap();
    assert_eq!(yellow.raw, simulate_color(CalibrationColor::Yellow));
    assert_eq!(first.m, manager.matrix().m);
}

#[test]
fn test_non_diverse_points_keep_two_point() {
    let mut manager = manager();
    for (i, color) in CalibrationColor::SEQUENCE.iter().enumerate() {
        let base = 20000 + i as u16 * 100;
        manager
            .add_or_update_point(color.reference().name, RawReading::new(base, base + 10, base + 20), 1.0)
            .unwrap();
    }

    assert_eq!(manager.points().len(), 6);
    assert_eq!(manager.active_tier(), CalibrationTier::TwoPoint);
    assert!(!manager.matrix().is_valid);
    assert!(manager.last_error().unwrap().contains("diversity"));
    assert_eq!(manager.correct(RawReading::new(20000, 20010, 20020)).rgb, RgbColor::new(5, 5, 5));
}

#[test]
fn test_black_reference_enables_black_only_level() {
    let mut manager = manager();
    for color in CalibrationColor::SEQUENCE {
        add(&mut manager, color);
    }
    manager
        .calibrate_black_reference(simulate_color(CalibrationColor::Black))
        .unwrap();
    let correction = manager.correct(simulate_color(CalibrationColor::Green));
    assert_eq!(correction.method, CorrectionMethod::Matrix(CompensationLevel::BlackOnly));

    manager.calibrate_dark_offset(RawReading::new(50, 60, 40)).unwrap();
    let correction = manager.correct(simulate_color(CalibrationColor::Green));
    assert_eq!(correction.method, CorrectionMethod::Matrix(CompensationLevel::Professional));
}

#[test]
fn test_status_tracks_points() {
    let mut manager = manager();
    add(&mut manager, CalibrationColor::Black);
    add(&mut manager, CalibrationColor::White);
    add(&mut manager, CalibrationColor::Yellow);

    let status = manager.status();
    assert!(status.black && status.white && status.yellow);
    assert!(!status.red);
    assert!(status.is_complete());
    assert_eq!(status.progress(), 50);
}

// ============================================================================
// Persistence Tests
// ============================================================================

#[test]
fn test_save_then_load_through_store() {
    let mut store = MemoryStore::new();
    let saved = {
        let mut manager = CalibrationManager::with_config(
            ScriptedSensor::new(),
            FakeLed::new(200),
            &mut store,
            test_config(),
        );
        manager.initialize().unwrap();
        for color in CalibrationColor::SEQUENCE {
            add(&mut manager, color);
        }
        manager.calibrate_dark_offset(RawReading::new(50, 60, 40)).unwrap();
        manager
            .calibrate_black_reference(simulate_color(CalibrationColor::Black))
            .unwrap();
        manager.snapshot()
    };

    let mut restored = CalibrationManager::with_config(
        ScriptedSensor::new(),
        FakeLed::new(200),
        &mut store,
        test_config(),
    );
    restored.initialize().unwrap();

    assert_eq!(restored.snapshot(), saved);
    assert_eq!(restored.active_tier(), CalibrationTier::Matrix);
    assert!(restored.dark_offset().is_some());
}

#[test]
fn test_failed_save_keeps_point_in_memory() {
    let mut manager = CalibrationManager::with_config(
        ScriptedSensor::new(),
        FakeLed::new(200),
        FlakyStore::default(),
        test_config(),
    );
    manager.initialize().unwrap();
    manager.store_mut().fail_writes = true;

    manager.add_or_update_point("red", RawReading::new(100, 200, 300), 1.0).unwrap();
    assert_eq!(manager.points().len(), 1);
    assert!(manager.last_error().unwrap().contains("Storage"));
    assert!(manager.store().inner.is_empty());

    manager.store_mut().fail_writes = false;
    manager.save().unwrap();
    assert_eq!(persist::load(manager.store()).points.len(), 1);
}

#[test]
fn test_json_file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.json");
    {
        let store = JsonFileStore::open(&path).unwrap();
        let mut manager =
            CalibrationManager::with_config(ScriptedSensor::new(), FakeLed::new(200), store, test_config());
        manager.initialize().unwrap();
        manager.add_or_update_point("black", RawReading::new(500, 600, 400), 1.0).unwrap();
        manager
            .add_or_update_point("white", RawReading::new(45000, 50000, 35000), 0.8)
            .unwrap();
    }

    let store = JsonFileStore::open(&path).unwrap();
    let mut manager = CalibrationManager::with_config(ScriptedSensor::new(), FakeLed::new(200), store, test_config());
    manager.initialize().unwrap();

    assert_eq!(manager.points().len(), 2);
    assert_eq!(manager.active_tier(), CalibrationTier::TwoPoint);
    assert!((manager.points()[1].quality - 0.8).abs() < 1e-6);
}

#[test]
fn test_reset_clears_store() {
    let mut manager = manager();
    add(&mut manager, CalibrationColor::Black);
    manager.reset_calibration().unwrap();
    assert!(manager.points().is_empty());
    assert_eq!(manager.store().get_u32("num_points", 0), 0);
}

// ============================================================================
// Error Handling Tests
// ============================================================================

#[test]
fn test_vivid_white_name_stores_white_point() {
    let mut manager = manager();
    manager.add_or_update_point("black", RawReading::new(500, 600, 400), 1.0).unwrap();
    manager
        .add_or_update_point("vivid-white", RawReading::new(45000, 50000, 35000), 1.0)
        .unwrap();
    assert!(manager.status().white);
    assert_eq!(manager.active_tier(), CalibrationTier::TwoPoint);

    manager
        .add_or_update_point("white", RawReading::new(46000, 51000, 36000), 1.0)
        .unwrap();
    assert_eq!(manager.points().len(), 2);
}

#[test]
fn test_saturated_reading_flagged_on_two_point_tier() {
    let mut manager = manager();
    manager.add_or_update_point("black", RawReading::new(500, 600, 400), 1.0).unwrap();
    manager
        .add_or_update_point("white", RawReading::new(45000, 50000, 35000), 1.0)
        .unwrap();
    let correction = manager.correct(RawReading::new(65535, 100, 100));
    assert_eq!(correction.method, CorrectionMethod::TwoPoint);
    assert!(correction.saturated);
    assert_eq!(correction.rgb.r, 255);
}

#[test]
fn test_zero_reading_on_uncalibrated_manager_is_not_calibrated() {
    let manager = manager();
    let correction = manager.correct(RawReading::new(0, 0, 0));
    assert_eq!(correction.rgb, RgbColor::BLACK);
    assert_eq!(correction.tier(), CalibrationTier::Fallback);
    assert!(!correction.is_calibrated());
}

#[test]
fn test_unknown_color_is_hard_error() {
    let mut manager = manager();
    let err = manager
        .add_or_update_point("magenta", RawReading::new(1, 2, 3), 1.0)
        .unwrap_err();
    assert!(matches!(err, CalibrationError::UnknownColor { .. }));
    assert!(!err.is_recoverable());
}

#[test]
fn test_uninitialized_manager_still_corrects() {
    let manager = CalibrationManager::new(ScriptedSensor::new(), FakeLed::new(200), MemoryStore::new());
    let correction = manager.correct(RawReading::new(512, 1024, 2048));
    assert_eq!(correction.rgb, RgbColor::new(2, 4, 8));
    assert_eq!(manager.active_tier(), CalibrationTier::Fallback);
}
