//! Field-by-field save and load of calibration state
//!
//! Layout:
//!
//! | Key | Type |
//! |-----|------|
//! | `dark_offset_cal` | bool |
//! | `dark_offset_{x,y,z,ts}` | u32 |
//! | `dark_offset_q` | f32 |
//! | `black_ref_cal` | bool |
//! | `black_ref_{x,y,z,ts}` | u32 |
//! | `black_ref_{r,g,b}` | u8 |
//! | `black_ref_q` | f32 |
//! | `num_points` | u32 |
//! | `point_{i}_{x,y,z,ts}` | u32 |
//! | `point_{i}_{r,g,b}` | u8 |
//! | `point_{i}_quality` | f32 |
//!
//! Absent keys load as zero, except quality (1.0) and the black-reference
//! target (the registry black).

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::KeyValueStore;
use crate::calibration::point::{CalibrationPoint, RawReading};
use crate::color::CalibrationColor;
use crate::constants::storage::MAX_STORED_POINTS;
use crate::{Result, RgbColor};

/// Everything the manager persists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredCalibration {
    pub points: Vec<CalibrationPoint>,
    pub dark_offset: Option<CalibrationPoint>,
    pub black_reference: Option<CalibrationPoint>,
}

/// Write calibration state to `store`
///
/// Stops at the first failed write.
pub fn save<K: KeyValueStore + ?Sized>(store: &mut K, calibration: &StoredCalibration) -> Result<()> {
    store.put_bool("dark_offset_cal", calibration.dark_offset.is_some())?;
    if let Some(dark) = &calibration.dark_offset {
        put_raw(store, "dark_offset_", &dark.raw)?;
        store.put_u32("dark_offset_ts", dark.timestamp)?;
        store.put_f32("dark_offset_q", dark.quality)?;
    }

    store.put_bool("black_ref_cal", calibration.black_reference.is_some())?;
    if let Some(black) = &calibration.black_reference {
        put_raw(store, "black_ref_", &black.raw)?;
        put_target(store, "black_ref_", &black.target)?;
        store.put_u32("black_ref_ts", black.timestamp)?;
        store.put_f32("black_ref_q", black.quality)?;
    }

    let count = u32::try_from(calibration.points.len()).unwrap_or(u32::MAX);
    store.put_u32("num_points", count)?;
    for (i, point) in calibration.points.iter().enumerate() {
        let prefix = format!("point_{}_", i);
        put_raw(store, &prefix, &point.raw)?;
        put_target(store, &prefix, &point.target)?;
        store.put_u32(&format!("{}ts", prefix), point.timestamp)?;
        store.put_f32(&format!("{}quality", prefix), point.quality)?;
    }

    debug!(points = count, "calibration saved");
    Ok(())
}

/// Read calibration state from `store`
pub fn load<K: KeyValueStore + ?Sized>(store: &K) -> StoredCalibration {
    let dark_offset = store.get_bool("dark_offset_cal", false).then(|| CalibrationPoint {
        raw: get_raw(store, "dark_offset_"),
        target: RgbColor::BLACK,
        timestamp: store.get_u32("dark_offset_ts", 0),
        quality: store.get_f32("dark_offset_q", 1.0),
    });

    let black_target = CalibrationColor::Black.target();
    let black_reference = store.get_bool("black_ref_cal", false).then(|| CalibrationPoint {
        raw: get_raw(store, "black_ref_"),
        target: RgbColor::new(
            store.get_u8("black_ref_r", black_target.r),
            store.get_u8("black_ref_g", black_target.g),
            store.get_u8("black_ref_b", black_target.b),
        ),
        timestamp: store.get_u32("black_ref_ts", 0),
        quality: store.get_f32("black_ref_q", 1.0),
    });

    let mut count = store.get_u32("num_points", 0);
    if count > MAX_STORED_POINTS {
        warn!(count, max = MAX_STORED_POINTS, "stored point count out of range, truncating");
        count = MAX_STORED_POINTS;
    }

    let points = (0..count)
        .map(|i| {
            let prefix = format!("point_{}_", i);
            CalibrationPoint {
                raw: get_raw(store, &prefix),
                target: RgbColor::new(
                    store.get_u8(&format!("{}r", prefix), 0),
                    store.get_u8(&format!("{}g", prefix), 0),
                    store.get_u8(&format!("{}b", prefix), 0),
                ),
                timestamp: store.get_u32(&format!("{}ts", prefix), 0),
                quality: store.get_f32(&format!("{}quality", prefix), 1.0),
            }
        })
        .collect::<Vec<_>>();

    debug!(
        points = points.len(),
        dark_offset = dark_offset.is_some(),
        black_reference = black_reference.is_some(),
        "calibration loaded"
    );

    StoredCalibration {
        points,
        dark_offset,
        black_reference,
    }
}

fn put_raw<K: KeyValueStore + ?Sized>(store: &mut K, prefix: &str, raw: &RawReading) -> Result<()> {
    store.put_u32(&format!("{}x", prefix), u32::from(raw.x))?;
    store.put_u32(&format!("{}y", prefix), u32::from(raw.y))?;
    store.put_u32(&format!("{}z", prefix), u32::from(raw.z))
}

fn put_target<K: KeyValueStore + ?Sized>(store: &mut K, prefix: &str, target: &RgbColor) -> Result<()> {
    store.put_u8(&format!("{}r", prefix), target.r)?;
    store.put_u8(&format!("{}g", prefix), target.g)?;
    store.put_u8(&format!("{}b", prefix), target.b)
}

fn get_raw<K: KeyValueStore + ?Sized>(store: &K, prefix: &str) -> RawReading {
    let channel = |name: &str| {
        let value = store.get_u32(&format!("{}{}", prefix, name), 0);
        u16::try_from(value).unwrap_or(u16::MAX)
    };
    RawReading::new(channel("x"), channel("y"), channel("z"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn sample() -> StoredCalibration {
        StoredCalibration {
            points: vec![
                CalibrationPoint::with_timestamp(RawReading::new(500, 600, 400), RgbColor::new(5, 5, 5), 100, 0.9),
                CalibrationPoint::with_timestamp(
                    RawReading::new(45000, 50000, 35000),
                    RgbColor::new(247, 248, 244),
                    101,
                    1.0,
                ),
            ],
            dark_offset: Some(CalibrationPoint::with_timestamp(
                RawReading::new(120, 130, 110),
                RgbColor::BLACK,
                99,
                0.95,
            )),
            black_reference: Some(CalibrationPoint::with_timestamp(
                RawReading::new(500, 600, 400),
                RgbColor::new(5, 5, 5),
                100,
                0.9,
            )),
        }
    }

    #[test]
    fn test_save_then_load_reproduces_state() {
        let mut store = MemoryStore::new();
        let original = sample();
        save(&mut store, &original).unwrap();
        assert_eq!(load(&store), original);
    }

    #[test]
    fn test_key_layout() {
        let mut store = MemoryStore::new();
        save(&mut store, &sample()).unwrap();
        assert_eq!(store.get_u32("num_points", 0), 2);
        assert_eq!(store.get_u32("point_1_y", 0), 50000);
        assert_eq!(store.get_u8("point_1_b", 0), 244);
        assert!(store.get_bool("dark_offset_cal", false));
        assert_eq!(store.get_u32("dark_offset_x", 0), 120);
        assert_eq!(store.get_u8("black_ref_r", 0), 5);
    }

    #[test]
    fn test_empty_store_loads_nothing() {
        let loaded = load(&MemoryStore::new());
        assert_eq!(loaded, StoredCalibration::default());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let mut store = MemoryStore::new();
        store.put_u32("num_points", 1).unwrap();
        store.put_bool("black_ref_cal", true).unwrap();
        let loaded = load(&store);
        assert_eq!(loaded.points[0].quality, 1.0);
        assert_eq!(loaded.points[0].raw, RawReading::default());
        let black = loaded.black_reference.unwrap();
        assert_eq!(black.target, RgbColor::new(5, 5, 5));
        assert_eq!(black.quality, 1.0);
    }

    #[test]
    fn test_absent_records_saved_as_flags() {
        let mut store = MemoryStore::new();
        let calibration = StoredCalibration {
            points: sample().points,
            ..StoredCalibration::default()
        };
        save(&mut store, &calibration).unwrap();
        assert!(!store.get_bool("dark_offset_cal", true));
        assert!(!store.contains_key("dark_offset_x"));
        assert_eq!(load(&store).dark_offset, None);
    }

    #[test]
    fn test_point_count_is_capped() {
        let mut store = MemoryStore::new();
        store.put_u32("num_points", 10_000).unwrap();
        assert_eq!(load(&store).points.len(), MAX_STORED_POINTS as usize);
    }
}
