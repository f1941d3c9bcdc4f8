//! Calibration manager
//!
//! Owns the captured points, the dark-offset and black-reference records and
//! the fitted matrix. Every correction request picks the best tier available
//! at that moment:
//!
//! 1. **Matrix** when the matrix is valid and enough points are stored
//! 2. **Two-point** when black and white points exist
//! 3. **Fallback** otherwise
//!
//! A correction is always produced. Point and matrix failures only lower
//! the active tier.

use tracing::{debug, info, warn};

use crate::calibration::accuracy::AccuracyReport;
use crate::calibration::matrix::{CompensationLevel, CorrectionMatrix};
use crate::calibration::point::{CalibrationPoint, IrReading, RawReading};
use crate::calibration::session::AutoCalibrationStatus;
use crate::calibration::solver::MatrixSolver;
use crate::calibration::status::CalibrationStatus;
use crate::calibration::tier::{fallback_rgb, two_point_rgb, CalibrationTier, Correction, CorrectionMethod};
use crate::color::{lookup, CalibrationColor};
use crate::config::CalibrationConfig;
use crate::hardware::{settle, ColorSensor, Illumination};
use crate::storage::{persist, KeyValueStore, StoredCalibration};
use crate::{CalibrationError, Result, RgbColor};

/// Sensor settings in effect when the dark offset was measured
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSettings {
    pub gain: f32,
    pub integration_time_ms: u16,
}

/// Calibration engine bound to one sensor, one light and one store
pub struct CalibrationManager<S, L, K> {
    pub(super) sensor: S,
    pub(super) illumination: L,
    pub(super) store: K,
    pub(super) config: CalibrationConfig,
    pub(super) solver: MatrixSolver,
    pub(super) points: Vec<CalibrationPoint>,
    pub(super) matrix: CorrectionMatrix,
    pub(super) dark_offset: Option<CalibrationPoint>,
    pub(super) dark_offset_settings: Option<SensorSettings>,
    pub(super) black_reference: Option<CalibrationPoint>,
    pub(super) initialized: bool,
    pub(super) last_error: Option<String>,
    pub(super) session: AutoCalibrationStatus,
}

impl<S, L, K> CalibrationManager<S, L, K>
where
    S: ColorSensor,
    L: Illumination,
    K: KeyValueStore,
{
    /// Create a manager with default configuration
    pub fn new(sensor: S, illumination: L, store: K) -> Self {
        Self::with_config(sensor, illumination, store, CalibrationConfig::default())
    }

    pub fn with_config(sensor: S, illumination: L, store: K, config: CalibrationConfig) -> Self {
        Self {
            sensor,
            illumination,
            store,
            solver: MatrixSolver::new(config.solver.clone()),
            config,
            points: Vec::new(),
            matrix: CorrectionMatrix::default(),
            dark_offset: None,
            dark_offset_settings: None,
            black_reference: None,
            initialized: false,
            last_error: None,
            session: AutoCalibrationStatus::default(),
        }
    }

    /// Load persisted calibration and refit the matrix
    ///
    /// Must be called before any operation that records calibration data.
    pub fn initialize(&mut self) -> Result<()> {
        self.load();
        if self.points.len() >= self.config.solver.min_matrix_points {
            self.recalculate_matrix();
        }
        self.initialized = true;
        info!(
            points = self.points.len(),
            tier = self.active_tier().name(),
            "calibration manager initialized"
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Store or replace the point for a registry color
    ///
    /// # Arguments
    ///
    /// * `color_name` - Registry name, case-insensitive
    /// * `raw` - Averaged sensor reading of the sample
    /// * `quality` - Capture quality in [0, 1]
    ///
    /// # Errors
    ///
    /// Fails without changing anything when the manager is not initialized,
    /// the name is unknown, the reading is all zero or the quality is out of
    /// range. A matrix that cannot be fitted or a failed save does not fail
    /// the call; both are logged and kept in [`Self::last_error`].
    pub fn add_or_update_point(&mut self, color_name: &str, raw: RawReading, quality: f32) -> Result<()> {
        let outcome = self.try_add_point(color_name, raw, quality);
        if let Err(err) = &outcome {
            warn!(color = color_name, error = %err, "calibration point rejected");
            self.last_error = Some(err.to_string());
        }
        outcome
    }

    fn try_add_point(&mut self, color_name: &str, raw: RawReading, quality: f32) -> Result<()> {
        self.ensure_initialized()?;
        let reference = lookup(color_name)?;
        if raw.is_zero() {
            return Err(CalibrationError::ZeroReading);
        }
        if !(0.0..=1.0).contains(&quality) {
            return Err(CalibrationError::InvalidQuality { quality });
        }

        self.last_error = None;
        self.warn_if_saturated(reference.name, raw);
        info!(
            color = reference.name,
            x = raw.x,
            y = raw.y,
            z = raw.z,
            rgb = %reference.rgb.hex(),
            "calibration point captured"
        );

        self.upsert(CalibrationPoint::new(raw, reference.rgb, quality));
        self.recalculate_matrix();
        self.persist();
        Ok(())
    }

    /// Record an LED-off reading as the dark offset
    pub fn calibrate_dark_offset(&mut self, raw: RawReading) -> Result<()> {
        self.ensure_initialized()?;
        self.last_error = None;
        self.dark_offset = Some(CalibrationPoint::new(raw, RgbColor::BLACK, 1.0));
        info!(x = raw.x, y = raw.y, z = raw.z, "dark offset recorded");
        self.persist();
        Ok(())
    }

    /// Record an illuminated black-sample reading
    ///
    /// Stored both as the black reference and as the regular black point.
    pub fn calibrate_black_reference(&mut self, raw: RawReading) -> Result<()> {
        self.ensure_initialized()?;
        if raw.is_zero() {
            self.last_error = Some(CalibrationError::ZeroReading.to_string());
            return Err(CalibrationError::ZeroReading);
        }
        self.last_error = None;
        self.warn_if_saturated("black", raw);

        let point = CalibrationPoint::new(raw, CalibrationColor::Black.target(), 1.0);
        self.black_reference = Some(point);
        self.upsert(point);
        info!(x = raw.x, y = raw.y, z = raw.z, "black reference recorded");

        self.recalculate_matrix();
        self.persist();
        Ok(())
    }

    /// Drop the dark offset, for example after a sensor setting change
    pub fn invalidate_dark_offset(&mut self) {
        if self.dark_offset.take().is_some() {
            info!("dark offset invalidated");
        }
        self.dark_offset_settings = None;
        if self.initialized {
            self.persist();
        }
    }

    /// Re-measure the dark offset when gain or integration time changed
    ///
    /// # Returns
    ///
    /// `true` if a new dark offset was measured. A stored offset with no
    /// recorded settings, as after a restart, adopts the current settings
    /// without re-measuring.
    pub fn recalibrate_dark_offset_if_needed(&mut self, gain: f32, integration_time_ms: u16) -> Result<bool> {
        self.ensure_initialized()?;
        let current = SensorSettings {
            gain,
            integration_time_ms,
        };

        match (self.dark_offset.is_some(), self.dark_offset_settings) {
            (true, Some(recorded)) if recorded == current => return Ok(false),
            (true, None) => {
                self.dark_offset_settings = Some(current);
                return Ok(false);
            }
            _ => {}
        }

        info!(gain, integration_time_ms, "sensor settings changed, re-measuring dark offset");
        let (prior, raw) = self.measure_dark()?;
        self.illumination.set_brightness(prior)?;
        self.calibrate_dark_offset(raw)?;
        self.dark_offset_settings = Some(current);
        Ok(true)
    }

    /// Switch the LED off, settle, and read
    ///
    /// Returns the prior brightness with the reading and leaves the LED off.
    /// A failed read restores the prior brightness before returning.
    pub(super) fn measure_dark(&mut self) -> Result<(u8, RawReading)> {
        let prior = self.illumination.brightness();
        self.illumination.set_brightness(0)?;
        settle(self.config.sampling.dark_settle_delay());

        match self.sensor.read_averaged() {
            Ok(raw) => {
                debug!(x = raw.x, y = raw.y, z = raw.z, prior, "dark reading");
                Ok((prior, raw))
            }
            Err(err) => {
                if let Err(restore) = self.illumination.set_brightness(prior) {
                    warn!(error = %restore, "failed to restore illumination");
                }
                Err(err)
            }
        }
    }

    /// Remove every point and record, in memory and in the store
    pub fn reset_calibration(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        self.points.clear();
        self.matrix = CorrectionMatrix::default();
        self.dark_offset = None;
        self.dark_offset_settings = None;
        self.black_reference = None;
        self.last_error = None;
        self.store.clear()?;
        info!("calibration reset");
        Ok(())
    }

    /// Write the current state to the store
    pub fn save(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        let snapshot = self.snapshot();
        persist::save(&mut self.store, &snapshot)
    }

    /// Replace in-memory state with what the store holds
    pub fn load(&mut self) {
        let stored = persist::load(&self.store);
        self.points = stored.points;
        self.dark_offset = stored.dark_offset;
        self.black_reference = stored.black_reference;
        self.dark_offset_settings = None;
    }

    /// Current calibration state as a persistable value
    pub fn snapshot(&self) -> StoredCalibration {
        StoredCalibration {
            points: self.points.clone(),
            dark_offset: self.dark_offset,
            black_reference: self.black_reference,
        }
    }

    /// Correct a raw reading with the best available tier
    ///
    /// An all-zero reading maps to black and is tagged with the tier active
    /// at the time, so it only counts as calibrated when a tier above the
    /// fallback is.
    pub fn correct(&self, raw: RawReading) -> Correction {
        if !self.initialized {
            debug!("manager not initialized, using fallback conversion");
            return self.uncalibrated(raw);
        }

        if raw.is_zero() {
            return Correction::new(RgbColor::BLACK, CorrectionMethod::ZeroInput(self.active_tier()));
        }

        if self.is_matrix_calibrated() {
            // The matrix pipeline reports saturation itself
            return self.matrix.apply(
                raw,
                CompensationLevel::Auto,
                self.dark_offset.as_ref(),
                self.black_reference.as_ref(),
            );
        }

        let saturated = raw.is_saturated(self.config.sensor.saturation_threshold);
        if let (Some(black), Some(white)) = (
            self.find_point(CalibrationColor::Black.target()),
            self.find_point(CalibrationColor::White.target()),
        ) {
            self.warn_if_saturated("two-point", raw);
            return Correction {
                rgb: two_point_rgb(raw, black, white),
                method: CorrectionMethod::TwoPoint,
                saturated,
            };
        }

        self.uncalibrated(raw)
    }

    fn uncalibrated(&self, raw: RawReading) -> Correction {
        self.warn_if_saturated("fallback", raw);
        Correction {
            rgb: fallback_rgb(raw),
            method: CorrectionMethod::Fallback,
            saturated: raw.is_saturated(self.config.sensor.saturation_threshold),
        }
    }

    /// Subtract IR leakage, then correct
    pub fn correct_with_ir(&self, reading: &IrReading) -> Correction {
        self.correct(self.config.ir_compensation.apply(reading))
    }

    /// Read the sensor and correct the result
    pub fn read_and_correct(&mut self) -> Result<Correction> {
        let reading = self.sensor.read_with_ir()?;
        Ok(self.correct_with_ir(&reading))
    }

    /// Tier [`Self::correct`] would use right now
    pub fn active_tier(&self) -> CalibrationTier {
        if !self.initialized {
            CalibrationTier::Fallback
        } else if self.is_matrix_calibrated() {
            CalibrationTier::Matrix
        } else if self.is_two_point_calibrated() {
            CalibrationTier::TwoPoint
        } else {
            CalibrationTier::Fallback
        }
    }

    pub fn is_matrix_calibrated(&self) -> bool {
        self.matrix.is_valid && self.points.len() >= self.config.solver.min_matrix_points
    }

    pub fn is_two_point_calibrated(&self) -> bool {
        self.find_point(CalibrationColor::Black.target()).is_some()
            && self.find_point(CalibrationColor::White.target()).is_some()
    }

    /// Residual error of the active tier at every stored point
    pub fn accuracy_report(&self) -> AccuracyReport {
        AccuracyReport::evaluate(self.active_tier(), &self.points, |point| self.correct(point.raw))
    }

    pub fn status(&self) -> CalibrationStatus {
        CalibrationStatus::from_points(&self.points)
    }

    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }

    pub fn find_point(&self, target: RgbColor) -> Option<&CalibrationPoint> {
        self.points.iter().find(|point| point.target == target)
    }

    pub fn matrix(&self) -> &CorrectionMatrix {
        &self.matrix
    }

    pub fn dark_offset(&self) -> Option<&CalibrationPoint> {
        self.dark_offset.as_ref()
    }

    pub fn black_reference(&self) -> Option<&CalibrationPoint> {
        self.black_reference.as_ref()
    }

    /// Text of the most recent failure or warning
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn illumination(&self) -> &L {
        &self.illumination
    }

    pub fn illumination_mut(&mut self) -> &mut L {
        &mut self.illumination
    }

    pub fn store(&self) -> &K {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut K {
        &mut self.store
    }

    pub(super) fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(CalibrationError::NotInitialized)
        }
    }

    fn upsert(&mut self, point: CalibrationPoint) {
        match self.points.iter_mut().find(|existing| existing.target == point.target) {
            Some(existing) => *existing = point,
            None => self.points.push(point),
        }
    }

    /// Refit when enough points exist; a failed fit invalidates the matrix
    fn recalculate_matrix(&mut self) {
        if self.points.len() < self.config.solver.min_matrix_points {
            debug!(
                points = self.points.len(),
                needed = self.config.solver.min_matrix_points,
                "not enough points for matrix fit"
            );
            return;
        }

        match self.solver.calculate_ccm(&self.points) {
            Ok(matrix) => self.matrix = matrix,
            Err(err) => {
                self.matrix.is_valid = false;
                self.last_error = Some(err.to_string());
            }
        }
    }

    /// Save, keeping in-memory state if the write fails
    fn persist(&mut self) {
        let snapshot = self.snapshot();
        if let Err(err) = persist::save(&mut self.store, &snapshot) {
            warn!(error = %err, "calibration not saved, keeping in-memory state");
            self.last_error = Some(err.to_string());
        }
    }

    fn warn_if_saturated(&self, color: &str, raw: RawReading) {
        if raw.is_saturated(self.config.sensor.saturation_threshold) {
            warn!(
                color,
                x = raw.x,
                y = raw.y,
                z = raw.z,
                "sensor saturation, reduce LED brightness or integration time"
            );
        }
    }
}
