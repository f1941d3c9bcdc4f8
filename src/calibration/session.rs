//! Guided auto-calibration workflow
//!
//! Steps through black, white, red, green, blue and yellow. Black takes two
//! phases in one step: a dark-offset capture with the LED off, then the
//! black-reference capture with the LED back at its prior level.
//!
//! ```text
//! Idle ──start──▶ InProgress ──last step / complete──▶ Completed
//!                     │
//!                     └──cancel──▶ Cancelled
//! ```

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::calibration::manager::CalibrationManager;
use crate::color::CalibrationColor;
use crate::hardware::{ColorSensor, Illumination};
use crate::storage::KeyValueStore;
use crate::{CalibrationError, Result, RgbColor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoCalibrationState {
    #[default]
    Idle,
    InProgress,
    Completed,
    Cancelled,
}

/// Snapshot of a guided session, suitable for showing to the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoCalibrationStatus {
    pub state: AutoCalibrationState,
    /// Zero-based position in the color sequence
    pub step_index: usize,
    pub total_steps: usize,
    pub current_color: CalibrationColor,
    pub target: RgbColor,
    pub display_name: String,
    pub can_skip: bool,
    pub instructions: String,
    /// Black step is still waiting for its dark-offset capture
    pub is_black_phase1: bool,
    /// Percentage of steps finished
    pub progress: u8,
    /// LED level to restore once the dark-offset phase is over
    #[serde(skip)]
    pub(crate) saved_brightness: Option<u8>,
}

impl Default for AutoCalibrationStatus {
    fn default() -> Self {
        let black = CalibrationColor::Black.reference();
        Self {
            state: AutoCalibrationState::Idle,
            step_index: 0,
            total_steps: CalibrationColor::SEQUENCE.len(),
            current_color: black.color,
            target: black.rgb,
            display_name: black.display_name.to_string(),
            can_skip: false,
            instructions: String::new(),
            is_black_phase1: false,
            progress: 0,
            saved_brightness: None,
        }
    }
}

impl AutoCalibrationStatus {
    pub fn is_active(&self) -> bool {
        self.state == AutoCalibrationState::InProgress
    }

    fn at_step(&mut self, index: usize) {
        let color = CalibrationColor::SEQUENCE[index];
        let reference = color.reference();
        self.step_index = index;
        self.current_color = color;
        self.target = reference.rgb;
        self.display_name = reference.display_name.to_string();
        self.can_skip = !color.is_mandatory();
        self.is_black_phase1 = color == CalibrationColor::Black;
        self.progress = (index * 100 / self.total_steps) as u8;
        self.instructions = self.phase_instructions();
    }

    fn phase_instructions(&self) -> String {
        match (self.current_color, self.is_black_phase1) {
            (CalibrationColor::Black, true) => {
                "Stage 1: cover the sensor completely to block all light. The LED turns off for the dark offset measurement.".to_string()
            }
            (CalibrationColor::Black, false) => {
                "Stage 2: place the black sample over the sensor. The LED is back on for the black reference measurement.".to_string()
            }
            _ => format!("Place the {} sample over the sensor and press next.", self.display_name),
        }
    }

    fn phase_name(&self) -> String {
        match (self.current_color, self.is_black_phase1) {
            (CalibrationColor::Black, true) => "dark offset".to_string(),
            (CalibrationColor::Black, false) => "black reference".to_string(),
            _ => self.display_name.clone(),
        }
    }
}

impl<S, L, K> CalibrationManager<S, L, K>
where
    S: ColorSensor,
    L: Illumination,
    K: KeyValueStore,
{
    /// Begin a guided session at black, phase 1
    ///
    /// Restarting over an active session first restores any LED level that
    /// session saved.
    pub fn start_auto_calibration(&mut self) -> Result<&AutoCalibrationStatus> {
        self.ensure_initialized()?;
        if self.session.is_active() {
            self.restore_saved_brightness()?;
        }

        let mut status = AutoCalibrationStatus {
            state: AutoCalibrationState::InProgress,
            ..AutoCalibrationStatus::default()
        };
        status.at_step(0);
        self.session = status;
        info!(steps = self.session.total_steps, "auto-calibration started");
        Ok(&self.session)
    }

    pub fn auto_calibration_status(&self) -> &AutoCalibrationStatus {
        &self.session
    }

    /// Capture the current (sub-)phase and advance on success
    ///
    /// # Errors
    ///
    /// [`CalibrationError::SessionNotActive`] outside a session, or
    /// [`CalibrationError::CaptureFailed`] when the capture failed. A failed
    /// capture leaves the step and phase unchanged, updates the
    /// instructions and commits nothing.
    pub fn auto_calibration_next(&mut self) -> Result<&AutoCalibrationStatus> {
        if !self.session.is_active() {
            return Err(CalibrationError::SessionNotActive);
        }

        let phase = self.session.phase_name();
        let captured = match (self.session.current_color, self.session.is_black_phase1) {
            (CalibrationColor::Black, true) => self.capture_dark_phase(),
            (CalibrationColor::Black, false) => self.capture_black_phase(),
            (color, _) => self.capture_color(color),
        };

        if let Err(err) = captured {
            warn!(phase = %phase, error = %err, "auto-calibration capture failed");
            self.session.instructions = format!("{} failed: {}. {}", phase, err, self.session.phase_instructions());
            let failure = CalibrationError::CaptureFailed {
                phase,
                reason: err.to_string(),
            };
            self.last_error = Some(failure.to_string());
            return Err(failure);
        }

        Ok(&self.session)
    }

    /// Reissue the instructions for the current (sub-)phase
    pub fn auto_calibration_retry(&mut self) -> Result<&AutoCalibrationStatus> {
        if !self.session.is_active() {
            return Err(CalibrationError::SessionNotActive);
        }
        self.session.instructions = format!("Retry: {}", self.session.phase_instructions());
        Ok(&self.session)
    }

    /// Move past an optional color without storing a point
    pub fn auto_calibration_skip(&mut self) -> Result<&AutoCalibrationStatus> {
        if !self.session.is_active() {
            return Err(CalibrationError::SessionNotActive);
        }
        if !self.session.can_skip {
            return Err(CalibrationError::SkipNotAllowed {
                color: self.session.display_name.clone(),
            });
        }
        info!(color = %self.session.display_name, "auto-calibration step skipped");
        self.advance();
        Ok(&self.session)
    }

    /// Finish the session now
    ///
    /// Leaves the LED on: a level saved by the dark-offset phase is
    /// restored, and an LED still at zero is set to the safe default.
    pub fn auto_calibration_complete(&mut self) -> Result<&AutoCalibrationStatus> {
        if !self.session.is_active() {
            return Err(CalibrationError::SessionNotActive);
        }
        self.session.state = AutoCalibrationState::Completed;
        self.session.progress = 100;
        self.session.instructions = "Auto-calibration completed.".to_string();
        self.restore_saved_brightness()?;
        self.ensure_safe_illumination()?;
        info!(points = self.points.len(), tier = self.active_tier().name(), "auto-calibration completed");
        Ok(&self.session)
    }

    /// Abandon the session, keeping every point already committed
    pub fn cancel_auto_calibration(&mut self) -> Result<&AutoCalibrationStatus> {
        if !self.session.is_active() {
            return Err(CalibrationError::SessionNotActive);
        }
        self.restore_saved_brightness()?;
        self.session.state = AutoCalibrationState::Cancelled;
        self.session.instructions = "Auto-calibration cancelled.".to_string();
        info!(step = self.session.step_index, "auto-calibration cancelled");
        Ok(&self.session)
    }

    fn capture_dark_phase(&mut self) -> Result<()> {
        let (prior, raw) = self.measure_dark()?;
        // A repeated phase 1 sees the LED already off; keep the first level
        self.session.saved_brightness.get_or_insert(prior);
        self.calibrate_dark_offset(raw)?;
        self.session.is_black_phase1 = false;
        self.session.instructions = self.session.phase_instructions();
        Ok(())
    }

    fn capture_black_phase(&mut self) -> Result<()> {
        self.restore_saved_brightness()?;
        let raw = self.sensor.read_averaged()?;
        self.calibrate_black_reference(raw)?;
        self.advance();
        Ok(())
    }

    fn capture_color(&mut self, color: CalibrationColor) -> Result<()> {
        let raw = self.sensor.read_averaged()?;
        self.add_or_update_point(color.reference().name, raw, 1.0)?;
        self.advance();
        Ok(())
    }

    fn advance(&mut self) {
        let next = self.session.step_index + 1;
        if next < self.session.total_steps {
            self.session.at_step(next);
            return;
        }

        self.session.step_index = next;
        self.session.state = AutoCalibrationState::Completed;
        self.session.progress = 100;
        self.session.instructions = "Auto-calibration completed successfully.".to_string();
        if let Err(err) = self.ensure_safe_illumination() {
            warn!(error = %err, "could not restore illumination after calibration");
            self.last_error = Some(err.to_string());
        }
        info!(points = self.points.len(), tier = self.active_tier().name(), "auto-calibration finished");
    }

    fn restore_saved_brightness(&mut self) -> Result<()> {
        if let Some(level) = self.session.saved_brightness {
            self.illumination.set_brightness(level)?;
            self.session.saved_brightness = None;
        }
        Ok(())
    }

    fn ensure_safe_illumination(&mut self) -> Result<()> {
        if self.illumination.brightness() == 0 {
            let level = self.config.illumination.safe_default_brightness;
            self.illumination.set_brightness(level)?;
            info!(level, "illumination restored to safe default");
        }
        Ok(())
    }
}
