//! Error types for the colorsense library

use thiserror::Error;

/// Result type alias for colorsense operations
pub type Result<T> = std::result::Result<T, CalibrationError>;

/// Every failure the calibration pipeline can report
#[derive(Error, Debug)]
pub enum CalibrationError {
    /// Manager used before `initialize()`
    #[error("Calibration manager not initialized - call initialize() first")]
    NotInitialized,

    /// Color name not present in the reference registry
    #[error("Unknown reference color: {name} (supported: black, white, red, green, blue, yellow)")]
    UnknownColor { name: String },

    /// All three sensor channels read zero
    #[error("Invalid sensor reading: all channels are zero (sensor disconnected or covered)")]
    ZeroReading,

    /// Quality score outside [0, 1]
    #[error("Quality out of range [0.0, 1.0]: {quality}")]
    InvalidQuality { quality: f32 },

    /// Solver called with no points
    #[error("No calibration points provided")]
    EmptyPointSet,

    /// Solver called with fewer points than a 3x3 fit needs
    #[error("Need at least {need} calibration points (provided: {have})")]
    InsufficientPoints { have: usize, need: usize },

    /// Two points share a target color
    #[error("Duplicate {color} calibration point")]
    DuplicateTarget { color: String },

    /// Points span too little target or raw range for a stable fit
    #[error("Insufficient color diversity: {reason}")]
    InsufficientDiversity { reason: String },

    /// Determinant below the singularity threshold
    #[error("Matrix is singular (determinant {determinant:.3e})")]
    SingularMatrix { determinant: f64 },

    /// Condition number above the stability threshold
    #[error("Matrix is ill-conditioned (condition number {condition_number:.1}, limit {limit:.1})")]
    IllConditioned { condition_number: f64, limit: f64 },

    /// Auto-calibration operation with no session in progress
    #[error("No auto-calibration session in progress")]
    SessionNotActive,

    /// Skip requested on a mandatory color
    #[error("{color} cannot be skipped")]
    SkipNotAllowed { color: String },

    /// Capture for an auto-calibration phase failed; nothing was committed
    #[error("{phase} capture failed: {reason}")]
    CaptureFailed { phase: String, reason: String },

    /// Sensor or illumination collaborator failure
    #[error("Hardware error: {message}")]
    Hardware { message: String },

    /// Persistent store read/write failure
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration file could not be read, parsed or written
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },
}

impl CalibrationError {
    /// Create a storage error with context
    pub fn storage<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error with context
    pub fn config<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a hardware error
    pub fn hardware(message: impl Into<String>) -> Self {
        Self::Hardware {
            message: message.into(),
        }
    }

    /// Check if this error leaves the device able to keep producing colors
    ///
    /// Point- and matrix-level failures only degrade the active tier.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CalibrationError::InsufficientDiversity { .. }
                | CalibrationError::SingularMatrix { .. }
                | CalibrationError::IllConditioned { .. }
                | CalibrationError::InsufficientPoints { .. }
                | CalibrationError::DuplicateTarget { .. }
                | CalibrationError::CaptureFailed { .. }
                | CalibrationError::Storage { .. }
        )
    }

    /// Get operator-facing description for display
    pub fn user_message(&self) -> String {
        match self {
            CalibrationError::NotInitialized => {
                "Calibration is still starting up. Please try again in a moment.".to_string()
            }
            CalibrationError::UnknownColor { name } => {
                format!("\"{}\" is not a calibration color. Use black, white, red, green, blue or yellow.", name)
            }
            CalibrationError::ZeroReading => {
                "The sensor returned no signal. Check that it is connected and uncovered.".to_string()
            }
            CalibrationError::InsufficientDiversity { .. }
            | CalibrationError::SingularMatrix { .. }
            | CalibrationError::IllConditioned { .. } => {
                "Calibration samples are too similar. Use strongly colored samples; two-point calibration stays active.".to_string()
            }
            CalibrationError::CaptureFailed { phase, .. } => {
                format!("The {} measurement failed. Reposition the sample and try again.", phase)
            }
            CalibrationError::SkipNotAllowed { color } => {
                format!("{} is required and cannot be skipped.", color)
            }
            _ => "Calibration failed. Please try again.".to_string(),
        }
    }
}
