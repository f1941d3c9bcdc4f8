//! Calibration constants and reference values
//!
//! This module contains compile-time constants for sensor normalization,
//! matrix solving and the guided capture workflow. Runtime-tunable copies of
//! most of these live in [`crate::config`].

/// Tri-stimulus sensor characteristics
pub mod sensor {
    /// Full-scale count of a 16-bit channel, used to normalize raw readings
    pub const FULL_SCALE: f32 = 65535.0;

    /// Readings at or above this count are treated as near saturation
    pub const SATURATION_THRESHOLD: u16 = 65000;

    /// Divisor of the uncalibrated fallback (16-bit count to 8-bit value)
    pub const FALLBACK_DIVISOR: f32 = 256.0;
}

/// Least-squares solver limits
pub mod solver {
    /// Points required before the matrix tier can activate
    pub const MIN_MATRIX_POINTS: usize = 5;

    /// Points required by the solver itself for a 3x3 fit
    pub const MIN_SOLVER_POINTS: usize = 3;

    /// Diagonal regularization added to each normal-equation matrix
    pub const REGULARIZATION: f64 = 1e-6;

    /// Determinants below this magnitude are treated as singular
    pub const DETERMINANT_EPSILON: f64 = 1e-6;

    /// Frobenius condition-number estimate above which a matrix is rejected
    pub const MAX_CONDITION_NUMBER: f64 = 1000.0;

    /// Minimum target range per RGB channel across the point set (of 255)
    pub const MIN_TARGET_RANGE: u8 = 50;

    /// Minimum raw range per sensor channel across the point set (of 65535)
    pub const MIN_RAW_RANGE: u16 = 1000;
}

/// Illumination defaults
pub mod illumination {
    /// Brightness restored when a session ends with the LED off
    pub const SAFE_DEFAULT_BRIGHTNESS: u8 = 128;
}

/// Raw sample averaging
pub mod sampling {
    /// Reads averaged per measurement
    pub const DEFAULT_SAMPLE_COUNT: usize = 10;

    /// Settling delay between consecutive reads, in milliseconds
    pub const DEFAULT_SETTLE_DELAY_MS: u64 = 5;

    /// Wait after switching the LED off before measuring dark current
    pub const DARK_SETTLE_DELAY_MS: u64 = 500;
}

/// Infrared leakage compensation
pub mod ir {
    /// Largest accepted IR compensation factor
    pub const MAX_FACTOR: f32 = 2.0;
}

/// Persistent storage layout
pub mod storage {
    /// Upper bound on points read back from a store
    pub const MAX_STORED_POINTS: u32 = 32;
}
