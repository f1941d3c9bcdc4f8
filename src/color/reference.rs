//! Reference color registry
//!
//! The six physical samples the guided workflow asks for, each with the
//! target RGB value the correction should reproduce. Lookup by name is
//! case-insensitive; adding a sample means appending a record.

use serde::{Deserialize, Serialize};

use crate::{CalibrationError, Result, RgbColor};

/// Canonical calibration samples, in capture order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationColor {
    Black,
    White,
    Red,
    Green,
    Blue,
    Yellow,
}

impl CalibrationColor {
    /// Capture order used by the guided workflow
    pub const SEQUENCE: [CalibrationColor; 6] = [
        CalibrationColor::Black,
        CalibrationColor::White,
        CalibrationColor::Red,
        CalibrationColor::Green,
        CalibrationColor::Blue,
        CalibrationColor::Yellow,
    ];

    /// Registry record for this color
    pub fn reference(self) -> &'static ReferenceColor {
        &REFERENCE_COLORS[self.index()]
    }

    /// Position in [`CalibrationColor::SEQUENCE`] and [`REFERENCE_COLORS`]
    pub fn index(self) -> usize {
        match self {
            CalibrationColor::Black => 0,
            CalibrationColor::White => 1,
            CalibrationColor::Red => 2,
            CalibrationColor::Green => 3,
            CalibrationColor::Blue => 4,
            CalibrationColor::Yellow => 5,
        }
    }

    /// Target RGB value
    pub fn target(self) -> RgbColor {
        self.reference().rgb
    }

    /// Black and white anchor the 2-point tier and may never be skipped
    pub fn is_mandatory(self) -> bool {
        matches!(self, CalibrationColor::Black | CalibrationColor::White)
    }
}

/// One registry record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceColor {
    /// Canonical lowercase name
    pub name: &'static str,
    /// Target RGB the corrected output should hit for this sample
    pub rgb: RgbColor,
    /// Name shown to the operator
    pub display_name: &'static str,
    /// Other accepted names
    pub aliases: &'static [&'static str],
    pub color: CalibrationColor,
}

impl ReferenceColor {
    /// Whether `name` is the canonical name or an alias, ignoring ASCII case
    pub fn answers_to(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(name))
    }
}

/// The registry. Every `rgb` is distinct.
pub static REFERENCE_COLORS: [ReferenceColor; 6] = [
    ReferenceColor {
        name: "black",
        rgb: RgbColor::new(5, 5, 5),
        display_name: "Black",
        aliases: &[],
        color: CalibrationColor::Black,
    },
    ReferenceColor {
        name: "white",
        rgb: RgbColor::new(247, 248, 244),
        display_name: "Vivid White",
        aliases: &["vivid-white"],
        color: CalibrationColor::White,
    },
    ReferenceColor {
        name: "red",
        rgb: RgbColor::new(200, 30, 30),
        display_name: "Red",
        aliases: &[],
        color: CalibrationColor::Red,
    },
    ReferenceColor {
        name: "green",
        rgb: RgbColor::new(30, 200, 30),
        display_name: "Green",
        aliases: &[],
        color: CalibrationColor::Green,
    },
    ReferenceColor {
        name: "blue",
        rgb: RgbColor::new(30, 30, 200),
        display_name: "Blue",
        aliases: &[],
        color: CalibrationColor::Blue,
    },
    ReferenceColor {
        name: "yellow",
        rgb: RgbColor::new(230, 220, 50),
        display_name: "Yellow",
        aliases: &[],
        color: CalibrationColor::Yellow,
    },
];

/// Look up a reference color by name, ignoring case and surrounding whitespace
///
/// # Errors
///
/// Returns [`CalibrationError::UnknownColor`] for names not in the registry.
pub fn lookup(name: &str) -> Result<&'static ReferenceColor> {
    let wanted = name.trim();
    REFERENCE_COLORS
        .iter()
        .find(|reference| reference.answers_to(wanted))
        .ok_or_else(|| CalibrationError::UnknownColor {
            name: name.to_string(),
        })
}

/// Find the registry record whose target equals `rgb`
pub fn find_by_target(rgb: RgbColor) -> Option<&'static ReferenceColor> {
    REFERENCE_COLORS.iter().find(|reference| reference.rgb == rgb)
}
