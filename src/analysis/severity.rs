use serde::{Deserialize, Serialize};

use crate::error::{Result, SpcError};
use crate::types::Severity;

/// Thresholds splitting a difference into low / medium / high.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityTable {
    pub medium: f64,
    pub high: f64,
}

impl SeverityTable {
    pub const fn new(medium: f64, high: f64) -> Self {
        Self { medium, high }
    }

    /// `high` iff `d >= high`, `medium` iff `medium <= d < high`, else `low`.
    pub fn classify(&self, difference: f64) -> Severity {
        let d = difference.abs();
        if d >= self.high {
            Severity::High
        } else if d >= self.medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityTables {
    pub color: SeverityTable,
    pub font_size: SeverityTable,
    pub spacing: SeverityTable,
    pub size: SeverityTable,
}

impl Default for SeverityTables {
    fn default() -> Self {
        Self {
            color: SeverityTable::new(20.0, 50.0),
            font_size: SeverityTable::new(3.0, 6.0),
            spacing: SeverityTable::new(5.0, 10.0),
            size: SeverityTable::new(10.0, 20.0),
        }
    }
}

impl SeverityTables {
    pub fn validate(&self) -> Result<()> {
        for (name, table) in [
            ("color", &self.color),
            ("font_size", &self.font_size),
            ("spacing", &self.spacing),
            ("size", &self.size),
        ] {
            if !(table.medium.is_finite() && table.high.is_finite())
                || table.medium < 0.0
                || table.medium >= table.high
            {
                return Err(SpcError::Config(format!(
                    "severity.{name} must satisfy 0 <= medium < high (got medium {}, high {})",
                    table.medium, table.high
                )));
            }
        }
        Ok(())
    }
}

/// Differences at or below a tolerance count as matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    /// px
    pub font_size: f64,
    /// Euclidean RGB distance.
    pub color_difference: f64,
    /// px, per padding side
    pub spacing: f64,
    /// px
    pub border_radius: f64,
    /// px, width and height independently
    pub dimensions: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            font_size: 2.0,
            color_difference: 10.0,
            spacing: 4.0,
            border_radius: 2.0,
            dimensions: 5.0,
        }
    }
}

impl Tolerances {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("font_size", self.font_size),
            ("color_difference", self.color_difference),
            ("spacing", self.spacing),
            ("border_radius", self.border_radius),
            ("dimensions", self.dimensions),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(SpcError::Config(format!(
                    "tolerance {name} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }
}
