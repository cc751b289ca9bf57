//! Particle classification: area filtering, counting, and density
//! categories.

use serde::{Deserialize, Serialize};

use crate::types::{Category, Contour, DetectionResult, PipelineError};

/// Validated, clamped area bounds. Both comparisons are strict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaBounds {
    min: f64,
    max: f64,
}

impl AreaBounds {
    /// Validate `min <= max` on the raw values, then clamp both at 0.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if either bound is NaN or
    /// infinite, or if `min > max`.
    pub fn new(min: f64, max: f64) -> Result<Self, PipelineError> {
        if !min.is_finite() || !max.is_finite() {
            return Err(PipelineError::InvalidConfig(format!(
                "area bounds must be finite, got min_area={min} max_area={max}"
            )));
        }
        if min > max {
            return Err(PipelineError::InvalidConfig(format!(
                "min_area ({min}) cannot be greater than max_area ({max})"
            )));
        }
        Ok(Self {
            min: min.max(0.0),
            max: max.max(0.0),
        })
    }

    /// Exclusive lower bound.
    #[must_use]
    pub const fn min(&self) -> f64 {
        self.min
    }

    /// Exclusive upper bound.
    #[must_use]
    pub const fn max(&self) -> f64 {
        self.max
    }

    /// `min < area < max`.
    #[must_use]
    pub fn admits(&self, area: f64) -> bool {
        self.min < area && area < self.max
    }
}

/// Clamped count thresholds with `low <= high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryThresholds {
    low: u64,
    high: u64,
}

impl CategoryThresholds {
    /// Clamp `low` at 0 and `high` at `low`. Never fails.
    #[must_use]
    pub fn new(low: i64, high: i64) -> Self {
        let low = low.max(0);
        let high = high.max(low);
        Self {
            low: low.unsigned_abs(),
            high: high.unsigned_abs(),
        }
    }

    /// Lower threshold after clamping.
    #[must_use]
    pub const fn low(&self) -> u64 {
        self.low
    }

    /// Upper threshold after clamping.
    #[must_use]
    pub const fn high(&self) -> u64 {
        self.high
    }

    /// `Low` if `count < low`, else `Medium` if `count < high`, else `High`.
    ///
    /// With `low == high` the `Medium` tier is empty: a count equal to
    /// both thresholds is `High`.
    #[must_use]
    pub fn categorize(&self, count: usize) -> Category {
        let count = count as u64;
        if count < self.low {
            Category::Low
        } else if count < self.high {
            Category::Medium
        } else {
            Category::High
        }
    }
}

/// Filter contours by area, count survivors and categorize the count.
///
/// Returns the retained contours (in input order) alongside the result.
///
/// This is step 6, the last stage of the pipeline.
#[must_use = "returns the retained contours and the detection result"]
pub fn classify(
    contours: &[Contour],
    bounds: &AreaBounds,
    thresholds: &CategoryThresholds,
) -> (Vec<Contour>, DetectionResult) {
    let retained: Vec<Contour> = contours
        .iter()
        .filter(|c| bounds.admits(c.area()))
        .cloned()
        .collect();
    let count = retained.len();
    let result = DetectionResult {
        count,
        category: thresholds.categorize(count),
    };
    (retained, result)
}
