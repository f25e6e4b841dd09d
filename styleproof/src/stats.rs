// SPDX-License-Identifier: AGPL-3.0-only

//! Deviation statistics for one comparison block.
//!
//! An [`ErrorStats`] is reset at the start of each block (for example
//! "run_forces, newton off") and fed every compared pair. It answers "how
//! many, how bad, where" for regression debugging; pass/fail is decided per
//! value by the comparator, never from these aggregates.

use std::fmt;

use serde::Serialize;

use crate::tolerances::scaled_deviation;

/// Cartesian axis of a force component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Axes in component order.
    pub const ALL: [Self; 3] = [Self::X, Self::Y, Self::Z];
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
        })
    }
}

/// Where a compared value lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
    /// The style energy.
    Energy,
    /// One stress component (`xx` … `yz`).
    Stress {
        /// Component label.
        component: &'static str,
    },
    /// One force component of one particle.
    Force {
        /// 1-based particle id.
        id: usize,
        /// Component.
        axis: Axis,
    },
    /// The per-particle energy reduction diagnostic.
    Reduction,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Energy => f.write_str("energy"),
            Self::Stress { component } => write!(f, "stress[{component}]"),
            Self::Force { id, axis } => write!(f, "force[{id}].{axis}"),
            Self::Reduction => f.write_str("pe/atom reduction"),
        }
    }
}

/// Running deviation statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorStats {
    count: usize,
    sum_abs: f64,
    sum_scaled: f64,
    sum_sq_scaled: f64,
    max_scaled: f64,
    worst: Option<Location>,
}

impl ErrorStats {
    /// Empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every recorded pair.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record one compared pair.
    pub fn add(&mut self, live: f64, expected: f64, location: Location) {
        let abs = (live - expected).abs();
        let scaled = scaled_deviation(live, expected);
        self.count += 1;
        self.sum_abs += abs;
        self.sum_scaled += scaled;
        self.sum_sq_scaled += scaled * scaled;
        // NaN compares false both ways; make sure it is still reported
        if self.worst.is_none() || scaled > self.max_scaled || scaled.is_nan() {
            self.max_scaled = scaled;
            self.worst = Some(location);
        }
    }

    /// Number of compared pairs.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Mean absolute deviation.
    #[must_use]
    pub fn mean_abs(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_abs / self.count as f64
        }
    }

    /// Mean scaled deviation.
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_scaled / self.count as f64
        }
    }

    /// Population standard deviation of the scaled deviations.
    #[must_use]
    pub fn std_dev(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        let mean = self.sum_scaled / n;
        (self.sum_sq_scaled / n - mean * mean).max(0.0).sqrt()
    }

    /// Largest scaled deviation seen.
    #[must_use]
    pub const fn max(&self) -> f64 {
        self.max_scaled
    }

    /// Location of the largest scaled deviation.
    #[must_use]
    pub const fn worst(&self) -> Option<&Location> {
        self.worst.as_ref()
    }
}

impl fmt::Display for ErrorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Average: {:10.4e} StdDev: {:10.4e} MaxErr: {:10.4e}",
            self.mean(),
            self.std_dev(),
            self.max()
        )?;
        match &self.worst {
            Some(loc) => write!(f, " @ item: {loc}"),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats_are_zero() {
        let s = ErrorStats::new();
        assert_eq!(s.count(), 0);
        assert_eq!(s.mean(), 0.0);
        assert_eq!(s.std_dev(), 0.0);
        assert!(s.worst().is_none());
    }

    #[test]
    fn tracks_worst_offender() {
        let mut s = ErrorStats::new();
        s.add(1.000_1, 1.0, Location::Force { id: 1, axis: Axis::X });
        s.add(2.0 + 2e-3, 2.0, Location::Force { id: 7, axis: Axis::Z });
        s.add(0.5, 0.5, Location::Energy);
        assert_eq!(s.count(), 3);
        assert_eq!(s.worst(), Some(&Location::Force { id: 7, axis: Axis::Z }));
        assert!((s.max() - 1e-3).abs() < 1e-12);
    }

    #[test]
    fn scaled_and_absolute_means_differ_above_one() {
        let mut s = ErrorStats::new();
        s.add(110.0, 100.0, Location::Energy);
        assert!((s.mean_abs() - 10.0).abs() < 1e-12);
        assert!((s.mean() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn std_dev_of_identical_deviations_is_zero() {
        let mut s = ErrorStats::new();
        for id in 1..=4 {
            s.add(0.25, 0.0, Location::Force { id, axis: Axis::Y });
        }
        assert!(s.std_dev() < 1e-12);
    }

    #[test]
    fn nan_deviation_becomes_worst() {
        let mut s = ErrorStats::new();
        s.add(1.0, 1.1, Location::Energy);
        s.add(f64::NAN, 1.0, Location::Stress { component: "yz" });
        assert_eq!(s.worst(), Some(&Location::Stress { component: "yz" }));
    }

    #[test]
    fn reset_clears_everything() {
        let mut s = ErrorStats::new();
        s.add(3.0, 1.0, Location::Reduction);
        s.reset();
        assert_eq!(s, ErrorStats::new());
    }

    #[test]
    fn display_names_location() {
        let mut s = ErrorStats::new();
        s.add(1.5, 1.0, Location::Force { id: 12, axis: Axis::Y });
        let text = s.to_string();
        assert!(text.starts_with("Average:"));
        assert!(text.contains("MaxErr:"));
        assert!(text.ends_with("@ item: force[12].y"));
    }
}
