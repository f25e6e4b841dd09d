// SPDX-License-Identifier: AGPL-3.0-only

//! Centralized comparison tolerances and their per-mode scaling.
//!
//! Every multiplier applied to a scenario's `epsilon` is defined here with
//! its rationale. No ad-hoc factors in the comparison code.
//!
//! # Scaling rules
//!
//! | Block | Serial | Threaded |
//! |-------|--------|----------|
//! | `init_*` (energy, stress, forces) | ε | 5ε |
//! | `run_forces` | 10ε | 50ε |
//! | `run_stress`, `run_energy` | ε | 5ε |
//! | energy vs per-particle reduction | ε | 5ε |
//! | restart / geometry reload vs `init_*` | ε | 5ε |
//!
//! A value passes when `|live − expected| ≤ tol × max(1, |expected|)`:
//! absolute below magnitude one, relative above it.

use serde::Serialize;

use crate::engine::ExecutionMode;

// ═══════════════════════════════════════════════════════════════════
// Base tolerances
// ═══════════════════════════════════════════════════════════════════

/// Epsilon assumed when a scenario file does not state one.
///
/// Close to f64 machine precision (2.2e-16) times the ~50 summation terms a
/// small bonded system accumulates per particle. Scenarios that exercise
/// transcendental-heavy styles state a looser value explicitly.
pub const DEFAULT_EPSILON: f64 = 1e-14;

/// Magnitude below which the bound is absolute rather than relative.
pub const RELATIVE_FLOOR: f64 = 1.0;

// ═══════════════════════════════════════════════════════════════════
// Mode and path multipliers
// ═══════════════════════════════════════════════════════════════════

/// Widening of ε for the threaded mode.
///
/// Threaded force accumulation reduces per-thread buffers in an order that
/// differs from the serial loop. Results are not bit-reproducible with
/// serial; observed deviations stay within a few ε.
pub const THREADED_EPSILON_SCALE: f64 = 5.0;

/// Widening of the mode tolerance for forces after the short run.
///
/// Four integration steps amplify an initial force deviation through the
/// positions; one decade covers the growth over that horizon.
pub const RUN_FORCE_SCALE: f64 = 10.0;

/// Tolerances for every comparison block of one mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ToleranceProfile {
    /// Mode base tolerance (ε or a widened multiple).
    pub base: f64,
}

impl ToleranceProfile {
    /// Profile for a scenario epsilon under `mode`.
    #[must_use]
    pub fn for_mode(epsilon: f64, mode: &ExecutionMode) -> Self {
        let base = match mode {
            ExecutionMode::Serial => epsilon,
            ExecutionMode::Threaded { .. } => epsilon * THREADED_EPSILON_SCALE,
        };
        Self { base }
    }

    /// Energies, stresses and forces right after setup or a reload.
    #[must_use]
    pub const fn init(&self) -> f64 {
        self.base
    }

    /// Forces after the short run.
    #[must_use]
    pub fn run_forces(&self) -> f64 {
        self.base * RUN_FORCE_SCALE
    }

    /// Stress after the short run.
    #[must_use]
    pub const fn run_stress(&self) -> f64 {
        self.base
    }

    /// Energy after the short run.
    #[must_use]
    pub const fn run_energy(&self) -> f64 {
        self.base
    }

    /// Style energy against the engine's own per-particle reduction.
    #[must_use]
    pub const fn redundant_energy(&self) -> f64 {
        self.base
    }
}

/// Deviation of `live` from `expected` in units of the comparison bound:
/// absolute below [`RELATIVE_FLOOR`], relative above.
#[must_use]
pub fn scaled_deviation(live: f64, expected: f64) -> f64 {
    (live - expected).abs() / expected.abs().max(RELATIVE_FLOOR)
}

/// `|live − expected| ≤ tolerance × max(1, |expected|)`.
///
/// NaN on either side never passes.
#[must_use]
pub fn within(live: f64, expected: f64, tolerance: f64) -> bool {
    (live - expected).abs() <= tolerance * expected.abs().max(RELATIVE_FLOOR)
}
