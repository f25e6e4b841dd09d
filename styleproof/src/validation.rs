// SPDX-License-Identifier: AGPL-3.0-only

//! Pairwise comparison of live values against reference values.
//!
//! Comparison is organized in blocks: one group of values sharing a
//! tolerance, for example the forces after fresh-init with symmetric
//! accumulation off. Every block gets its own [`ErrorStats`]. Every value
//! is checked against
//!
//! ```text
//!   |live − expected| ≤ tol × max(1, |expected|)
//! ```
//!
//! and a failing value becomes a [`ToleranceViolation`]. Collection never
//! stops at the first violation, so one report shows every offending value.
//!
//! The structural preconditions ([`check_structure`]) are different: a
//! particle-count mismatch invalidates all per-id comparisons and aborts
//! the mode.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::driver::{AccumulationVariant, ParticleCounts, PathKind};
use crate::error::StructuralMismatch;
use crate::scenario::{Expected, ForceTable, Observation, ScenarioConfig, StressTensor};
use crate::stats::{Axis, ErrorStats, Location};
use crate::tolerances::{scaled_deviation, within};

/// Identity of one comparison block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    /// Reference quantity (`init_forces`, `run_energy`, …).
    pub quantity: &'static str,
    /// Path that produced the live values.
    pub path: PathKind,
    /// Accumulation variant, when the path runs per variant.
    pub variant: Option<AccumulationVariant>,
}

impl Block {
    /// Block of `quantity` on `path`.
    #[must_use]
    pub const fn new(
        quantity: &'static str,
        path: PathKind,
        variant: Option<AccumulationVariant>,
    ) -> Self {
        Self {
            quantity,
            path,
            variant,
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.quantity, self.path)?;
        match self.variant {
            Some(v) => write!(f, ", {v}"),
            None => Ok(()),
        }
    }
}

/// One value outside its bound.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToleranceViolation {
    /// Block the value belongs to.
    pub block: Block,
    /// Which value.
    pub location: Location,
    /// Live value.
    pub live: f64,
    /// Reference value.
    pub expected: f64,
    /// `|live − expected| / max(1, |expected|)`.
    pub deviation: f64,
    /// Bound the deviation exceeded.
    pub tolerance: f64,
}

impl fmt::Display for ToleranceViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} live {:e} expected {:e} deviation {:.3e} > {:.3e}",
            self.block, self.location, self.live, self.expected, self.deviation, self.tolerance
        )
    }
}

/// Statistics and violations of one block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockReport {
    /// Block identity.
    pub block: Block,
    /// Bound applied to every value of the block.
    pub tolerance: f64,
    /// Deviation statistics over every compared value.
    pub stats: ErrorStats,
    /// Values outside the bound, in comparison order.
    pub violations: Vec<ToleranceViolation>,
}

impl BlockReport {
    fn new(block: Block, tolerance: f64) -> Self {
        Self {
            block,
            tolerance,
            stats: ErrorStats::new(),
            violations: Vec::new(),
        }
    }

    fn check(&mut self, live: f64, expected: f64, location: Location) {
        self.stats.add(live, expected, location.clone());
        if !within(live, expected, self.tolerance) {
            self.violations.push(ToleranceViolation {
                block: self.block.clone(),
                location,
                live,
                expected,
                deviation: scaled_deviation(live, expected),
                tolerance: self.tolerance,
            });
        }
    }

    /// Whether every value was within the bound.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Accumulates block reports for one mode.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct Comparator {
    print_stats: bool,
    blocks: Vec<BlockReport>,
}

impl Comparator {
    /// An empty comparator; `print_stats` raises block statistics from
    /// `debug` to `info`.
    pub const fn new(print_stats: bool) -> Self {
        Self {
            print_stats,
            blocks: Vec::new(),
        }
    }

    fn finish(&mut self, report: BlockReport) {
        let stats = &report.stats;
        if self.print_stats {
            info!(block = %report.block, violations = report.violations.len(), "{} stats: {stats}", report.block);
        } else {
            debug!(block = %report.block, violations = report.violations.len(), "{} stats: {stats}", report.block);
        }
        self.blocks.push(report);
    }

    /// Compare one energy.
    pub fn compare_energy(&mut self, block: Block, live: f64, expected: f64, tolerance: f64) {
        let mut report = BlockReport::new(block, tolerance);
        report.check(live, expected, Location::Energy);
        self.finish(report);
    }

    /// Compare the six stress components.
    pub fn compare_stress(
        &mut self,
        block: Block,
        live: &StressTensor,
        expected: &StressTensor,
        tolerance: f64,
    ) {
        let mut report = BlockReport::new(block, tolerance);
        let components = live.to_array().into_iter().zip(expected.to_array());
        for (component, (l, e)) in StressTensor::COMPONENTS.into_iter().zip(components) {
            report.check(l, e, Location::Stress { component });
        }
        self.finish(report);
    }

    /// Compare every component of every reference particle. A particle
    /// missing from the live table is compared as NaN.
    pub fn compare_forces(
        &mut self,
        block: Block,
        live: &ForceTable,
        expected: &ForceTable,
        tolerance: f64,
    ) {
        let mut report = BlockReport::new(block, tolerance);
        let missing = [f64::NAN; 3];
        for (id, e) in expected.iter() {
            let l = live.get(id).map_or(missing, |v| v.to_array());
            for ((axis, lv), ev) in Axis::ALL.into_iter().zip(l).zip(e.to_array()) {
                report.check(lv, ev, Location::Force { id, axis });
            }
        }
        self.finish(report);
    }

    /// Compare the style energy with the engine's own reduction of the
    /// per-particle energy.
    pub fn compare_redundant(&mut self, block: Block, energy: f64, reduction: f64, tolerance: f64) {
        let mut report = BlockReport::new(block, tolerance);
        report.check(reduction, energy, Location::Reduction);
        self.finish(report);
    }

    /// Compare a whole observation against the reference values of a stage:
    /// `<prefix>_energy`, `<prefix>_stress` and `<prefix>_forces` blocks.
    pub fn compare_observation(
        &mut self,
        prefix: Quantities,
        path: PathKind,
        variant: Option<AccumulationVariant>,
        live: &Observation,
        expected: Expected<'_>,
        tolerances: ObservationTolerances,
    ) {
        self.compare_forces(
            Block::new(prefix.forces, path, variant),
            &live.forces,
            expected.forces,
            tolerances.forces,
        );
        self.compare_stress(
            Block::new(prefix.stress, path, variant),
            &live.stress,
            expected.stress,
            tolerances.stress,
        );
        self.compare_energy(
            Block::new(prefix.energy, path, variant),
            live.energy,
            expected.energy,
            tolerances.energy,
        );
    }

    /// Every block compared so far.
    #[must_use]
    pub fn blocks(&self) -> &[BlockReport] {
        &self.blocks
    }

    /// Total violations across all blocks.
    #[must_use]
    pub fn violation_count(&self) -> usize {
        self.blocks.iter().map(|b| b.violations.len()).sum()
    }

    /// Whether no block has a violation.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.blocks.iter().all(BlockReport::passed)
    }

    /// Consume into the block reports.
    #[must_use]
    pub fn into_blocks(self) -> Vec<BlockReport> {
        self.blocks
    }
}

/// Quantity names of one reference stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantities {
    /// Energy block name.
    pub energy: &'static str,
    /// Stress block name.
    pub stress: &'static str,
    /// Forces block name.
    pub forces: &'static str,
}

impl Quantities {
    /// `init_energy`, `init_stress`, `init_forces`.
    pub const INIT: Self = Self {
        energy: "init_energy",
        stress: "init_stress",
        forces: "init_forces",
    };

    /// `run_energy`, `run_stress`, `run_forces`.
    pub const RUN: Self = Self {
        energy: "run_energy",
        stress: "run_stress",
        forces: "run_forces",
    };
}

/// Bounds for the three blocks of one observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservationTolerances {
    /// Energy bound.
    pub energy: f64,
    /// Stress bound.
    pub stress: f64,
    /// Forces bound.
    pub forces: f64,
}

impl ObservationTolerances {
    /// The same bound for all three blocks.
    #[must_use]
    pub const fn uniform(tolerance: f64) -> Self {
        Self {
            energy: tolerance,
            stress: tolerance,
            forces: tolerance,
        }
    }
}

/// Verify the structural preconditions of a per-id comparison: every
/// particle is local, the count matches the reference, and the reference
/// table `table` covers every local particle.
///
/// # Errors
///
/// Returns the first violated precondition.
pub fn check_structure(
    stage: &str,
    counts: ParticleCounts,
    cfg: &ScenarioConfig,
    table: &'static str,
    reference: &ForceTable,
) -> Result<(), StructuralMismatch> {
    if counts.natoms != counts.nlocal {
        return Err(StructuralMismatch::NotAllLocal {
            stage: stage.to_string(),
            natoms: counts.natoms,
            nlocal: counts.nlocal,
        });
    }
    if counts.natoms != cfg.natoms as u64 {
        return Err(StructuralMismatch::ParticleCount {
            stage: stage.to_string(),
            live: counts.natoms,
            expected: cfg.natoms as u64,
        });
    }
    let expected = usize::try_from(counts.nlocal).map_or(usize::MAX, |n| n.saturating_add(1));
    if reference.len() != expected {
        return Err(StructuralMismatch::ReferenceLength {
            stage: stage.to_string(),
            table,
            len: reference.len(),
            expected,
        });
    }
    Ok(())
}
