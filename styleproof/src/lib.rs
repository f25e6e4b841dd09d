// SPDX-License-Identifier: AGPL-3.0-only

#![deny(clippy::expect_used, clippy::unwrap_used)]
#![warn(missing_docs)]

//! styleproof — golden-file regression harness for force-field styles.
//!
//! Validates the interaction styles of a molecular-simulation engine against
//! recorded reference output. A scenario file names the geometry, the style
//! under test, its coefficients and the expected energies, stresses and
//! per-particle forces. The harness drives the engine through several
//! execution paths that must agree numerically and compares every live value
//! against the reference.
//!
//! ## Modules
//!   - `scenario` — reference data model (`ScenarioConfig`, `ForceTable`, …)
//!   - `codec` — block-tagged text reader/writer for scenario files
//!   - `stats` — per-block deviation statistics
//!   - `tolerances` — base tolerances and per-mode scaling
//!   - `engine` — the command-execution port, plus an in-process fake engine
//!   - `driver` — the four execution paths and their temporary artifacts
//!   - `validation` — pairwise comparison and violation collection
//!   - `verify` — the per-mode path matrix and its outcomes
//!   - `generate` — one-shot golden-file capture
//!   - `suite` — verification of a whole fixture directory
//!
//! ## Path matrix
//!
//! ```text
//!   mode ∈ {serial, threaded}
//!     ├─ variant on  : fresh-init → compare init_* → short-run → compare run_*
//!     ├─ variant off : fresh-init → compare init_* → short-run → compare run_*
//!     ├─ restart-reload        → compare init_*
//!     └─ geometry-file-reload  → compare init_*
//! ```

pub mod codec;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod generate;
pub mod scenario;
pub mod stats;
pub mod suite;
pub mod tolerances;
pub mod validation;
pub mod verify;

#[cfg(test)]
mod testkit;

pub use config::HarnessConfig;
pub use error::{HarnessError, ParseError};
pub use scenario::{ForceTable, Prerequisite, ScenarioConfig, StressTensor, StyleFamily, Vec3};
pub use verify::{verify_scenario, verify_serial, verify_threaded, ModeOutcome, ScenarioVerdict};
