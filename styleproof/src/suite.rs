// SPDX-License-Identifier: AGPL-3.0-only

//! Verification of a whole fixture directory.
//!
//! Scenarios are independent: each gets its own engines and its own
//! artifact names (derived from the basename), so they run on the `rayon`
//! pool. Within one scenario everything stays sequential.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::codec::{self, SCENARIO_EXTENSION};
use crate::config::HarnessConfig;
use crate::engine::EngineFactory;
use crate::error::{HarnessError, Result};
use crate::scenario::StyleFamily;
use crate::verify::{verify_scenario, ScenarioVerdict, VerificationReport};

/// Result of one scenario file.
#[derive(Debug)]
pub struct SuiteEntry {
    /// Scenario file.
    pub path: PathBuf,
    /// Verdict, or the error that stopped the scenario.
    pub result: Result<ScenarioVerdict>,
}

/// Results of every scenario file of a directory, in file-name order.
#[derive(Debug)]
pub struct SuiteRun {
    /// Per-file results.
    pub entries: Vec<SuiteEntry>,
}

impl SuiteRun {
    /// Files whose scenario errored (parse or I/O failure). Aborted modes
    /// are part of the verdict instead.
    pub fn errors(&self) -> impl Iterator<Item = (&Path, &HarnessError)> {
        self.entries
            .iter()
            .filter_map(|e| e.result.as_ref().err().map(|err| (e.path.as_path(), err)))
    }

    /// Whether every scenario completed without failing a mode.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.entries
            .iter()
            .all(|e| matches!(&e.result, Ok(v) if !v.failed()))
    }

    /// Summary of the scenarios that produced a verdict.
    #[must_use]
    pub fn report(&self) -> VerificationReport {
        VerificationReport::new(
            self.entries
                .iter()
                .filter_map(|e| e.result.as_ref().ok().cloned())
                .collect(),
        )
    }
}

/// Scenario files (`*.yaml`) directly inside `dir`, sorted by name.
///
/// # Errors
///
/// Returns [`HarnessError::Io`] if the directory cannot be listed.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
    let io_err = |source| HarnessError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == SCENARIO_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn run_file<F>(factory: &F, path: &Path, family: StyleFamily, settings: &HarnessConfig) -> Result<ScenarioVerdict>
where
    F: EngineFactory,
{
    let cfg = codec::read_path(path, family, settings.reader_options())?;
    verify_scenario(factory, &cfg, settings)
}

/// Verify every scenario file of `dir` in both modes.
///
/// Scenarios run concurrently and all of them write into
/// `settings.work_dir`. Their artifact names derive from the file stem,
/// which is unique within `dir`, and the naming keeps distinct stems
/// disjoint (see [`crate::driver::Artifacts`]). Two suites, or two
/// verifications of the same basename, must not share a work directory at
/// the same time.
///
/// # Errors
///
/// Returns [`HarnessError::Io`] if the directory cannot be listed. Errors
/// of individual scenarios are collected in their [`SuiteEntry`].
pub fn run_suite<F>(
    factory: &F,
    dir: &Path,
    family: StyleFamily,
    settings: &HarnessConfig,
) -> Result<SuiteRun>
where
    F: EngineFactory + Sync,
{
    let files = discover(dir)?;
    info!(dir = %dir.display(), scenarios = files.len(), %family, "suite started");

    let entries: Vec<SuiteEntry> = files
        .into_par_iter()
        .map(|path| {
            let result = run_file(factory, &path, family, settings);
            if let Err(err) = &result {
                warn!(path = %path.display(), error = %err, "scenario aborted");
            }
            SuiteEntry { path, result }
        })
        .collect();

    let run = SuiteRun { entries };
    let report = run.report();
    info!(
        passed = report.passed,
        failed = report.failed,
        aborted = report.aborted,
        skipped = report.skipped,
        errors = run.errors().count(),
        "suite finished"
    );
    Ok(run)
}
