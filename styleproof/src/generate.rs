// SPDX-License-Identifier: AGPL-3.0-only

//! Golden-file capture.
//!
//! One serial engine runs the fresh-init path (accumulation variant on) and
//! the short run; both observations are written together with the authored
//! fields of the scenario. Prerequisite failures are errors here: there is
//! nothing to record.

use std::path::Path;

use tracing::info;

use crate::codec::{self, writer::timestamp_now, GoldenRecord};
use crate::config::HarnessConfig;
use crate::driver::{AccumulationVariant, Launch, ScenarioDriver};
use crate::engine::{Engine, EngineFactory, ExecutionMode};
use crate::error::{HarnessError, Result};
use crate::scenario::{ScenarioConfig, Stage, StyleFamily};

/// Run `cfg` once in serial mode and capture the engine-derived values.
///
/// Both observations must come from a system holding every particle
/// locally; otherwise the recorded force tables would be incomplete.
///
/// # Errors
///
/// Returns [`HarnessError::PrerequisiteUnmet`] if the build lacks a
/// prerequisite, [`HarnessError::StructuralMismatch`] if not every particle
/// is local, and the first engine failure otherwise.
pub fn capture<F: EngineFactory>(
    factory: &F,
    cfg: &ScenarioConfig,
    settings: &HarnessConfig,
) -> Result<GoldenRecord> {
    let mut driver = match ScenarioDriver::launch(factory, cfg, settings, &ExecutionMode::Serial)?
    {
        Launch::Ready(d) => d,
        Launch::Unmet(missing) => return Err(HarnessError::PrerequisiteUnmet { missing }),
    };

    driver.fresh_init(AccumulationVariant::On)?;
    let counts = driver.counts()?;
    if counts.natoms != counts.nlocal {
        return Err(crate::error::StructuralMismatch::NotAllLocal {
            stage: "generate".to_string(),
            natoms: counts.natoms,
            nlocal: counts.nlocal,
        }
        .into());
    }
    let init = driver.observe()?;
    driver.short_run()?;
    let run = driver.observe()?;

    Ok(GoldenRecord {
        engine_version: driver.engine().version(),
        date_generated: timestamp_now(),
        natoms: usize::try_from(counts.natoms).unwrap_or(usize::MAX),
        init,
        run,
    })
}

/// Capture `cfg` and write the golden file to `path`. Returns the scenario
/// as it now reads from disk.
///
/// # Errors
///
/// See [`capture`]; additionally [`HarnessError::Io`] if the file cannot
/// be written.
pub fn generate<F: EngineFactory>(
    factory: &F,
    cfg: &ScenarioConfig,
    settings: &HarnessConfig,
    path: &Path,
) -> Result<ScenarioConfig> {
    let record = capture(factory, cfg, settings)?;
    codec::write_path(path, cfg, &record)?;
    info!(
        scenario = %cfg.basename,
        path = %path.display(),
        natoms = record.natoms,
        engine_version = %record.engine_version,
        "golden file written"
    );

    let mut updated = cfg.clone();
    updated.engine_version = Some(record.engine_version);
    updated.date_generated = Some(record.date_generated);
    updated.natoms = record.natoms;
    updated.record(Stage::Init, record.init);
    updated.record(Stage::Run, record.run);
    Ok(updated)
}

/// Rewrite an existing golden file with fresh engine values. The authored
/// fields are kept as read.
///
/// # Errors
///
/// Returns [`HarnessError::Io`] or [`HarnessError::Parse`] if the file
/// cannot be read, then as [`generate`].
pub fn regenerate_in_place<F: EngineFactory>(
    factory: &F,
    path: &Path,
    family: StyleFamily,
    settings: &HarnessConfig,
) -> Result<ScenarioConfig> {
    let cfg = codec::read_path(path, family, settings.reader_options())?;
    generate(factory, &cfg, settings, path)
}
