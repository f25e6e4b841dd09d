// SPDX-License-Identifier: AGPL-3.0-only

//! Scenario driver: one engine, four execution paths, scoped artifacts.
//!
//! ```text
//!   launch ── prerequisites unmet ──▶ Launch::Unmet (engine torn down, no files)
//!     │
//!     ▼
//!   fresh_init(variant) ──▶ writes <basename>.restart / .data / -coeffs.in
//!     │
//!   short_run            ──▶ 4 steps with the pe/atom reduction attached
//!
//!   restart_reload       ◀── <basename>.restart
//!   data_reload          ◀── <basename>.data
//! ```
//!
//! The driver owns the artifacts of its scenario and deletes them when it is
//! dropped, whichever path returned last and whether or not it succeeded.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::HarnessConfig;
use crate::engine::{DiagnosticHandle, Engine, EngineFactory, ExecutionMode, FORCE_FIELD};
use crate::error::{EngineError, Result};
use crate::scenario::{Observation, Prerequisite, ScenarioConfig, StressTensor};

/// Diagnostic computing the per-particle energy.
pub const PER_ATOM_ENERGY: &str = "pe all pe/atom";

/// Diagnostic reducing the per-particle energy to a scalar.
pub const ENERGY_REDUCTION: &str = "sum all reduce sum c_pe";

/// Steps of the short dynamics run.
pub const SHORT_RUN_STEPS: u32 = 4;

/// Start of the console output of a correctly launched engine.
pub const OUTPUT_BANNER: &str = "LAMMPS (";

/// Printed by the engine at the end of every run.
pub const RUN_SUMMARY: &str = "Loop time";

/// Setting of the symmetric-accumulation flag for one fresh-init.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccumulationVariant {
    /// Symmetric accumulation on.
    On,
    /// Symmetric accumulation off.
    Off,
}

impl AccumulationVariant {
    /// Variants in execution order.
    pub const ALL: [Self; 2] = [Self::On, Self::Off];

    /// Value assigned to the flag variable.
    #[must_use]
    pub const fn flag_value(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for AccumulationVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "newton {}", self.flag_value())
    }
}

/// Execution path that produced an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathKind {
    /// Setup from the geometry script.
    FreshInit,
    /// Four steps of dynamics after a fresh-init.
    ShortRun,
    /// Setup from the binary snapshot.
    RestartReload,
    /// Setup from the exported geometry file.
    DataReload,
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FreshInit => "fresh-init",
            Self::ShortRun => "short-run",
            Self::RestartReload => "restart-reload",
            Self::DataReload => "geometry-file-reload",
        })
    }
}

/// Particle counts reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParticleCounts {
    /// Global count.
    pub natoms: u64,
    /// Count owned by this process.
    pub nlocal: u64,
}

/// Temporary files of one scenario inside the work directory.
///
/// Distinct basenames never share a path: each name ends in a suffix
/// (`.restart`, `.data`, `-coeffs.in`) that no other basename's artifacts
/// can produce for the same file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    /// Binary snapshot, `<basename>.restart`.
    pub snapshot: PathBuf,
    /// Geometry export, `<basename>.data`.
    pub geometry: PathBuf,
    /// Coefficient export, `<basename>-coeffs.in`.
    pub coeffs: PathBuf,
}

impl Artifacts {
    /// Artifact paths of `basename` under `work_dir`.
    #[must_use]
    pub fn new(work_dir: &Path, basename: &str) -> Self {
        Self {
            snapshot: work_dir.join(format!("{basename}.restart")),
            geometry: work_dir.join(format!("{basename}.data")),
            coeffs: work_dir.join(format!("{basename}-coeffs.in")),
        }
    }

    /// All three paths.
    #[must_use]
    pub fn paths(&self) -> [&Path; 3] {
        [&self.snapshot, &self.geometry, &self.coeffs]
    }

    /// Delete every artifact that exists. Failures are logged, not raised.
    pub fn remove(&self) {
        for path in self.paths() {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "artifact removed"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "cannot remove artifact"),
            }
        }
    }
}

/// Outcome of [`ScenarioDriver::launch`].
#[derive(Debug)]
pub enum Launch<'a, E: Engine> {
    /// Every prerequisite is met.
    Ready(ScenarioDriver<'a, E>),
    /// The listed prerequisites are missing; the engine was torn down.
    Unmet(Vec<Prerequisite>),
}

/// Drives one engine instance through the paths of one scenario.
#[derive(Debug)]
pub struct ScenarioDriver<'a, E: Engine> {
    engine: E,
    cfg: &'a ScenarioConfig,
    mode: ExecutionMode,
    input_dir: PathBuf,
    artifacts: Artifacts,
}

/// Prerequisites of `cfg` that `engine` lacks under `mode`.
///
/// The style under test is looked up with the package suffix in threaded
/// mode (`harmonic` → `harmonic/omp`).
pub fn missing_prerequisites<E: Engine>(
    engine: &E,
    cfg: &ScenarioConfig,
    mode: &ExecutionMode,
) -> Vec<Prerequisite> {
    let category = cfg.family.category();
    cfg.prerequisites
        .iter()
        .filter_map(|p| {
            let name = match mode.suffix() {
                Some(suffix) if p.category == category => format!("{}/{suffix}", p.name),
                _ => p.name.clone(),
            };
            if engine.has_capability(&p.category, &name) {
                None
            } else {
                Some(Prerequisite::new(p.category.clone(), name))
            }
        })
        .collect()
}

impl<'a, E: Engine> ScenarioDriver<'a, E> {
    /// Construct an engine for `mode` and check the prerequisites of `cfg`
    /// before any command runs.
    ///
    /// # Errors
    ///
    /// Returns [`crate::HarnessError::Engine`] if the engine cannot be
    /// constructed.
    pub fn launch<F>(
        factory: &F,
        cfg: &'a ScenarioConfig,
        settings: &HarnessConfig,
        mode: &ExecutionMode,
    ) -> Result<Launch<'a, E>>
    where
        F: EngineFactory<Engine = E>,
    {
        if !factory.supports_mode(mode) {
            let package = mode.suffix().unwrap_or("serial");
            return Ok(Launch::Unmet(vec![Prerequisite::new("package", package)]));
        }
        let engine = factory.launch(mode)?;
        let missing = missing_prerequisites(&engine, cfg, mode);
        if !missing.is_empty() {
            return Ok(Launch::Unmet(missing));
        }
        Ok(Launch::Ready(Self {
            engine,
            cfg,
            mode: mode.clone(),
            input_dir: settings.input_dir.clone(),
            artifacts: Artifacts::new(&settings.work_dir, &cfg.basename),
        }))
    }

    /// Engine driven by this driver.
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// Mode the engine was constructed with.
    pub const fn mode(&self) -> &ExecutionMode {
        &self.mode
    }

    /// Artifact paths of this scenario.
    pub const fn artifacts(&self) -> &Artifacts {
        &self.artifacts
    }

    fn command(&mut self, command: &str) -> Result<()> {
        debug!(scenario = %self.cfg.basename, mode = self.mode.label(), command, "engine command");
        self.engine.execute(command)?;
        Ok(())
    }

    fn commands(&mut self, commands: &[String]) -> Result<()> {
        for c in commands {
            self.command(c)?;
        }
        Ok(())
    }

    fn input_script(&mut self) -> Result<()> {
        let script = self.input_dir.join(&self.cfg.input_file);
        debug!(scenario = %self.cfg.basename, script = %script.display(), "engine script");
        self.engine.execute_file(&script)?;
        Ok(())
    }

    fn apply_style(&mut self) -> Result<()> {
        let cfg = self.cfg;
        self.command(&format!("{} {}", cfg.family.style_command(), cfg.style_name))
    }

    fn apply_coeffs(&mut self) -> Result<()> {
        let cfg = self.cfg;
        for c in &cfg.style_coeffs {
            self.command(&format!("{} {c}", cfg.family.coeff_command()))?;
        }
        Ok(())
    }

    /// Captured output must open with [`OUTPUT_BANNER`] and contain a
    /// [`RUN_SUMMARY`]. Engines that capture nothing pass.
    fn check_output(&mut self) -> Result<()> {
        let Some(output) = self.engine.take_output() else {
            return Ok(());
        };
        if !output.starts_with(OUTPUT_BANNER) {
            return Err(EngineError::UnexpectedOutput {
                expected: OUTPUT_BANNER,
            }
            .into());
        }
        if !output.contains(RUN_SUMMARY) {
            return Err(EngineError::UnexpectedOutput {
                expected: RUN_SUMMARY,
            }
            .into());
        }
        Ok(())
    }

    /// Set up from the geometry script with the accumulation flag set to
    /// `variant`, settle with a zero-step run and export all three
    /// artifacts. Must be the first path run on this driver: the captured
    /// console output is checked for the launch banner and a run summary.
    ///
    /// # Errors
    ///
    /// Returns the first engine failure, or
    /// [`EngineError::UnexpectedOutput`] when a marker is missing.
    pub fn fresh_init(&mut self, variant: AccumulationVariant) -> Result<()> {
        let cfg = self.cfg;
        let flag = cfg.family.flag_variable();
        self.command(&format!("variable {flag} index {}", variant.flag_value()))?;
        let input_dir = self.input_dir.display().to_string();
        self.command(&format!("variable input_dir index {input_dir}"))?;
        self.commands(&cfg.pre_commands)?;
        self.input_script()?;
        self.apply_style()?;
        self.apply_coeffs()?;
        self.commands(&cfg.post_commands)?;
        self.command("run 0 post no")?;
        self.check_output()?;

        let Artifacts {
            snapshot,
            geometry,
            coeffs,
        } = self.artifacts.clone();
        self.command(&format!("write_restart {}", snapshot.display()))?;
        self.command(&format!("write_data {}", geometry.display()))?;
        self.command(&format!("write_coeff {}", coeffs.display()))
    }

    /// Integrate [`SHORT_RUN_STEPS`] steps with the per-particle energy
    /// reduction attached.
    ///
    /// # Errors
    ///
    /// Returns the first engine failure.
    pub fn short_run(&mut self) -> Result<DiagnosticHandle> {
        self.command("fix 1 all nve")?;
        self.engine.attach_diagnostic(PER_ATOM_ENERGY)?;
        let sum = self.engine.attach_diagnostic(ENERGY_REDUCTION)?;
        self.command("thermo_style custom step temp pe press c_sum")?;
        self.command("thermo 2")?;
        self.command(&format!("run {SHORT_RUN_STEPS} post no"))?;
        Ok(sum)
    }

    /// Discard the system and restore it from the snapshot.
    ///
    /// The style is re-applied when the snapshot did not carry it. The
    /// coefficients are re-applied for composite styles and for styles that
    /// cannot write their coefficients.
    ///
    /// # Errors
    ///
    /// Returns the first engine failure.
    pub fn restart_reload(&mut self) -> Result<()> {
        let cfg = self.cfg;
        let snapshot = self.artifacts.snapshot.display().to_string();
        self.command("clear")?;
        self.command(&format!("read_restart {snapshot}"))?;
        if self.engine.active_style(cfg.family).is_none() {
            self.apply_style()?;
        }
        let writes_coeffs = self
            .engine
            .active_style(cfg.family)
            .is_some_and(|s| s.writes_coeffs);
        if cfg.is_hybrid() || !writes_coeffs {
            self.apply_coeffs()?;
        }
        self.commands(&cfg.post_commands)?;
        self.command("run 0 post no")
    }

    /// Discard the system and rebuild it from the geometry export through
    /// the regular input script, with the flag back at `on`.
    ///
    /// # Errors
    ///
    /// Returns the first engine failure.
    pub fn data_reload(&mut self) -> Result<()> {
        let cfg = self.cfg;
        let category = cfg.family.category();
        let flag = cfg.family.flag_variable();
        let geometry = self.artifacts.geometry.display().to_string();
        self.command("clear")?;
        self.command(&format!("variable {category}_style delete"))?;
        self.command("variable data_file delete")?;
        self.command(&format!("variable {flag} delete"))?;
        self.command(&format!("variable {flag} index on"))?;
        self.commands(&cfg.pre_commands)?;
        self.command(&format!(
            "variable {category}_style index '{}'",
            cfg.style_name
        ))?;
        self.command(&format!("variable data_file index {geometry}"))?;
        self.input_script()?;
        self.apply_coeffs()?;
        self.commands(&cfg.post_commands)?;
        self.command("run 0 post no")
    }

    /// Extract the style energy, virial and forces.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownQuantity`] if a quantity is missing or
    /// the virial does not have six components.
    pub fn observe(&self) -> Result<Observation> {
        let family = self.cfg.family;
        let energy = self.engine.extract_scalar(family.energy_quantity())?;
        let virial = self.engine.extract_array(family.virial_quantity())?;
        let found = virial.len();
        let virial: [f64; 6] = virial.try_into().map_err(|_| {
            EngineError::UnknownQuantity(format!(
                "{} has {found} components, expected 6",
                family.virial_quantity()
            ))
        })?;
        let forces = self.engine.extract_vector_field(FORCE_FIELD)?;
        Ok(Observation {
            energy,
            stress: StressTensor::from_array(virial),
            forces,
        })
    }

    /// Global and local particle counts.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownQuantity`] if a setting is missing.
    pub fn counts(&self) -> Result<ParticleCounts> {
        Ok(ParticleCounts {
            natoms: self.engine.extract_setting("natoms")?,
            nlocal: self.engine.extract_setting("nlocal")?,
        })
    }

    /// Current value of the energy reduction attached by
    /// [`short_run`](Self::short_run).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownDiagnostic`] for a stale handle.
    pub fn reduction(&self, handle: &DiagnosticHandle) -> Result<f64> {
        Ok(self.engine.read_diagnostic(handle)?)
    }
}

impl<E: Engine> Drop for ScenarioDriver<'_, E> {
    fn drop(&mut self) {
        self.artifacts.remove();
    }
}

#[cfg(test)]
mod tests;
