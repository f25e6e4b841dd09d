// SPDX-License-Identifier: AGPL-3.0-only

//! The verification matrix: every path of every mode against the reference.
//!
//! | Step | Path | Reference | Tolerance |
//! |------|------|-----------|-----------|
//! | 1 | fresh-init (on, off) | `init_*` | base |
//! | 2 | short-run (on, off) | `run_forces` | 10 × base |
//! | 2 | short-run (on, off) | `run_stress`, `run_energy` | base |
//! | 3 | short-run (on, off) | energy reduction vs style energy | base |
//! | 4 | restart-reload | `init_*` | base |
//! | 5 | geometry-file-reload | `init_*` | base |
//!
//! Base is `epsilon` in serial mode and `5 × epsilon` in threaded mode
//! (see [`crate::tolerances`]). Each variant launches its own engine; both
//! reload paths run on the engine of the last variant. Step 3 is skipped
//! for composite styles in threaded mode.
//!
//! A structural mismatch or an engine failure ends a mode early as
//! [`ModeOutcome::Aborted`], keeping the blocks compared so far. The other
//! mode still runs.

use serde::Serialize;
use tracing::{info, warn};

use crate::config::HarnessConfig;
use crate::driver::{AccumulationVariant, Launch, PathKind, ScenarioDriver};
use crate::engine::{Engine, EngineFactory, ExecutionMode};
use crate::error::{HarnessError, Result};
use crate::scenario::{ForceTable, Prerequisite, ScenarioConfig, Stage};
use crate::tolerances::ToleranceProfile;
use crate::validation::{
    check_structure, Block, BlockReport, Comparator, ObservationTolerances, Quantities,
    ToleranceViolation,
};

/// Block name of the style energy versus the per-particle reduction.
pub const REDUNDANT_ENERGY: &str = "redundant_energy";

/// Comparison results of one mode, complete unless the mode was aborted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeReport {
    /// Scenario basename.
    pub scenario: String,
    /// Mode the engines were launched with.
    pub mode: ExecutionMode,
    /// Tolerances in effect.
    pub tolerances: ToleranceProfile,
    /// Every compared block, in comparison order.
    pub blocks: Vec<BlockReport>,
    /// Checks skipped by rule, with the reason.
    pub skipped_checks: Vec<String>,
}

impl ModeReport {
    /// Every violation across all blocks.
    pub fn violations(&self) -> impl Iterator<Item = &ToleranceViolation> {
        self.blocks.iter().flat_map(|b| b.violations.iter())
    }

    /// Number of violations.
    #[must_use]
    pub fn violation_count(&self) -> usize {
        self.blocks.iter().map(|b| b.violations.len()).sum()
    }

    /// Report of the first block named `quantity` on `path`.
    #[must_use]
    pub fn block(&self, quantity: &str, path: PathKind) -> Option<&BlockReport> {
        self.blocks
            .iter()
            .find(|b| b.block.quantity == quantity && b.block.path == path)
    }
}

/// A mode that stopped before its last comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbortedMode {
    /// Blocks compared before the abort.
    pub report: ModeReport,
    /// The mismatch or engine error that stopped the mode.
    pub reason: String,
}

/// Result of verifying one mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "lowercase")]
pub enum ModeOutcome {
    /// Every value within tolerance.
    Passed(ModeReport),
    /// At least one tolerance violation.
    Failed(ModeReport),
    /// The build lacks these prerequisites; nothing ran.
    Skipped(Vec<Prerequisite>),
    /// Stopped early by a structural mismatch or an engine failure.
    Aborted(AbortedMode),
}

impl ModeOutcome {
    /// The comparison report, unless skipped. Partial when aborted.
    #[must_use]
    pub const fn report(&self) -> Option<&ModeReport> {
        match self {
            Self::Passed(r) | Self::Failed(r) => Some(r),
            Self::Aborted(a) => Some(&a.report),
            Self::Skipped(_) => None,
        }
    }

    /// Whether the mode passed.
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed(_))
    }

    /// Whether the mode failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Whether the mode was skipped.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    /// Whether the mode was aborted.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }

    const fn label(&self) -> &'static str {
        match self {
            Self::Passed(_) => "passed",
            Self::Failed(_) => "failed",
            Self::Skipped(_) => "skipped",
            Self::Aborted(_) => "aborted",
        }
    }
}

/// Outcomes of both modes of one scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioVerdict {
    /// Scenario basename.
    pub scenario: String,
    /// Serial mode outcome.
    pub serial: ModeOutcome,
    /// Threaded mode outcome.
    pub threaded: ModeOutcome,
}

impl ScenarioVerdict {
    /// Whether either mode failed or was aborted.
    #[must_use]
    pub const fn failed(&self) -> bool {
        self.serial.is_failed()
            || self.threaded.is_failed()
            || self.serial.is_aborted()
            || self.threaded.is_aborted()
    }

    /// Whether either mode was aborted.
    #[must_use]
    pub const fn aborted(&self) -> bool {
        self.serial.is_aborted() || self.threaded.is_aborted()
    }

    /// Whether both modes were skipped.
    #[must_use]
    pub const fn skipped(&self) -> bool {
        self.serial.is_skipped() && self.threaded.is_skipped()
    }

    /// Whether no mode failed and at least one passed.
    #[must_use]
    pub const fn passed(&self) -> bool {
        !self.failed() && !self.skipped()
    }
}

/// Machine-readable summary of a set of verdicts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    /// Scenarios with no failure and at least one passed mode.
    pub passed: usize,
    /// Scenarios with at least one failed or aborted mode.
    pub failed: usize,
    /// Of the failed scenarios, those with an aborted mode.
    pub aborted: usize,
    /// Scenarios skipped in every mode.
    pub skipped: usize,
    /// Per-scenario verdicts.
    pub scenarios: Vec<ScenarioVerdict>,
}

impl VerificationReport {
    /// Summarize `verdicts`.
    #[must_use]
    pub fn new(verdicts: Vec<ScenarioVerdict>) -> Self {
        Self {
            passed: verdicts.iter().filter(|v| v.passed()).count(),
            failed: verdicts.iter().filter(|v| v.failed()).count(),
            aborted: verdicts.iter().filter(|v| v.aborted()).count(),
            skipped: verdicts.iter().filter(|v| v.skipped()).count(),
            scenarios: verdicts,
        }
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::HarnessError::Report`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

struct ModeRun<'a> {
    cfg: &'a ScenarioConfig,
    settings: &'a HarnessConfig,
    mode: &'a ExecutionMode,
    tolerances: ToleranceProfile,
    comparator: Comparator,
    skipped_checks: Vec<String>,
}

fn stage_label(path: PathKind, variant: Option<AccumulationVariant>) -> String {
    match variant {
        Some(v) => format!("{path}, {v}"),
        None => path.to_string(),
    }
}

impl<'a> ModeRun<'a> {
    fn structure<E: Engine>(
        &self,
        driver: &ScenarioDriver<'_, E>,
        path: PathKind,
        variant: Option<AccumulationVariant>,
        table: &'static str,
        reference: &ForceTable,
    ) -> Result<()> {
        let counts = driver.counts()?;
        check_structure(&stage_label(path, variant), counts, self.cfg, table, reference)?;
        Ok(())
    }

    /// Steps 1 to 3 for one variant on a freshly launched engine. `None`
    /// when prerequisites are unmet.
    fn variant<F: EngineFactory>(
        &mut self,
        factory: &F,
        variant: AccumulationVariant,
    ) -> Result<std::result::Result<ScenarioDriver<'a, F::Engine>, Vec<Prerequisite>>> {
        let cfg = self.cfg;
        let mut driver = match ScenarioDriver::launch(factory, cfg, self.settings, self.mode)? {
            Launch::Ready(d) => d,
            Launch::Unmet(missing) => return Ok(Err(missing)),
        };
        let tol = self.tolerances;

        driver.fresh_init(variant)?;
        self.structure(&driver, PathKind::FreshInit, Some(variant), "init_forces", &cfg.init_forces)?;
        let init = driver.observe()?;
        self.comparator.compare_observation(
            Quantities::INIT,
            PathKind::FreshInit,
            Some(variant),
            &init,
            cfg.expected(Stage::Init),
            ObservationTolerances::uniform(tol.init()),
        );

        let reduction = driver.short_run()?;
        self.structure(&driver, PathKind::ShortRun, Some(variant), "run_forces", &cfg.run_forces)?;
        let run = driver.observe()?;
        self.comparator.compare_observation(
            Quantities::RUN,
            PathKind::ShortRun,
            Some(variant),
            &run,
            cfg.expected(Stage::Run),
            ObservationTolerances {
                energy: tol.run_energy(),
                stress: tol.run_stress(),
                forces: tol.run_forces(),
            },
        );

        if cfg.is_hybrid() && matches!(self.mode, ExecutionMode::Threaded { .. }) {
            warn!(
                scenario = %cfg.basename,
                style = %cfg.style_name,
                %variant,
                "composite style in threaded mode, energy reduction check skipped"
            );
            self.skipped_checks
                .push(format!("{REDUNDANT_ENERGY}, {variant}: composite style in threaded mode"));
        } else {
            let sum = driver.reduction(&reduction)?;
            self.comparator.compare_redundant(
                Block::new(REDUNDANT_ENERGY, PathKind::ShortRun, Some(variant)),
                run.energy,
                sum,
                tol.redundant_energy(),
            );
        }
        Ok(Ok(driver))
    }

    fn reload<E: Engine>(&mut self, driver: &ScenarioDriver<'_, E>, path: PathKind) -> Result<()> {
        let cfg = self.cfg;
        self.structure(driver, path, None, "init_forces", &cfg.init_forces)?;
        let obs = driver.observe()?;
        self.comparator.compare_observation(
            Quantities::INIT,
            path,
            None,
            &obs,
            cfg.expected(Stage::Init),
            ObservationTolerances::uniform(self.tolerances.init()),
        );
        Ok(())
    }

    /// Both variants and both reloads. `Some` when prerequisites are unmet.
    /// Drivers dropped on an early return still remove their artifacts.
    fn matrix<F: EngineFactory>(&mut self, factory: &F) -> Result<Option<Vec<Prerequisite>>> {
        match self.variant(factory, AccumulationVariant::On)? {
            Ok(first) => drop(first),
            Err(missing) => return Ok(Some(missing)),
        }
        let mut driver = match self.variant(factory, AccumulationVariant::Off)? {
            Ok(d) => d,
            Err(missing) => return Ok(Some(missing)),
        };

        driver.restart_reload()?;
        self.reload(&driver, PathKind::RestartReload)?;
        driver.data_reload()?;
        self.reload(&driver, PathKind::DataReload)?;
        Ok(None)
    }

    fn skipped(&self, missing: Vec<Prerequisite>) -> ModeOutcome {
        let list = missing
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        warn!(scenario = %self.cfg.basename, mode = %self.mode, missing = %list, "mode skipped, prerequisites unmet");
        ModeOutcome::Skipped(missing)
    }
}

/// Verify `cfg` in `mode`.
///
/// A particle-count mismatch or an engine failure does not propagate; it
/// yields [`ModeOutcome::Aborted`] with the blocks compared up to that
/// point. Tolerance violations produce [`ModeOutcome::Failed`].
///
/// # Errors
///
/// Returns any other [`HarnessError`], such as an I/O failure writing the
/// scratch artifacts.
pub fn verify_mode<F: EngineFactory>(
    factory: &F,
    cfg: &ScenarioConfig,
    settings: &HarnessConfig,
    mode: &ExecutionMode,
) -> Result<ModeOutcome> {
    info!(scenario = %cfg.basename, %mode, style = %cfg.style_name, "verification started");
    let mut run = ModeRun {
        cfg,
        settings,
        mode,
        tolerances: ToleranceProfile::for_mode(cfg.epsilon, mode),
        comparator: Comparator::new(settings.print_stats),
        skipped_checks: Vec::new(),
    };

    let abort = match run.matrix(factory) {
        Ok(Some(missing)) => return Ok(run.skipped(missing)),
        Ok(None) => None,
        Err(HarnessError::StructuralMismatch(m)) => Some(m.to_string()),
        Err(HarnessError::Engine(e)) => Some(e.to_string()),
        Err(other) => return Err(other),
    };

    let passed = run.comparator.all_passed();
    let report = ModeReport {
        scenario: cfg.basename.clone(),
        mode: mode.clone(),
        tolerances: run.tolerances,
        blocks: run.comparator.into_blocks(),
        skipped_checks: run.skipped_checks,
    };
    let outcome = match abort {
        Some(reason) => {
            warn!(scenario = %cfg.basename, %mode, blocks = report.blocks.len(), %reason, "mode aborted");
            ModeOutcome::Aborted(AbortedMode { report, reason })
        }
        None if passed => ModeOutcome::Passed(report),
        None => ModeOutcome::Failed(report),
    };
    if let Some(report) = outcome.report() {
        for v in report.violations() {
            warn!(scenario = %cfg.basename, %mode, "{v}");
        }
        info!(
            scenario = %cfg.basename,
            %mode,
            outcome = outcome.label(),
            blocks = report.blocks.len(),
            violations = report.violation_count(),
            "verification finished"
        );
    }
    Ok(outcome)
}

/// Verify `cfg` in serial mode.
///
/// # Errors
///
/// See [`verify_mode`].
pub fn verify_serial<F: EngineFactory>(
    factory: &F,
    cfg: &ScenarioConfig,
    settings: &HarnessConfig,
) -> Result<ModeOutcome> {
    verify_mode(factory, cfg, settings, &ExecutionMode::Serial)
}

/// Verify `cfg` in threaded mode with the configured thread count and
/// package suffix.
///
/// # Errors
///
/// See [`verify_mode`].
pub fn verify_threaded<F: EngineFactory>(
    factory: &F,
    cfg: &ScenarioConfig,
    settings: &HarnessConfig,
) -> Result<ModeOutcome> {
    verify_mode(factory, cfg, settings, &settings.threaded_mode())
}

/// Verify `cfg` in both modes. The threaded mode runs whatever the serial
/// outcome, aborted included.
///
/// # Errors
///
/// See [`verify_mode`]. Both modes run before the first error is returned.
pub fn verify_scenario<F: EngineFactory>(
    factory: &F,
    cfg: &ScenarioConfig,
    settings: &HarnessConfig,
) -> Result<ScenarioVerdict> {
    let serial = verify_serial(factory, cfg, settings);
    let threaded = verify_threaded(factory, cfg, settings);
    Ok(ScenarioVerdict {
        scenario: cfg.basename.clone(),
        serial: serial?,
        threaded: threaded?,
    })
}
