// SPDX-License-Identifier: AGPL-3.0-only

//! Integration tests: the serial and threaded path matrix end to end.
//!
//! Every test drives the in-process fake engine through the public
//! verification API and inspects the resulting outcome and block reports.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use common::{angle_scenario, exact_build, Bench};
use styleproof::driver::{AccumulationVariant, PathKind};
use styleproof::engine::fake::{FakeBuild, FakeEngine, FakeEvent};
use styleproof::engine::{EngineFactory, EngineResult, ExecutionMode};
use styleproof::stats::Location;
use styleproof::validation::{Block, Comparator};
use styleproof::verify::{ModeOutcome, VerificationReport, REDUNDANT_ENERGY};
use styleproof::{verify_scenario, verify_serial, verify_threaded, Prerequisite, ScenarioConfig};

/// Launches engines that own one particle too few whenever `split_when`
/// holds for the mode and the 1-based launch number, exact ones otherwise.
struct PartialOwnership {
    exact: FakeBuild,
    split: FakeBuild,
    split_when: fn(&ExecutionMode, usize) -> bool,
    launches: AtomicUsize,
}

impl PartialOwnership {
    fn new(cfg: &ScenarioConfig, split_when: fn(&ExecutionMode, usize) -> bool) -> Self {
        let mut split = exact_build(cfg);
        split.model_mut().nlocal = Some(cfg.natoms as u64 - 1);
        Self {
            exact: exact_build(cfg),
            split,
            split_when,
            launches: AtomicUsize::new(0),
        }
    }
}

impl EngineFactory for PartialOwnership {
    type Engine = FakeEngine;

    fn supports_mode(&self, mode: &ExecutionMode) -> bool {
        self.exact.supports_mode(mode)
    }

    fn launch(&self, mode: &ExecutionMode) -> EngineResult<FakeEngine> {
        let n = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        if (self.split_when)(mode, n) {
            self.split.launch(mode)
        } else {
            self.exact.launch(mode)
        }
    }
}

#[test]
fn deterministic_engine_passes_both_modes() {
    let bench = Bench::new();
    let cfg = bench.with_geometry(angle_scenario("angle-harmonic", "harmonic", 29));
    let verdict = verify_scenario(&exact_build(&cfg), &cfg, &bench.settings).unwrap();
    assert!(verdict.passed(), "{verdict:#?}");
    assert!(verdict.serial.is_passed());
    assert!(verdict.threaded.is_passed());
    assert!(bench.work_dir_is_empty());
}

#[test]
fn energy_within_tolerance_is_accepted() {
    let mut c = Comparator::new(false);
    let block = Block::new("init_energy", PathKind::FreshInit, Some(AccumulationVariant::On));
    c.compare_energy(block, 1.2345678001234e+01, 1.2345678901234e+01, 1e-7);
    assert!(c.all_passed());
}

#[test]
fn energy_outside_tolerance_names_its_location() {
    let mut c = Comparator::new(false);
    let block = Block::new("init_energy", PathKind::FreshInit, Some(AccumulationVariant::On));
    c.compare_energy(block.clone(), 1.2345779901234e+01, 1.2345678901234e+01, 1e-7);
    assert_eq!(c.violation_count(), 1);
    let v = &c.blocks()[0].violations[0];
    assert_eq!(v.block, block);
    assert_eq!(v.location, Location::Energy);
    assert!(v.deviation > 1e-7);
    assert!(v.to_string().starts_with("init_energy, fresh-init, newton on: energy"));
}

#[test]
fn shifted_initial_energy_fails_every_initial_energy_block() {
    let bench = Bench::new();
    let cfg = bench.with_geometry(angle_scenario("angle-shifted", "harmonic", 29));
    let mut build = exact_build(&cfg);
    build.model_mut().init.energy = 1.2345779901234e+01;
    let outcome = verify_serial(&build, &cfg, &bench.settings).unwrap();
    let ModeOutcome::Failed(report) = &outcome else {
        panic!("expected failure, got {outcome:#?}");
    };
    // fresh-init on, fresh-init off, restart-reload, geometry-file-reload
    assert_eq!(report.violation_count(), 4);
    for v in report.violations() {
        assert_eq!(v.block.quantity, "init_energy");
        assert_eq!(v.location, Location::Energy);
    }
}

#[test]
fn slightly_shifted_initial_energy_passes() {
    let bench = Bench::new();
    let cfg = bench.with_geometry(angle_scenario("angle-close", "harmonic", 29));
    let mut build = exact_build(&cfg);
    build.model_mut().init.energy = 1.2345678001234e+01;
    assert!(verify_serial(&build, &cfg, &bench.settings).unwrap().is_passed());
}

#[test]
fn unmet_prerequisite_skips_every_mode_without_file_access() {
    let bench = Bench::new();
    let cfg = bench.with_geometry(angle_scenario("angle-missing", "harmonic", 29));
    let build = exact_build(&cfg).without_capability("atom", "full");
    let journal = build.journal();
    let verdict = verify_scenario(&build, &cfg, &bench.settings).unwrap();
    assert!(verdict.skipped());
    assert!(!verdict.passed());
    assert!(!verdict.failed());
    assert_eq!(
        verdict.serial,
        ModeOutcome::Skipped(vec![Prerequisite::new("atom", "full")])
    );
    assert!(journal.commands().is_empty());
    assert!(journal.file_accesses().is_empty());
    assert!(bench.work_dir_is_empty());
}

#[test]
fn partially_local_particles_abort_the_mode() {
    let bench = Bench::new();
    let cfg = bench.with_geometry(angle_scenario("angle-split", "harmonic", 29));
    let mut build = exact_build(&cfg);
    build.model_mut().nlocal = Some(14);
    let outcome = verify_serial(&build, &cfg, &bench.settings).unwrap();
    let ModeOutcome::Aborted(aborted) = &outcome else {
        panic!("expected abort, got {outcome:#?}");
    };
    assert_eq!(aborted.reason, "fresh-init, newton on: only 14 of 29 particles are local");
    assert!(bench.work_dir_is_empty());
}

#[test]
fn serial_abort_still_runs_threaded_mode() {
    let bench = Bench::new();
    let cfg = bench.with_geometry(angle_scenario("angle-serial-split", "harmonic", 29));
    let factory = PartialOwnership::new(&cfg, |mode, _| *mode == ExecutionMode::Serial);
    let verdict = verify_scenario(&factory, &cfg, &bench.settings).unwrap();

    let ModeOutcome::Aborted(aborted) = &verdict.serial else {
        panic!("expected serial abort, got {:#?}", verdict.serial);
    };
    assert_eq!(aborted.reason, "fresh-init, newton on: only 28 of 29 particles are local");
    assert!(verdict.threaded.is_passed(), "{:#?}", verdict.threaded);
    assert!(verdict.failed());
    assert!(bench.work_dir_is_empty());
}

#[test]
fn blocks_compared_before_an_abort_are_kept() {
    let bench = Bench::new();
    let cfg = bench.with_geometry(angle_scenario("angle-late-split", "harmonic", 29));
    // launch 1 is the newton-on variant, launch 2 the newton-off one
    let factory = PartialOwnership::new(&cfg, |mode, n| *mode == ExecutionMode::Serial && n == 2);
    let outcome = verify_serial(&factory, &cfg, &bench.settings).unwrap();

    let ModeOutcome::Aborted(aborted) = &outcome else {
        panic!("expected abort, got {outcome:#?}");
    };
    assert_eq!(aborted.reason, "fresh-init, newton off: only 28 of 29 particles are local");
    let report = outcome.report().unwrap();
    // 3 init + 3 run + 1 redundant, all from the newton-on variant
    assert_eq!(report.blocks.len(), 7);
    assert!(report
        .blocks
        .iter()
        .all(|b| b.passed() && b.block.variant == Some(AccumulationVariant::On)));
    assert!(report.block("init_forces", PathKind::FreshInit).is_some());
    assert!(report.block("init_forces", PathKind::RestartReload).is_none());
    assert!(bench.work_dir_is_empty());
}

#[test]
fn particle_count_mismatch_aborts_the_mode() {
    let bench = Bench::new();
    let mut cfg = bench.with_geometry(angle_scenario("angle-count", "harmonic", 29));
    cfg.natoms = 28;
    let outcome = verify_serial(&exact_build(&cfg), &cfg, &bench.settings).unwrap();
    assert!(outcome.is_aborted(), "{outcome:#?}");
    assert!(outcome.report().unwrap().blocks.is_empty());
}

#[test]
fn missing_run_summary_aborts_both_modes() {
    let bench = Bench::new();
    let cfg = bench.with_geometry(angle_scenario("angle-quiet", "harmonic", 29));
    let mut build = exact_build(&cfg);
    build.model_mut().prints_run_summary = false;
    let verdict = verify_scenario(&build, &cfg, &bench.settings).unwrap();
    for outcome in [&verdict.serial, &verdict.threaded] {
        let ModeOutcome::Aborted(aborted) = outcome else {
            panic!("expected abort, got {outcome:#?}");
        };
        assert_eq!(aborted.reason, "engine output lacks 'Loop time'");
    }
    assert!(bench.work_dir_is_empty());
}

#[test]
fn restart_reload_is_idempotent() {
    let bench = Bench::new();
    let cfg = bench.with_geometry(angle_scenario("angle-restart", "harmonic", 29));
    let outcome = verify_serial(&exact_build(&cfg), &cfg, &bench.settings).unwrap();
    let report = outcome.report().unwrap();
    for quantity in ["init_energy", "init_stress", "init_forces"] {
        let block = report.block(quantity, PathKind::RestartReload).unwrap();
        assert!(block.passed());
        assert_eq!(block.stats.max(), 0.0);
    }
}

#[test]
fn restart_bias_fails_only_the_restart_path() {
    let bench = Bench::new();
    let cfg = bench.with_geometry(angle_scenario("angle-lossy", "harmonic", 29));
    let mut build = exact_build(&cfg);
    build.model_mut().restart_bias = 1e-3;
    let outcome = verify_serial(&build, &cfg, &bench.settings).unwrap();
    assert!(outcome.is_failed());
    let report = outcome.report().unwrap();
    assert!(report.violation_count() > 0);
    assert!(report.violations().all(|v| v.block.path == PathKind::RestartReload));
}

#[test]
fn accumulation_flag_does_not_change_results() {
    let bench = Bench::new();
    let cfg = bench.with_geometry(angle_scenario("angle-flag", "harmonic", 29));
    let report = verify_serial(&exact_build(&cfg), &cfg, &bench.settings)
        .unwrap()
        .report()
        .cloned()
        .unwrap();
    for variant in AccumulationVariant::ALL {
        let block = report
            .blocks
            .iter()
            .find(|b| b.block.quantity == "init_forces" && b.block.variant == Some(variant))
            .unwrap();
        assert!(block.passed());
        assert_eq!(block.tolerance, 1e-7);
    }
}

#[test]
fn flag_dependent_result_fails_the_off_variant() {
    let bench = Bench::new();
    let cfg = bench.with_geometry(angle_scenario("angle-asym", "harmonic", 29));
    let mut build = exact_build(&cfg);
    build.model_mut().flag_off_bias = 1e-4;
    let outcome = verify_serial(&build, &cfg, &bench.settings).unwrap();
    assert!(outcome.is_failed());
    let report = outcome.report().unwrap();
    assert!(report
        .violations()
        .all(|v| v.block.variant != Some(AccumulationVariant::On)));
    assert!(report
        .violations()
        .any(|v| v.block.variant == Some(AccumulationVariant::Off)));
}

#[test]
fn threaded_mode_uses_suffixed_styles_and_wider_bounds() {
    let bench = Bench::new();
    let cfg = bench.with_geometry(angle_scenario("angle-omp", "harmonic", 29));
    let build = exact_build(&cfg);
    let journal = build.journal();
    let outcome = verify_threaded(&build, &cfg, &bench.settings).unwrap();
    let report = outcome.report().unwrap();
    assert!((report.tolerances.base - 5e-7).abs() < 1e-20);
    let forces = report.block("run_forces", PathKind::ShortRun).unwrap();
    assert!((forces.tolerance - 5e-6).abs() < 1e-18);
    assert!(journal
        .events()
        .iter()
        .any(|e| matches!(e, FakeEvent::Launch(m) if m.suffix() == Some("omp"))));
}

#[test]
fn reduction_disagreement_is_a_violation() {
    let bench = Bench::new();
    let cfg = bench.with_geometry(angle_scenario("angle-reduce", "harmonic", 29));
    let mut build = exact_build(&cfg);
    build.model_mut().reduction_bias = 1e-3;
    let outcome = verify_serial(&build, &cfg, &bench.settings).unwrap();
    let report = outcome.report().unwrap();
    assert_eq!(report.violation_count(), 2);
    assert!(report
        .violations()
        .all(|v| v.block.quantity == REDUNDANT_ENERGY && v.location == Location::Reduction));
}

#[test]
fn composite_style_reduction_is_skipped_in_threaded_mode() {
    let bench = Bench::new();
    let cfg = bench.with_geometry(angle_scenario("angle-hybrid", "hybrid harmonic", 29));
    let mut build = exact_build(&cfg);
    build.model_mut().threaded_reduction_bias = 0.5;

    let threaded = verify_threaded(&build, &cfg, &bench.settings).unwrap();
    assert!(threaded.is_passed(), "{threaded:#?}");
    assert_eq!(threaded.report().unwrap().skipped_checks.len(), 2);

    let serial = verify_serial(&build, &cfg, &bench.settings).unwrap();
    assert!(serial.is_passed());
    assert!(serial.report().unwrap().skipped_checks.is_empty());
}

#[test]
fn missing_threaded_package_skips_only_threaded_mode() {
    let bench = Bench::new();
    let cfg = bench.with_geometry(angle_scenario("angle-noomp", "harmonic", 29));
    let build = exact_build(&cfg).with_threaded_package(false);
    let verdict = verify_scenario(&build, &cfg, &bench.settings).unwrap();
    assert!(verdict.serial.is_passed());
    assert_eq!(
        verdict.threaded,
        ModeOutcome::Skipped(vec![Prerequisite::new("package", "omp")])
    );
    assert!(verdict.passed());
}

#[test]
fn report_json_carries_counts_and_outcomes() {
    let bench = Bench::new();
    let cfg = bench.with_geometry(angle_scenario("angle-json", "harmonic", 29));
    let verdict = verify_scenario(&exact_build(&cfg), &cfg, &bench.settings).unwrap();
    let report = VerificationReport::new(vec![verdict]);
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["passed"], 1);
    assert_eq!(json["scenarios"][0]["scenario"], "angle-json");
    assert_eq!(json["scenarios"][0]["threaded"]["outcome"], "passed");
    assert_eq!(json["scenarios"][0]["threaded"]["detail"]["mode"]["mode"], "threaded");
}
