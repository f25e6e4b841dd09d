// SPDX-License-Identifier: AGPL-3.0-only

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::engine::fake::{FakeBuild, FakeEngine};
use crate::scenario::Stage;
use crate::testkit::{fixture, fixture_with, Fixture};

fn ready<'a>(
    fx: &'a Fixture,
    build: &FakeBuild,
    mode: &ExecutionMode,
) -> ScenarioDriver<'a, FakeEngine> {
    match ScenarioDriver::launch(build, &fx.cfg, &fx.settings, mode).unwrap() {
        Launch::Ready(d) => d,
        Launch::Unmet(m) => panic!("unexpected unmet prerequisites {m:?}"),
    }
}

fn position(commands: &[String], needle: &str) -> usize {
    commands
        .iter()
        .position(|c| c == needle)
        .unwrap_or_else(|| panic!("'{needle}' not issued; got {commands:#?}"))
}

#[test]
fn artifacts_are_named_after_basename() {
    let a = Artifacts::new(Path::new("/w"), "angle-harmonic");
    assert_eq!(a.snapshot, PathBuf::from("/w/angle-harmonic.restart"));
    assert_eq!(a.geometry, PathBuf::from("/w/angle-harmonic.data"));
    assert_eq!(a.coeffs, PathBuf::from("/w/angle-harmonic-coeffs.in"));
}

#[test]
fn artifacts_of_distinct_basenames_are_disjoint() {
    let names = ["a", "a-coeffs", "a.data", "a.restart", "a-coeffs.in", "b"];
    let mut seen = std::collections::HashSet::new();
    for name in names {
        for path in Artifacts::new(Path::new("/w"), name).paths() {
            assert!(seen.insert(path.to_path_buf()), "{name}: {} reused", path.display());
        }
    }
    assert_eq!(seen.len(), names.len() * 3);
}

#[test]
fn unmet_prerequisite_tears_down_without_touching_files() {
    let fx = fixture();
    let build = fx.build().without_capability("atom", "full");
    let journal = build.journal();
    let launch = ScenarioDriver::launch(&build, &fx.cfg, &fx.settings, &ExecutionMode::Serial)
        .unwrap();
    match launch {
        Launch::Unmet(missing) => assert_eq!(missing, vec![Prerequisite::new("atom", "full")]),
        Launch::Ready(_) => panic!("prerequisite should be unmet"),
    }
    assert_eq!(journal.launches(), 1);
    assert_eq!(journal.teardowns(), 1);
    assert!(journal.commands().is_empty());
    assert!(journal.file_accesses().is_empty());
}

#[test]
fn threaded_check_uses_suffixed_style_name() {
    let fx = fixture();
    let build = fx.build().without_capability("angle", "harmonic/omp");
    let mode = ExecutionMode::threaded(4);
    match ScenarioDriver::launch(&build, &fx.cfg, &fx.settings, &mode).unwrap() {
        Launch::Unmet(missing) => {
            assert_eq!(missing, vec![Prerequisite::new("angle", "harmonic/omp")]);
        }
        Launch::Ready(_) => panic!("threaded style should be unmet"),
    };
}

#[test]
fn missing_threaded_package_never_launches() {
    let fx = fixture();
    let build = fx.build().with_threaded_package(false);
    let journal = build.journal();
    let launch =
        ScenarioDriver::launch(&build, &fx.cfg, &fx.settings, &ExecutionMode::threaded(4))
            .unwrap();
    assert!(matches!(launch, Launch::Unmet(ref m) if m[0] == Prerequisite::new("package", "omp")));
    assert_eq!(journal.launches(), 0);
}

#[test]
fn fresh_init_issues_commands_in_order() {
    let fx = fixture();
    let build = fx.build();
    let journal = build.journal();
    let mut d = ready(&fx, &build, &ExecutionMode::Serial);
    d.fresh_init(AccumulationVariant::Off).unwrap();

    let commands = journal.commands();
    assert_eq!(commands[0], "variable newton_bond index off");
    assert_eq!(
        commands[1],
        format!("variable input_dir index {}", fx.settings.input_dir.display())
    );
    assert_eq!(commands[2], "variable units index real");
    let style = position(&commands, "angle_style harmonic");
    let coeff = position(&commands, "angle_coeff 1 75.0 110.1");
    let post = position(&commands, "angle_modify extra 0");
    let settle = position(&commands, "run 0 post no");
    let read = commands
        .iter()
        .position(|c| c.starts_with("read_data "))
        .unwrap();
    assert!(read < style && style < coeff && coeff < post && post < settle);
    let tail: Vec<&str> = commands[settle + 1..].iter().map(String::as_str).collect();
    let a = d.artifacts();
    assert_eq!(
        tail,
        vec![
            format!("write_restart {}", a.snapshot.display()),
            format!("write_data {}", a.geometry.display()),
            format!("write_coeff {}", a.coeffs.display()),
        ]
    );
    for path in a.paths() {
        assert!(path.exists(), "{} missing", path.display());
    }
}

#[test]
fn observations_follow_the_path() {
    let fx = fixture();
    let build = fx.build();
    let mut d = ready(&fx, &build, &ExecutionMode::Serial);
    d.fresh_init(AccumulationVariant::On).unwrap();
    assert_eq!(d.counts().unwrap(), ParticleCounts { natoms: 3, nlocal: 3 });
    let init = d.observe().unwrap();
    let expected = fx.cfg.expected(Stage::Init);
    assert_eq!(init.energy, expected.energy);
    assert_eq!(&init.forces, expected.forces);

    let sum = d.short_run().unwrap();
    let run = d.observe().unwrap();
    assert_eq!(run.stress, fx.cfg.run_stress);
    assert_eq!(d.reduction(&sum).unwrap(), fx.cfg.run_energy);
}

#[test]
fn restart_reload_restores_initial_state() {
    let fx = fixture();
    let build = fx.build();
    let journal = build.journal();
    let mut d = ready(&fx, &build, &ExecutionMode::Serial);
    d.fresh_init(AccumulationVariant::On).unwrap();
    d.short_run().unwrap();
    d.restart_reload().unwrap();
    let obs = d.observe().unwrap();
    assert_eq!(obs.energy, fx.cfg.init_energy);
    assert_eq!(obs.forces, fx.cfg.init_forces);

    let commands = journal.commands();
    let clear = position(&commands, "clear");
    assert_eq!(
        commands[clear + 1],
        format!("read_restart {}", d.artifacts().snapshot.display())
    );
    // style and coefficients survived in the snapshot
    assert_eq!(
        commands.iter().filter(|c| c.starts_with("angle_coeff")).count(),
        1
    );
}

#[test]
fn restart_reload_reapplies_coefficients_for_composite_style() {
    let fx = fixture_with("hybrid harmonic");
    let build = fx.build();
    let journal = build.journal();
    let mut d = ready(&fx, &build, &ExecutionMode::Serial);
    d.fresh_init(AccumulationVariant::On).unwrap();
    d.restart_reload().unwrap();
    let commands = journal.commands();
    let clear = position(&commands, "clear");
    assert!(commands[clear..]
        .iter()
        .any(|c| c == "angle_coeff 1 harmonic 75.0 110.1"));
    assert!(!commands[clear..].iter().any(|c| c.starts_with("angle_style")));
}

#[test]
fn restart_reload_reapplies_missing_style() {
    let fx = fixture();
    let mut build = fx.build();
    build.model_mut().snapshot_keeps_style = false;
    build.model_mut().writes_coeffs = false;
    let journal = build.journal();
    let mut d = ready(&fx, &build, &ExecutionMode::Serial);
    d.fresh_init(AccumulationVariant::On).unwrap();
    d.restart_reload().unwrap();
    let commands = journal.commands();
    let clear = position(&commands, "clear");
    let after: Vec<&String> = commands[clear..].iter().collect();
    assert!(after.iter().any(|c| *c == "angle_style harmonic"));
    assert!(after.iter().any(|c| *c == "angle_coeff 1 75.0 110.1"));
}

#[test]
fn data_reload_resets_variables_and_flag() {
    let fx = fixture();
    let build = fx.build();
    let journal = build.journal();
    let mut d = ready(&fx, &build, &ExecutionMode::Serial);
    d.fresh_init(AccumulationVariant::Off).unwrap();
    d.data_reload().unwrap();

    let commands = journal.commands();
    let clear = position(&commands, "clear");
    assert_eq!(
        &commands[clear + 1..clear + 6],
        &[
            "variable angle_style delete".to_string(),
            "variable data_file delete".to_string(),
            "variable newton_bond delete".to_string(),
            "variable newton_bond index on".to_string(),
            "variable units index real".to_string(),
        ]
    );
    position(&commands, "variable angle_style index 'harmonic'");
    position(
        &commands,
        &format!("read_data {}", d.artifacts().geometry.display()),
    );
    let obs = d.observe().unwrap();
    assert_eq!(obs.energy, fx.cfg.init_energy);
}

#[test]
fn drop_removes_artifacts_even_after_failure() {
    let fx = fixture();
    let build = fx.build();
    {
        let mut d = ready(&fx, &build, &ExecutionMode::Serial);
        d.fresh_init(AccumulationVariant::On).unwrap();
        std::fs::remove_file(&d.artifacts().geometry).unwrap();
        assert!(d.data_reload().is_err());
        assert!(d.artifacts().snapshot.exists());
    }
    assert!(fx.work_dir_is_empty());
}

#[test]
fn engine_failure_propagates() {
    let fx = fixture();
    let build = fx.build();
    let mut cfg = fx.cfg.clone();
    cfg.pre_commands.push("variable broken ${undefined}".into());
    let mut d = match ScenarioDriver::launch(&build, &cfg, &fx.settings, &ExecutionMode::Serial)
        .unwrap()
    {
        Launch::Ready(d) => d,
        Launch::Unmet(_) => panic!("prerequisites are met"),
    };
    let err = d.fresh_init(AccumulationVariant::On).unwrap_err();
    assert!(matches!(err, crate::HarnessError::Engine(EngineError::Command { .. })));
}

#[test]
fn fresh_init_requires_banner_and_run_summary() {
    let fx = fixture();
    let mut build = fx.build();
    build.model_mut().prints_run_summary = false;
    let mut d = ready(&fx, &build, &ExecutionMode::Serial);
    let err = d.fresh_init(AccumulationVariant::On).unwrap_err();
    assert!(matches!(
        err,
        crate::HarnessError::Engine(EngineError::UnexpectedOutput { expected: RUN_SUMMARY })
    ));
    assert!(!d.artifacts().snapshot.exists());
}

#[test]
fn silent_engine_skips_the_output_check() {
    let fx = fixture();
    let mut build = fx.build();
    build.model_mut().captures_output = false;
    build.model_mut().prints_run_summary = false;
    let mut d = ready(&fx, &build, &ExecutionMode::Serial);
    d.fresh_init(AccumulationVariant::On).unwrap();
}

#[test]
fn variant_display() {
    assert_eq!(AccumulationVariant::On.to_string(), "newton on");
    assert_eq!(PathKind::DataReload.to_string(), "geometry-file-reload");
}
