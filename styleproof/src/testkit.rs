// SPDX-License-Identifier: AGPL-3.0-only

//! Shared fixtures for unit tests: a three-particle angle scenario with its
//! geometry written to a scratch directory.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;

use tempfile::TempDir;

use crate::config::HarnessConfig;
use crate::engine::fake::{write_geometry, FakeBuild};
use crate::scenario::{ForceTable, Prerequisite, ScenarioConfig, StressTensor, StyleFamily, Vec3};

pub(crate) struct Fixture {
    pub _scratch: TempDir,
    pub cfg: ScenarioConfig,
    pub settings: HarnessConfig,
}

impl Fixture {
    pub fn build(&self) -> FakeBuild {
        FakeBuild::for_scenario(&self.cfg)
    }

    pub fn work_dir(&self) -> &Path {
        &self.settings.work_dir
    }

    pub fn work_dir_is_empty(&self) -> bool {
        std::fs::read_dir(self.work_dir()).unwrap().next().is_none()
    }
}

fn forces(scale: f64) -> ForceTable {
    [
        (1, Vec3::new(4.7865489310693519 * scale, 7.876_092_590_218_178, -3.2694525514709809)),
        (2, Vec3::new(-1.1124882516177386, -9.0075464203887741 * scale, -7.2431691227364725)),
        (3, Vec3::new(-4.6753001059075779, 1.1314538614201960, 1.0493784766181355e1 * scale)),
    ]
    .into_iter()
    .collect()
}

/// Reference scenario named `basename` for a fake engine; `style` may be
/// composite.
pub(crate) fn scenario(basename: &str, style: &str) -> ScenarioConfig {
    let mut cfg = ScenarioConfig::new(basename, StyleFamily::Angle);
    cfg.epsilon = 1e-7;
    cfg.prerequisites = vec![
        Prerequisite::new("atom", "full"),
        Prerequisite::new("angle", style.split_whitespace().last().unwrap_or(style)),
    ];
    cfg.pre_commands = vec!["variable units index real".into()];
    cfg.post_commands = vec!["angle_modify extra 0".into()];
    cfg.input_file = "in.tri".into();
    cfg.style_name = style.into();
    cfg.style_coeffs = if style.starts_with("hybrid") {
        vec!["1 harmonic 75.0 110.1".into()]
    } else {
        vec!["1 75.0 110.1".into()]
    };
    cfg.natoms = 3;
    cfg.init_energy = 12.345_678_901_234;
    cfg.init_stress = StressTensor::from_array([46.5, -12.25, 3.0, 0.125, -7.5, 2.0]);
    cfg.init_forces = forces(1.0);
    cfg.run_energy = 12.1;
    cfg.run_stress = StressTensor::from_array([45.0, -12.0, 2.75, 0.25, -7.0, 1.5]);
    cfg.run_forces = forces(0.99);
    cfg
}

/// Scratch directories with the geometry of [`scenario`] in `input/`.
pub(crate) fn fixture_with(style: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    let work = dir.path().join("work");
    std::fs::create_dir_all(&input).unwrap();
    std::fs::create_dir_all(&work).unwrap();
    write_geometry(&input, StyleFamily::Angle, "tri", 3).unwrap();
    let settings = HarnessConfig::default()
        .with_input_dir(&input)
        .with_work_dir(&work);
    Fixture {
        _scratch: dir,
        cfg: scenario("angle-test", style),
        settings,
    }
}

pub(crate) fn fixture() -> Fixture {
    fixture_with("harmonic")
}
