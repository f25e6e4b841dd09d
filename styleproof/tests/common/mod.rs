// SPDX-License-Identifier: AGPL-3.0-only

//! Shared fixtures for the integration tests: a scratch fixture directory
//! with a fake geometry and a matching reference scenario.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::path::{Path, PathBuf};
use std::sync::Once;

use styleproof::engine::fake::{write_geometry, FakeBuild};
use styleproof::{
    ForceTable, HarnessConfig, Prerequisite, ScenarioConfig, StressTensor, StyleFamily, Vec3,
};
use tempfile::TempDir;

static LOGGING: Once = Once::new();

/// Route harness logs to the test output.
pub fn init_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Scratch `input/` and `work/` directories.
pub struct Bench {
    _scratch: TempDir,
    pub settings: HarnessConfig,
}

impl Bench {
    pub fn new() -> Self {
        init_logging();
        let scratch = tempfile::tempdir().unwrap();
        let input = scratch.path().join("input");
        let work = scratch.path().join("work");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::create_dir_all(&work).unwrap();
        let settings = HarnessConfig::default()
            .with_input_dir(&input)
            .with_work_dir(&work);
        Self {
            _scratch: scratch,
            settings,
        }
    }

    pub fn input_dir(&self) -> &Path {
        &self.settings.input_dir
    }

    pub fn work_dir(&self) -> &Path {
        &self.settings.work_dir
    }

    pub fn work_dir_is_empty(&self) -> bool {
        std::fs::read_dir(self.work_dir()).unwrap().next().is_none()
    }

    /// Write the geometry for `cfg` and return `cfg` pointing at it.
    pub fn with_geometry(&self, mut cfg: ScenarioConfig) -> ScenarioConfig {
        let stem = format!("{}-geom", cfg.basename);
        cfg.input_file = write_geometry(self.input_dir(), cfg.family, &stem, cfg.natoms).unwrap();
        cfg
    }

    pub fn scenario_path(&self, basename: &str) -> PathBuf {
        self.input_dir().join(format!("{basename}.yaml"))
    }
}

fn forces(natoms: usize, phase: f64) -> ForceTable {
    (1..=natoms)
        .map(|id| {
            let t = id as f64 * 0.37 + phase;
            (id, Vec3::new(10.0 * t.sin(), 7.5 * t.cos(), 0.25 * (2.0 * t).sin()))
        })
        .collect()
}

/// Angle scenario of `natoms` particles for the fake engine; `style` may be
/// composite (`hybrid harmonic`).
pub fn angle_scenario(basename: &str, style: &str, natoms: usize) -> ScenarioConfig {
    let mut cfg = ScenarioConfig::new(basename, StyleFamily::Angle);
    cfg.epsilon = 1e-7;
    cfg.prerequisites = vec![
        Prerequisite::new("atom", "full"),
        Prerequisite::new("angle", style.split_whitespace().last().unwrap()),
    ];
    cfg.pre_commands = vec!["variable units index real".into()];
    cfg.post_commands = vec![];
    cfg.style_name = style.into();
    cfg.style_coeffs = if style.starts_with("hybrid") {
        vec!["1 harmonic 75.0 110.1".into(), "2 harmonic 45.0 111.0".into()]
    } else {
        vec!["1 75.0 110.1".into(), "2 45.0 111.0".into()]
    };
    cfg.natoms = natoms;
    cfg.init_energy = 1.2345678901234e+01;
    cfg.init_stress = StressTensor::from_array([4.6e1, -1.2e1, 3.0, 0.5, -7.5, 2.0]);
    cfg.init_forces = forces(natoms, 0.0);
    cfg.run_energy = 1.21e1;
    cfg.run_stress = StressTensor::from_array([4.5e1, -1.1e1, 2.5, 0.25, -7.0, 1.5]);
    cfg.run_forces = forces(natoms, 0.01);
    cfg
}

/// A fake build reproducing `cfg` exactly.
pub fn exact_build(cfg: &ScenarioConfig) -> FakeBuild {
    FakeBuild::for_scenario(cfg)
}
