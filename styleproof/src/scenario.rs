// SPDX-License-Identifier: AGPL-3.0-only

//! Reference data model for one style scenario.
//!
//! A [`ScenarioConfig`] is built once (by the codec, or by the generator from
//! live engine state) and is read-only afterwards. Force tables keep the
//! engine's 1-based particle ids: slot 0 is an unused sentinel so that
//! `forces[id]` addresses a particle directly, exactly as ids are written in
//! reference files.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

pub use crate::error::ParticleIdError;
use crate::tolerances::DEFAULT_EPSILON;

/// Largest particle id a [`ForceTable`] accepts. Bounds the allocation a
/// single reference line can request.
pub const MAX_PARTICLE_ID: usize = 1 << 20;

/// A Cartesian 3-vector (one force per particle).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vec3 {
    /// x component
    pub x: f64,
    /// y component
    pub y: f64,
    /// z component
    pub z: f64,
}

impl Vec3 {
    /// Build from components.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Components in axis order.
    #[must_use]
    pub const fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Symmetric stress (virial) tensor in the fixed order xx yy zz xy xz yz.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[allow(missing_docs)]
pub struct StressTensor {
    pub xx: f64,
    pub yy: f64,
    pub zz: f64,
    pub xy: f64,
    pub xz: f64,
    pub yz: f64,
}

impl StressTensor {
    /// Component labels in storage order.
    pub const COMPONENTS: [&'static str; 6] = ["xx", "yy", "zz", "xy", "xz", "yz"];

    /// Build from the six components in storage order.
    #[must_use]
    pub const fn from_array(v: [f64; 6]) -> Self {
        Self {
            xx: v[0],
            yy: v[1],
            zz: v[2],
            xy: v[3],
            xz: v[4],
            yz: v[5],
        }
    }

    /// The six components in storage order.
    #[must_use]
    pub const fn to_array(&self) -> [f64; 6] {
        [self.xx, self.yy, self.zz, self.xy, self.xz, self.yz]
    }
}

/// Per-particle 3-vectors addressed by 1-based particle id.
///
/// An empty table means "not recorded". A populated table for `n` particles
/// has `n + 1` slots; slot 0 always holds the zero vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ForceTable {
    slots: Vec<Vec3>,
}

impl ForceTable {
    /// An empty (unrecorded) table.
    #[must_use]
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// A zero-filled table with room for ids `1..=natoms`.
    #[must_use]
    pub fn with_natoms(natoms: usize) -> Self {
        Self {
            slots: vec![Vec3::default(); natoms + 1],
        }
    }

    /// Number of slots, sentinel included (`natoms + 1` when populated).
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Highest addressable id.
    #[must_use]
    pub fn natoms(&self) -> usize {
        self.slots.len().saturating_sub(1)
    }

    /// Vector of particle `id`; `None` for the sentinel or out-of-range ids.
    #[must_use]
    pub fn get(&self, id: usize) -> Option<Vec3> {
        if id == 0 {
            return None;
        }
        self.slots.get(id).copied()
    }

    /// Store the vector of particle `id`, growing the table as needed. Gaps
    /// are zero-filled.
    ///
    /// # Errors
    ///
    /// Returns [`ParticleIdError`] for the sentinel id 0 and for ids above
    /// [`MAX_PARTICLE_ID`]; the table is left unchanged.
    pub fn try_set(&mut self, id: usize, value: Vec3) -> Result<(), ParticleIdError> {
        if id == 0 {
            return Err(ParticleIdError::Sentinel);
        }
        if id > MAX_PARTICLE_ID {
            return Err(ParticleIdError::TooLarge(id));
        }
        if self.slots.len() <= id {
            self.slots.resize(id + 1, Vec3::default());
        }
        self.slots[id] = value;
        Ok(())
    }

    /// Store the vector of particle `id`, growing the table as needed.
    ///
    /// # Panics
    ///
    /// Panics where [`try_set`](Self::try_set) would return an error.
    pub fn set(&mut self, id: usize, value: Vec3) {
        if let Err(e) = self.try_set(id, value) {
            panic!("{e}");
        }
    }

    /// `(id, vector)` pairs for ids `1..=natoms`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Vec3)> + '_ {
        self.slots.iter().copied().enumerate().skip(1)
    }
}

impl FromIterator<(usize, Vec3)> for ForceTable {
    fn from_iter<I: IntoIterator<Item = (usize, Vec3)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (id, v) in iter {
            table.set(id, v);
        }
        table
    }
}

/// A named engine capability the scenario requires.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Prerequisite {
    /// Capability category (`atom`, `angle`, `pair`, …).
    pub category: String,
    /// Capability name within the category.
    pub name: String,
}

impl Prerequisite {
    /// Build from category and name.
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Prerequisite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.category, self.name)
    }
}

/// Family of interaction styles a scenario exercises.
///
/// The harness logic is shared; the family only supplies command words,
/// quantity names and the capability category of the style under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleFamily {
    /// Two-body bonded terms.
    Bond,
    /// Three-body bonded terms.
    Angle,
    /// Four-body proper torsions.
    Dihedral,
    /// Four-body improper torsions.
    Improper,
    /// Non-bonded pairwise terms.
    Pair,
}

impl StyleFamily {
    /// Capability category and command stem (`angle`).
    #[must_use]
    pub const fn category(self) -> &'static str {
        match self {
            Self::Bond => "bond",
            Self::Angle => "angle",
            Self::Dihedral => "dihedral",
            Self::Improper => "improper",
            Self::Pair => "pair",
        }
    }

    /// Command that selects the style (`angle_style`); also the
    /// family-specific alias of the `style_name` tag.
    #[must_use]
    pub const fn style_command(self) -> &'static str {
        match self {
            Self::Bond => "bond_style",
            Self::Angle => "angle_style",
            Self::Dihedral => "dihedral_style",
            Self::Improper => "improper_style",
            Self::Pair => "pair_style",
        }
    }

    /// Command that assigns coefficients (`angle_coeff`); also the
    /// family-specific alias of the `style_coeffs` tag.
    #[must_use]
    pub const fn coeff_command(self) -> &'static str {
        match self {
            Self::Bond => "bond_coeff",
            Self::Angle => "angle_coeff",
            Self::Dihedral => "dihedral_coeff",
            Self::Improper => "improper_coeff",
            Self::Pair => "pair_coeff",
        }
    }

    /// Engine variable toggling symmetric force accumulation.
    #[must_use]
    pub const fn flag_variable(self) -> &'static str {
        match self {
            Self::Pair => "newton_pair",
            Self::Bond | Self::Angle | Self::Dihedral | Self::Improper => "newton_bond",
        }
    }

    /// Scalar quantity holding the style energy.
    #[must_use]
    pub const fn energy_quantity(self) -> &'static str {
        match self {
            Self::Bond => "bond_energy",
            Self::Angle => "angle_energy",
            Self::Dihedral => "dihedral_energy",
            Self::Improper => "improper_energy",
            Self::Pair => "pair_energy",
        }
    }

    /// Six-component array holding the style virial.
    #[must_use]
    pub const fn virial_quantity(self) -> &'static str {
        match self {
            Self::Bond => "bond_virial",
            Self::Angle => "angle_virial",
            Self::Dihedral => "dihedral_virial",
            Self::Improper => "improper_virial",
            Self::Pair => "pair_virial",
        }
    }
}

impl fmt::Display for StyleFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category())
    }
}

/// Whether a style name denotes a composite ("hybrid") style.
#[must_use]
pub fn is_hybrid(style_name: &str) -> bool {
    style_name.starts_with("hybrid")
}

/// Which recorded state a comparison targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// After setup and a zero-step settle.
    Init,
    /// After the short dynamics run.
    Run,
}

impl Stage {
    /// Prefix of the reference tags for this stage.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Run => "run",
        }
    }
}

/// Borrowed view of the reference values of one stage.
#[derive(Debug, Clone, Copy)]
pub struct Expected<'a> {
    /// Reference style energy.
    pub energy: f64,
    /// Reference virial.
    pub stress: &'a StressTensor,
    /// Reference forces by id.
    pub forces: &'a ForceTable,
}

/// Live values extracted from the engine at one point of a path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    /// Style energy.
    pub energy: f64,
    /// Style virial.
    pub stress: StressTensor,
    /// Forces by id.
    pub forces: ForceTable,
}

/// One scenario: inputs for the engine plus its expected outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    /// Identifier derived from the scenario file stem; also names the
    /// temporary artifacts.
    pub basename: String,
    /// Style family under test.
    pub family: StyleFamily,
    /// Engine version that produced the reference values (metadata).
    pub engine_version: Option<String>,
    /// Generation timestamp (metadata).
    pub date_generated: Option<String>,
    /// Capabilities the engine build must provide.
    pub prerequisites: Vec<Prerequisite>,
    /// Base relative tolerance.
    pub epsilon: f64,
    /// Commands run before the geometry is loaded.
    pub pre_commands: Vec<String>,
    /// Commands run after the style is set up.
    pub post_commands: Vec<String>,
    /// Geometry/topology script, relative to the input directory.
    pub input_file: String,
    /// Style under test.
    pub style_name: String,
    /// Coefficient assignments, one command each.
    pub style_coeffs: Vec<String>,
    /// Engine-specific diagnostic keys (round-tripped only).
    pub extract: IndexMap<String, String>,
    /// Expected particle count.
    pub natoms: usize,
    /// Style energy after setup.
    pub init_energy: f64,
    /// Virial after setup.
    pub init_stress: StressTensor,
    /// Forces after setup.
    pub init_forces: ForceTable,
    /// Style energy after the short run.
    pub run_energy: f64,
    /// Virial after the short run.
    pub run_stress: StressTensor,
    /// Forces after the short run.
    pub run_forces: ForceTable,
}

impl ScenarioConfig {
    /// An otherwise empty scenario for `family` named `basename`.
    pub fn new(basename: impl Into<String>, family: StyleFamily) -> Self {
        Self {
            basename: basename.into(),
            family,
            engine_version: None,
            date_generated: None,
            prerequisites: Vec::new(),
            epsilon: DEFAULT_EPSILON,
            pre_commands: Vec::new(),
            post_commands: Vec::new(),
            input_file: String::new(),
            style_name: String::new(),
            style_coeffs: Vec::new(),
            extract: IndexMap::new(),
            natoms: 0,
            init_energy: 0.0,
            init_stress: StressTensor::default(),
            init_forces: ForceTable::new(),
            run_energy: 0.0,
            run_stress: StressTensor::default(),
            run_forces: ForceTable::new(),
        }
    }

    /// Whether the style under test is composite.
    #[must_use]
    pub fn is_hybrid(&self) -> bool {
        is_hybrid(&self.style_name)
    }

    /// Reference values of `stage`.
    #[must_use]
    pub const fn expected(&self, stage: Stage) -> Expected<'_> {
        match stage {
            Stage::Init => Expected {
                energy: self.init_energy,
                stress: &self.init_stress,
                forces: &self.init_forces,
            },
            Stage::Run => Expected {
                energy: self.run_energy,
                stress: &self.run_stress,
                forces: &self.run_forces,
            },
        }
    }

    /// Replace the reference values of `stage` with a live observation.
    pub(crate) fn record(&mut self, stage: Stage, obs: Observation) {
        match stage {
            Stage::Init => {
                self.init_energy = obs.energy;
                self.init_stress = obs.stress;
                self.init_forces = obs.forces;
            }
            Stage::Run => {
                self.run_energy = obs.energy;
                self.run_stress = obs.stress;
                self.run_forces = obs.forces;
            }
        }
    }
}
