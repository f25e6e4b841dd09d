// SPDX-License-Identifier: AGPL-3.0-only

//! Deterministic in-process engine for exercising the harness.
//!
//! [`FakeEngine`] interprets the subset of the engine command language the
//! harness and its geometry scripts use: index variables with `${name}`
//! substitution, `clear`, `newton`, `read_data` / `read_restart`, the three
//! `write_*` exports, `run`, `compute`, and the family's style and
//! coefficient commands. Snapshot and geometry exports are real files, so
//! artifact handling is exercised against the filesystem.
//!
//! Energies, stresses and forces are not computed: they come from a
//! [`FakeModel`], shifted by configurable biases for each execution
//! condition so tests can provoke deviations on one specific path.
//!
//! Every command and file access is recorded in a shared [`Journal`].

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{
    ActiveStyle, DiagnosticHandle, Engine, EngineFactory, EngineResult, ExecutionMode, FORCE_FIELD,
};
use crate::error::EngineError;
use crate::scenario::{
    is_hybrid, ForceTable, Observation, ScenarioConfig, StressTensor, StyleFamily, Vec3,
};

/// Recorded interaction with a fake engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeEvent {
    /// An engine was constructed.
    Launch(ExecutionMode),
    /// A command after variable substitution.
    Command(String),
    /// A file was read by the engine.
    Read(PathBuf),
    /// A file was written by the engine.
    Write(PathBuf),
    /// An engine was dropped.
    Teardown,
}

/// Shared, append-only record of fake engine activity.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<FakeEvent>>>);

impl Journal {
    fn push(&self, event: FakeEvent) {
        match self.0.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }

    /// Snapshot of every recorded event.
    #[must_use]
    pub fn events(&self) -> Vec<FakeEvent> {
        match self.0.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Executed commands, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                FakeEvent::Command(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    /// File reads and writes, in order.
    #[must_use]
    pub fn file_accesses(&self) -> Vec<FakeEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, FakeEvent::Read(_) | FakeEvent::Write(_)))
            .collect()
    }

    /// Number of engines constructed.
    #[must_use]
    pub fn launches(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, FakeEvent::Launch(_)))
            .count()
    }

    /// Number of engines torn down.
    #[must_use]
    pub fn teardowns(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, FakeEvent::Teardown))
            .count()
    }
}

/// What the fake reports, and under which conditions it deviates.
#[derive(Debug, Clone, PartialEq)]
pub struct FakeModel {
    /// Version string.
    pub version: String,
    /// Family whose commands are interpreted.
    pub family: StyleFamily,
    /// Coefficient commands required before `run` is accepted.
    pub required_coeffs: usize,
    /// Local particle count override (`None`: all particles local).
    pub nlocal: Option<u64>,
    /// Values after setup.
    pub init: Observation,
    /// Values after any positive number of steps.
    pub run: Observation,
    /// Added to every value when symmetric accumulation is off.
    pub flag_off_bias: f64,
    /// Added to every value in threaded mode.
    pub threaded_bias: f64,
    /// Added to every value after `read_restart`.
    pub restart_bias: f64,
    /// Added to every value after reading an exported geometry file.
    pub reload_bias: f64,
    /// Added to the per-particle energy reduction.
    pub reduction_bias: f64,
    /// Added to the per-particle energy reduction in threaded mode only.
    pub threaded_reduction_bias: f64,
    /// Whether snapshots carry the style name.
    pub snapshot_keeps_style: bool,
    /// Whether the style writes its coefficients into exports.
    pub writes_coeffs: bool,
    /// Whether console output is captured at all.
    pub captures_output: bool,
    /// Whether `run` prints its loop-time summary.
    pub prints_run_summary: bool,
}

impl FakeModel {
    /// A model that reproduces the reference values of `cfg` exactly.
    #[must_use]
    pub fn from_scenario(cfg: &ScenarioConfig) -> Self {
        Self {
            version: "fake engine 1 Jan 2026".to_string(),
            family: cfg.family,
            required_coeffs: cfg.style_coeffs.len(),
            nlocal: None,
            init: Observation {
                energy: cfg.init_energy,
                stress: cfg.init_stress,
                forces: cfg.init_forces.clone(),
            },
            run: Observation {
                energy: cfg.run_energy,
                stress: cfg.run_stress,
                forces: cfg.run_forces.clone(),
            },
            flag_off_bias: 0.0,
            threaded_bias: 0.0,
            restart_bias: 0.0,
            reload_bias: 0.0,
            reduction_bias: 0.0,
            threaded_reduction_bias: 0.0,
            snapshot_keeps_style: true,
            writes_coeffs: true,
            captures_output: true,
            prints_run_summary: true,
        }
    }
}

/// A fake engine build: capability table, threaded package and model.
#[derive(Debug, Clone)]
pub struct FakeBuild {
    model: FakeModel,
    capabilities: HashSet<(String, String)>,
    threaded_package: bool,
    journal: Journal,
}

impl FakeBuild {
    /// A build with no capabilities and no threaded package.
    #[must_use]
    pub fn new(model: FakeModel) -> Self {
        Self {
            model,
            capabilities: HashSet::new(),
            threaded_package: false,
            journal: Journal::default(),
        }
    }

    /// A build that satisfies every prerequisite of `cfg` in both modes and
    /// reproduces its reference values.
    #[must_use]
    pub fn for_scenario(cfg: &ScenarioConfig) -> Self {
        let category = cfg.family.category();
        let mut build = Self::new(FakeModel::from_scenario(cfg))
            .with_threaded_package(true)
            .with_capability(category, "zero")
            .with_capability(category, "zero/omp");
        for p in &cfg.prerequisites {
            build = build.with_capability(&p.category, &p.name);
            if p.category == category {
                build = build.with_capability(&p.category, &format!("{}/omp", p.name));
            }
        }
        if let Some(base) = cfg.style_name.split_whitespace().next() {
            build = build.with_capability(category, base);
        }
        build
    }

    /// Add a capability.
    #[must_use]
    pub fn with_capability(mut self, category: &str, name: &str) -> Self {
        self.capabilities
            .insert((category.to_string(), name.to_string()));
        self
    }

    /// Remove a capability.
    #[must_use]
    pub fn without_capability(mut self, category: &str, name: &str) -> Self {
        self.capabilities
            .remove(&(category.to_string(), name.to_string()));
        self
    }

    /// Whether threaded mode can be launched.
    #[must_use]
    pub const fn with_threaded_package(mut self, present: bool) -> Self {
        self.threaded_package = present;
        self
    }

    /// Adjust the model.
    pub fn model_mut(&mut self) -> &mut FakeModel {
        &mut self.model
    }

    /// Journal shared by every engine this build launches.
    #[must_use]
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }
}

impl EngineFactory for FakeBuild {
    type Engine = FakeEngine;

    fn supports_mode(&self, mode: &ExecutionMode) -> bool {
        match mode {
            ExecutionMode::Serial => true,
            ExecutionMode::Threaded { .. } => self.threaded_package,
        }
    }

    fn launch(&self, mode: &ExecutionMode) -> EngineResult<FakeEngine> {
        if !self.supports_mode(mode) {
            return Err(EngineError::Launch(format!(
                "threaded package not installed, cannot run {mode}"
            )));
        }
        self.journal.push(FakeEvent::Launch(mode.clone()));
        Ok(FakeEngine {
            output: format!("LAMMPS ({})\n", self.model.version),
            model: self.model.clone(),
            capabilities: self.capabilities.clone(),
            mode: mode.clone(),
            journal: self.journal.clone(),
            variables: IndexMap::new(),
            state: SystemState::default(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Origin {
    #[default]
    Fresh,
    Snapshot,
    Export,
}

#[derive(Debug, Clone)]
struct SystemState {
    natoms: Option<usize>,
    style: Option<String>,
    coeffs: Vec<String>,
    step: u64,
    newton_pair: bool,
    newton_bond: bool,
    origin: Origin,
    computes: IndexMap<String, String>,
}

impl Default for SystemState {
    fn default() -> Self {
        Self {
            natoms: None,
            style: None,
            coeffs: Vec::new(),
            step: 0,
            newton_pair: true,
            newton_bond: true,
            origin: Origin::Fresh,
            computes: IndexMap::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    natoms: usize,
    style: Option<String>,
    #[serde(default)]
    coeffs: Vec<String>,
    step: u64,
    newton_pair: bool,
    newton_bond: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeometryFile {
    natoms: usize,
    #[serde(default)]
    coeffs: Vec<String>,
    #[serde(default)]
    exported: bool,
}

/// One fake engine instance.
#[derive(Debug)]
pub struct FakeEngine {
    model: FakeModel,
    capabilities: HashSet<(String, String)>,
    mode: ExecutionMode,
    journal: Journal,
    variables: IndexMap<String, String>,
    state: SystemState,
    output: String,
}

fn command_error(command: &str, message: impl Into<String>) -> EngineError {
    EngineError::Command {
        command: command.to_string(),
        message: message.into(),
    }
}

fn io_error(path: &Path, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Split on whitespace, keeping single- or double-quoted runs together.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_token = false;
    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                in_token = true;
            }
            None if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    tokens
}

fn parse_on_off(command: &str, word: &str) -> EngineResult<bool> {
    match word {
        "on" | "yes" => Ok(true),
        "off" | "no" => Ok(false),
        other => Err(command_error(command, format!("expected on/off, got '{other}'"))),
    }
}

impl FakeEngine {
    fn substitute(&self, line: &str) -> EngineResult<String> {
        let mut out = String::with_capacity(line.len());
        let mut rest = line;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or_else(|| command_error(line, "unterminated variable reference"))?;
            let name = &after[..end];
            let value = self
                .variables
                .get(name)
                .ok_or_else(|| command_error(line, format!("variable '{name}' is not defined")))?;
            out.push_str(value);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn symmetric_accumulation(&self) -> bool {
        match self.model.family {
            StyleFamily::Pair => self.state.newton_pair,
            _ => self.state.newton_bond,
        }
    }

    fn bias(&self) -> f64 {
        let mut bias = 0.0;
        if !self.symmetric_accumulation() {
            bias += self.model.flag_off_bias;
        }
        if matches!(self.mode, ExecutionMode::Threaded { .. }) {
            bias += self.model.threaded_bias;
        }
        match self.state.origin {
            Origin::Fresh => {}
            Origin::Snapshot => bias += self.model.restart_bias,
            Origin::Export => bias += self.model.reload_bias,
        }
        bias
    }

    fn observation(&self) -> Option<Observation> {
        self.state.style.as_ref()?;
        let base = if self.state.step > 0 {
            &self.model.run
        } else {
            &self.model.init
        };
        let b = self.bias();
        let stress = base.stress.to_array().map(|s| s + b);
        Some(Observation {
            energy: base.energy + b,
            stress: StressTensor::from_array(stress),
            forces: base
                .forces
                .iter()
                .map(|(id, v)| (id, Vec3::new(v.x + b, v.y + b, v.z + b)))
                .collect(),
        })
    }

    fn style_available(&self, name: &str) -> bool {
        let category = self.model.family.category();
        let Some(base) = name.split_whitespace().next() else {
            return false;
        };
        if let Some(suffix) = self.mode.suffix() {
            if self.has_capability(category, &format!("{base}/{suffix}")) {
                return true;
            }
        }
        self.has_capability(category, base)
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> EngineResult<()> {
        let text = serde_json::to_string_pretty(value)
            .map_err(|e| io_error(path, std::io::Error::other(e)))?;
        fs::write(path, text).map_err(|e| io_error(path, e))?;
        self.journal.push(FakeEvent::Write(path.to_path_buf()));
        Ok(())
    }

    fn read_json<T: for<'de> Deserialize<'de>>(&self, path: &Path) -> EngineResult<T> {
        self.journal.push(FakeEvent::Read(path.to_path_buf()));
        let text = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| io_error(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    fn exported_coeffs(&self) -> Vec<String> {
        if !self.model.writes_coeffs {
            return Vec::new();
        }
        let hybrid = self.state.style.as_deref().is_some_and(is_hybrid);
        if hybrid {
            // composite coefficients do not survive reconstruction
            return Vec::new();
        }
        self.state.coeffs.clone()
    }

    fn require_args<'a>(command: &str, args: &'a [String], n: usize) -> EngineResult<&'a [String]> {
        if args.len() < n {
            return Err(command_error(command, format!("expected {n} arguments")));
        }
        Ok(args)
    }

    fn dispatch(&mut self, command: &str, tokens: &[String]) -> EngineResult<()> {
        let (word, args) = match tokens.split_first() {
            Some(split) => split,
            None => return Ok(()),
        };
        let family = self.model.family;
        match word.as_str() {
            "variable" => self.variable(command, args),
            "clear" => {
                self.state = SystemState::default();
                Ok(())
            }
            "newton" => {
                let args = Self::require_args(command, args, 1)?;
                let pair = parse_on_off(command, &args[0])?;
                let bond = match args.get(1) {
                    Some(b) => parse_on_off(command, b)?,
                    None => pair,
                };
                self.state.newton_pair = pair;
                self.state.newton_bond = bond;
                Ok(())
            }
            "read_data" => {
                let args = Self::require_args(command, args, 1)?;
                let path = PathBuf::from(&args[0]);
                let geometry: GeometryFile = self.read_json(&path)?;
                self.state.natoms = Some(geometry.natoms);
                self.state.step = 0;
                if !geometry.coeffs.is_empty() {
                    self.state.coeffs = geometry.coeffs;
                }
                self.state.origin = if geometry.exported {
                    Origin::Export
                } else {
                    Origin::Fresh
                };
                Ok(())
            }
            "read_restart" => {
                let args = Self::require_args(command, args, 1)?;
                let path = PathBuf::from(&args[0]);
                let snap: SnapshotFile = self.read_json(&path)?;
                self.state = SystemState {
                    natoms: Some(snap.natoms),
                    style: snap.style,
                    coeffs: snap.coeffs,
                    step: snap.step,
                    newton_pair: snap.newton_pair,
                    newton_bond: snap.newton_bond,
                    origin: Origin::Snapshot,
                    computes: IndexMap::new(),
                };
                Ok(())
            }
            "write_restart" => {
                let args = Self::require_args(command, args, 1)?;
                let natoms = self.require_system(command)?;
                let snap = SnapshotFile {
                    natoms,
                    style: if self.model.snapshot_keeps_style {
                        self.state.style.clone()
                    } else {
                        None
                    },
                    coeffs: self.exported_coeffs(),
                    step: self.state.step,
                    newton_pair: self.state.newton_pair,
                    newton_bond: self.state.newton_bond,
                };
                self.write_json(Path::new(&args[0]), &snap)
            }
            "write_data" => {
                let args = Self::require_args(command, args, 1)?;
                let natoms = self.require_system(command)?;
                let geometry = GeometryFile {
                    natoms,
                    coeffs: self.exported_coeffs(),
                    exported: true,
                };
                self.write_json(Path::new(&args[0]), &geometry)
            }
            "write_coeff" => {
                let args = Self::require_args(command, args, 1)?;
                let path = Path::new(&args[0]);
                let mut text = String::new();
                for c in &self.state.coeffs {
                    text.push_str(family.coeff_command());
                    text.push(' ');
                    text.push_str(c);
                    text.push('\n');
                }
                fs::write(path, text).map_err(|e| io_error(path, e))?;
                self.journal.push(FakeEvent::Write(path.to_path_buf()));
                Ok(())
            }
            "run" => {
                let args = Self::require_args(command, args, 1)?;
                let steps: u64 = args[0]
                    .parse()
                    .map_err(|_| command_error(command, "expected a step count"))?;
                self.require_system(command)?;
                if self.state.style.is_none() {
                    return Err(command_error(command, format!("{family} style is not set")));
                }
                if self.state.coeffs.len() < self.model.required_coeffs {
                    return Err(command_error(
                        command,
                        format!("all {family} coefficients are not set"),
                    ));
                }
                self.state.step += steps;
                if self.model.prints_run_summary {
                    let natoms = self.state.natoms.unwrap_or(0);
                    self.output.push_str(&format!(
                        "Loop time of 0 on 1 procs for {steps} steps with {natoms} atoms\n"
                    ));
                }
                Ok(())
            }
            "compute" => {
                let args = Self::require_args(command, args, 3)?;
                self.state
                    .computes
                    .insert(args[0].clone(), args[2..].join(" "));
                Ok(())
            }
            w if w == family.style_command() => {
                let name = args.join(" ");
                if !self.style_available(&name) {
                    return Err(command_error(command, format!("unknown {family} style '{name}'")));
                }
                self.state.style = Some(name);
                self.state.coeffs.clear();
                Ok(())
            }
            w if w == family.coeff_command() => {
                if self.state.style.is_none() {
                    return Err(command_error(
                        command,
                        format!("{w} command before {} is set", family.style_command()),
                    ));
                }
                self.state.coeffs.push(args.join(" "));
                Ok(())
            }
            // fix, thermo, thermo_style, units, … have no observable effect
            _ => Ok(()),
        }
    }

    fn require_system(&self, command: &str) -> EngineResult<usize> {
        self.state
            .natoms
            .ok_or_else(|| command_error(command, "no system has been defined"))
    }

    fn variable(&mut self, command: &str, args: &[String]) -> EngineResult<()> {
        let args = Self::require_args(command, args, 2)?;
        let name = args[0].clone();
        match args[1].as_str() {
            "delete" => {
                self.variables.shift_remove(&name);
                Ok(())
            }
            "index" => {
                let args = Self::require_args(command, args, 3)?;
                // index variables keep their first definition
                self.variables
                    .entry(name)
                    .or_insert_with(|| args[2..].join(" "));
                Ok(())
            }
            "string" | "equal" => {
                let args = Self::require_args(command, args, 3)?;
                self.variables.insert(name, args[2..].join(" "));
                Ok(())
            }
            other => Err(command_error(command, format!("unsupported variable style '{other}'"))),
        }
    }
}

impl Engine for FakeEngine {
    fn version(&self) -> String {
        self.model.version.clone()
    }

    fn execute(&mut self, command: &str) -> EngineResult<()> {
        let line = self.substitute(command)?;
        self.journal.push(FakeEvent::Command(line.clone()));
        let tokens = tokenize(&line);
        self.dispatch(&line, &tokens)
    }

    fn execute_file(&mut self, path: &Path) -> EngineResult<()> {
        self.journal.push(FakeEvent::Read(path.to_path_buf()));
        let text = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.execute(line)?;
        }
        Ok(())
    }

    fn extract_setting(&self, name: &str) -> EngineResult<u64> {
        let natoms = self.state.natoms.unwrap_or(0) as u64;
        match name {
            "natoms" => Ok(natoms),
            "nlocal" => Ok(self.model.nlocal.unwrap_or(natoms)),
            other => Err(EngineError::UnknownQuantity(other.to_string())),
        }
    }

    fn extract_scalar(&self, name: &str) -> EngineResult<f64> {
        if name != self.model.family.energy_quantity() {
            return Err(EngineError::UnknownQuantity(name.to_string()));
        }
        self.observation()
            .map(|o| o.energy)
            .ok_or_else(|| EngineError::UnknownQuantity(name.to_string()))
    }

    fn extract_array(&self, name: &str) -> EngineResult<Vec<f64>> {
        if name != self.model.family.virial_quantity() {
            return Err(EngineError::UnknownQuantity(name.to_string()));
        }
        self.observation()
            .map(|o| o.stress.to_array().to_vec())
            .ok_or_else(|| EngineError::UnknownQuantity(name.to_string()))
    }

    fn extract_vector_field(&self, name: &str) -> EngineResult<ForceTable> {
        if name != FORCE_FIELD {
            return Err(EngineError::UnknownQuantity(name.to_string()));
        }
        match self.observation() {
            Some(o) => Ok(o.forces),
            None => Ok(ForceTable::with_natoms(self.state.natoms.unwrap_or(0))),
        }
    }

    fn has_capability(&self, category: &str, name: &str) -> bool {
        self.capabilities
            .contains(&(category.to_string(), name.to_string()))
    }

    fn active_style(&self, family: StyleFamily) -> Option<ActiveStyle> {
        if family != self.model.family {
            return None;
        }
        let name = self.state.style.clone()?;
        let writes_coeffs = self.model.writes_coeffs;
        Some(ActiveStyle {
            name,
            writes_coeffs,
        })
    }

    fn attach_diagnostic(&mut self, spec: &str) -> EngineResult<DiagnosticHandle> {
        let id = spec
            .split_whitespace()
            .next()
            .ok_or_else(|| command_error(spec, "empty diagnostic spec"))?
            .to_string();
        self.execute(&format!("compute {spec}"))?;
        Ok(DiagnosticHandle::new(id))
    }

    fn read_diagnostic(&self, handle: &DiagnosticHandle) -> EngineResult<f64> {
        let style = self
            .state
            .computes
            .get(handle.id())
            .ok_or_else(|| EngineError::UnknownDiagnostic(handle.id().to_string()))?;
        if !style.starts_with("reduce") {
            return Err(EngineError::UnknownQuantity(format!(
                "{} has no global scalar",
                handle.id()
            )));
        }
        let energy = self
            .observation()
            .map(|o| o.energy)
            .ok_or_else(|| EngineError::UnknownDiagnostic(handle.id().to_string()))?;
        let mut bias = self.model.reduction_bias;
        if matches!(self.mode, ExecutionMode::Threaded { .. }) {
            bias += self.model.threaded_reduction_bias;
        }
        Ok(energy + bias)
    }

    fn take_output(&mut self) -> Option<String> {
        self.model
            .captures_output
            .then(|| std::mem::take(&mut self.output))
    }
}

impl Drop for FakeEngine {
    fn drop(&mut self) {
        self.journal.push(FakeEvent::Teardown);
    }
}

/// Write a geometry script `in.<stem>` and its data file `<stem>.data` into
/// `dir`, in the shape the driver expects. Returns the script file name.
///
/// The script defines the accumulation flag, `data_file` and the family's
/// style variable with index semantics, so values set by the driver beforehand
/// take precedence.
///
/// # Errors
///
/// Returns any I/O error from writing the two files.
pub fn write_geometry(
    dir: &Path,
    family: StyleFamily,
    stem: &str,
    natoms: usize,
) -> std::io::Result<String> {
    let category = family.category();
    let flag = family.flag_variable();
    let newton = match family {
        StyleFamily::Pair => format!("newton ${{{flag}}} on"),
        _ => format!("newton on ${{{flag}}}"),
    };
    let script = format!(
        "# fake geometry for {stem}\n\
         variable {flag} index on\n\
         variable data_file index ${{input_dir}}/{stem}.data\n\
         variable {category}_style index zero\n\
         {newton}\n\
         read_data ${{data_file}}\n\
         {style} ${{{category}_style}}\n",
        style = family.style_command(),
    );
    let script_name = format!("in.{stem}");
    fs::write(dir.join(&script_name), script)?;
    let data = GeometryFile {
        natoms,
        coeffs: Vec::new(),
        exported: false,
    };
    let text = serde_json::to_string_pretty(&data).map_err(std::io::Error::other)?;
    fs::write(dir.join(format!("{stem}.data")), text)?;
    Ok(script_name)
}
