// SPDX-License-Identifier: AGPL-3.0-only

//! Command-execution port to the simulation engine.
//!
//! The harness never touches engine internals: all state changes go through
//! text commands ([`Engine::execute`]) and all values come back through the
//! extraction calls. Every call blocks until the engine is done; there is no
//! overlap between issuing a command and inspecting its result.
//!
//! ```text
//!   driver ──execute/execute_file──▶ Engine
//!   driver ◀─extract_*/read_diagnostic── Engine
//! ```
//!
//! Swapping the implementation (a real binding, or [`fake::FakeEngine`])
//! never changes harness logic.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::EngineError;
use crate::scenario::{ForceTable, StyleFamily};

pub mod fake;

/// Quantity name of the per-particle force field.
pub const FORCE_FIELD: &str = "f";

/// Result alias for engine calls.
pub type EngineResult<T> = Result<T, EngineError>;

/// Parallelism the engine is constructed with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One worker, reference numerics.
    Serial,
    /// Threaded styles (`<style>/<suffix>`) with `threads` workers.
    Threaded {
        /// Worker-thread count.
        threads: usize,
        /// Style suffix of the threaded package (`omp`).
        suffix: String,
    },
}

impl ExecutionMode {
    /// Threaded mode with the default `omp` suffix.
    #[must_use]
    pub fn threaded(threads: usize) -> Self {
        Self::Threaded {
            threads,
            suffix: "omp".to_string(),
        }
    }

    /// Style-name suffix, `None` for serial.
    #[must_use]
    pub fn suffix(&self) -> Option<&str> {
        match self {
            Self::Serial => None,
            Self::Threaded { suffix, .. } => Some(suffix.as_str()),
        }
    }

    /// Short label for logs and reports.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::Threaded { .. } => "threaded",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial => f.write_str("serial"),
            Self::Threaded { threads, suffix } => write!(f, "threaded ({threads} × /{suffix})"),
        }
    }
}

/// Opaque reference to a diagnostic attached with
/// [`Engine::attach_diagnostic`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiagnosticHandle(String);

impl DiagnosticHandle {
    /// Wrap an engine-side identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Engine-side identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// The style currently configured for a family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveStyle {
    /// Style name as configured.
    pub name: String,
    /// Whether the style writes its coefficients into snapshot and geometry
    /// files. When false, coefficients are lost on reload.
    pub writes_coeffs: bool,
}

/// A live engine instance.
pub trait Engine {
    /// Version string of the engine build.
    fn version(&self) -> String;

    /// Execute one command.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Command`] if the engine rejects it.
    fn execute(&mut self, command: &str) -> EngineResult<()>;

    /// Execute every command of a script file.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] if the file is unreadable, or the first
    /// command error.
    fn execute_file(&mut self, path: &Path) -> EngineResult<()>;

    /// Integer setting (`natoms`, `nlocal`).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownQuantity`] for unknown names.
    fn extract_setting(&self, name: &str) -> EngineResult<u64>;

    /// Scalar quantity (`angle_energy`).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownQuantity`] for unknown names.
    fn extract_scalar(&self, name: &str) -> EngineResult<f64>;

    /// Array quantity (`angle_virial`, six components).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownQuantity`] for unknown names.
    fn extract_array(&self, name: &str) -> EngineResult<Vec<f64>>;

    /// Per-particle 3-vectors indexed by particle id (`f`).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownQuantity`] for unknown names.
    fn extract_vector_field(&self, name: &str) -> EngineResult<ForceTable>;

    /// Whether the build contains style `name` of `category`.
    fn has_capability(&self, category: &str, name: &str) -> bool;

    /// Style configured for `family`, if any.
    fn active_style(&self, family: StyleFamily) -> Option<ActiveStyle>;

    /// Attach a diagnostic (`sum all reduce sum c_pe`); the first word is
    /// its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Command`] if the engine rejects the spec.
    fn attach_diagnostic(&mut self, spec: &str) -> EngineResult<DiagnosticHandle>;

    /// Current scalar value of an attached diagnostic.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownDiagnostic`] for stale handles.
    fn read_diagnostic(&self, handle: &DiagnosticHandle) -> EngineResult<f64>;

    /// Console output since launch or the previous call. `None` when the
    /// engine does not capture its output.
    fn take_output(&mut self) -> Option<String> {
        None
    }
}

/// Constructs engines for a parallelism mode.
pub trait EngineFactory {
    /// Engine type produced.
    type Engine: Engine;

    /// Whether the build can run `mode` at all (threaded package present).
    fn supports_mode(&self, mode: &ExecutionMode) -> bool;

    /// Construct a fresh engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Launch`] if construction fails.
    fn launch(&self, mode: &ExecutionMode) -> EngineResult<Self::Engine>;
}
