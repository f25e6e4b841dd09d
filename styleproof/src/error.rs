// SPDX-License-Identifier: AGPL-3.0-only

//! Typed errors for scenario parsing, engine access and verification.
//!
//! Callers pattern-match on failure modes instead of parsing strings:
//! a malformed reference file ([`ParseError`]) is fatal for its scenario
//! before any engine work, a broken particle-count invariant
//! ([`StructuralMismatch`]) aborts the remaining comparisons of a mode, and
//! so does an engine failure ([`EngineError`]) during verification; both
//! surface as an aborted mode outcome there. Tolerance violations are data,
//! not errors; see `validation`.

use std::path::PathBuf;

use thiserror::Error;

use crate::scenario::Prerequisite;

/// Result alias for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// A reference file could not be decoded.
///
/// Every variant carries the 1-based line number where decoding stopped,
/// except [`ParseError::MissingTag`] which is detected after the last line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A top-level tag that no consumer recognizes.
    #[error("line {line}: unknown tag '{tag}'")]
    UnknownTag {
        /// The tag as written.
        tag: String,
        /// Line of the tag.
        line: usize,
    },

    /// A required tag never appeared.
    #[error("missing required tag '{tag}'")]
    MissingTag {
        /// Canonical tag name.
        tag: &'static str,
    },

    /// A tag appeared twice while strict decoding was requested.
    #[error("line {line}: duplicate tag '{tag}' (first seen on line {first_line})")]
    DuplicateTag {
        /// Canonical tag name.
        tag: String,
        /// Line of the second occurrence.
        line: usize,
        /// Line of the first occurrence.
        first_line: usize,
    },

    /// A token could not be read as the expected number.
    #[error("line {line}: malformed {expected} '{token}' in '{tag}'")]
    Malformed {
        /// Tag of the enclosing entry.
        tag: String,
        /// Offending line.
        line: usize,
        /// Offending token.
        token: String,
        /// What the token should have been ("float", "particle id", …).
        expected: &'static str,
    },

    /// A line had the wrong number of columns.
    #[error("line {line}: '{tag}' expects {expected} columns, found {found}")]
    WrongArity {
        /// Tag of the enclosing entry.
        tag: String,
        /// Offending line.
        line: usize,
        /// Required column count.
        expected: usize,
        /// Column count found.
        found: usize,
    },

    /// Input ended while a block was still open.
    #[error("line {line}: block '{tag}' is truncated (no end marker)")]
    TruncatedBlock {
        /// Tag of the open block.
        tag: String,
        /// Line where the block started.
        line: usize,
    },

    /// A syntactically valid value that violates a model invariant.
    #[error("line {line}: invalid value for '{tag}': {reason}")]
    InvalidValue {
        /// Tag of the enclosing entry.
        tag: String,
        /// Offending line.
        line: usize,
        /// Human-readable reason.
        reason: String,
    },

    /// A top-level line that is neither a tag, a comment nor a marker.
    #[error("line {line}: expected 'tag: value', found '{text}'")]
    UnexpectedLine {
        /// Offending line.
        line: usize,
        /// Line content.
        text: String,
    },
}

/// A particle id a [`crate::ForceTable`] cannot address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParticleIdError {
    /// Id 0 is the sentinel slot.
    #[error("particle id 0 is the sentinel slot; ids start at 1")]
    Sentinel,

    /// Above [`crate::scenario::MAX_PARTICLE_ID`].
    #[error("particle id {0} exceeds the limit of {max}", max = crate::scenario::MAX_PARTICLE_ID)]
    TooLarge(usize),
}

/// A structural precondition of the comparison failed.
///
/// A run in which particles are not all local to this process (or in which
/// the particle count differs from the reference) invalidates every
/// subsequent per-id comparison, so the mode stops here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralMismatch {
    /// Not every particle is owned by the local process.
    #[error("{stage}: only {nlocal} of {natoms} particles are local")]
    NotAllLocal {
        /// Path and variant being checked.
        stage: String,
        /// Global particle count.
        natoms: u64,
        /// Local particle count.
        nlocal: u64,
    },

    /// The engine holds a different number of particles than the reference.
    #[error("{stage}: engine holds {live} particles, reference expects {expected}")]
    ParticleCount {
        /// Path and variant being checked.
        stage: String,
        /// Live particle count.
        live: u64,
        /// Reference `natoms`.
        expected: u64,
    },

    /// A reference force table does not cover every local particle.
    #[error("{stage}: reference '{table}' has {len} slots, expected {expected}")]
    ReferenceLength {
        /// Path and variant being checked.
        stage: String,
        /// Which table (`init_forces` / `run_forces`).
        table: &'static str,
        /// Slots present (including sentinel slot 0).
        len: usize,
        /// `nlocal + 1`.
        expected: usize,
    },
}

/// Failures reported by an engine behind the command-execution port.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not be constructed for the requested mode.
    #[error("engine launch failed: {0}")]
    Launch(String),

    /// A command was rejected.
    #[error("command '{command}' failed: {message}")]
    Command {
        /// The command text as sent.
        command: String,
        /// Engine diagnostic.
        message: String,
    },

    /// A named quantity is not known to the engine.
    #[error("unknown quantity '{0}'")]
    UnknownQuantity(String),

    /// A diagnostic handle does not refer to an attached diagnostic.
    #[error("unknown diagnostic '{0}'")]
    UnknownDiagnostic(String),

    /// Captured console output lacks an expected marker.
    #[error("engine output lacks '{expected}'")]
    UnexpectedOutput {
        /// The missing marker.
        expected: &'static str,
    },

    /// File access inside the engine failed.
    #[error("engine I/O on {}: {source}", path.display())]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced by the harness to its callers.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The scenario file is malformed.
    #[error("{}: {source}", path.display())]
    Parse {
        /// Scenario file.
        path: PathBuf,
        /// Decoding failure.
        #[source]
        source: ParseError,
    },

    /// A scenario file could not be read or written.
    #[error("I/O on {}: {source}", path.display())]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The engine failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A structural precondition failed; the mode is aborted.
    #[error("structural mismatch: {0}")]
    StructuralMismatch(#[from] StructuralMismatch),

    /// A golden file cannot be generated because the engine build lacks
    /// required capabilities. Verification reports this as a skip instead.
    #[error("prerequisites unmet: {}", format_prerequisites(missing))]
    PrerequisiteUnmet {
        /// Every prerequisite that failed the availability check.
        missing: Vec<Prerequisite>,
    },

    /// The machine-readable report could not be serialized.
    #[error("report serialization failed: {0}")]
    Report(#[from] serde_json::Error),
}

fn format_prerequisites(missing: &[Prerequisite]) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
