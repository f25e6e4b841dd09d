// SPDX-License-Identifier: AGPL-3.0-only

//! Harness configuration.
//!
//! Defaults suit running the suite from the fixture directory. Every field
//! can be overridden from the environment ([`HarnessConfig::from_env`]) or
//! with the builder methods in tests.
//!
//! | Field | Default | Environment |
//! |-------|---------|-------------|
//! | `input_dir` | `.` | `STYLEPROOF_INPUT_DIR` |
//! | `work_dir` | `.` | `STYLEPROOF_WORK_DIR` |
//! | `threads` | 4 | `STYLEPROOF_THREADS` |
//! | `thread_suffix` | `omp` | `STYLEPROOF_SUFFIX` |
//! | `print_stats` | false | `STYLEPROOF_PRINT_STATS` |
//! | `strict_tags` | false | `STYLEPROOF_STRICT` |

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::codec::ReaderOptions;
use crate::engine::ExecutionMode;

/// Worker threads of the threaded mode unless overridden.
pub const DEFAULT_THREADS: usize = 4;

/// Style suffix of the threaded package unless overridden.
pub const DEFAULT_SUFFIX: &str = "omp";

/// Directories, parallelism and reporting switches for one harness run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Directory holding geometry scripts and their data files.
    pub input_dir: PathBuf,
    /// Directory receiving the temporary artifacts.
    pub work_dir: PathBuf,
    /// Worker threads of the threaded mode.
    pub threads: usize,
    /// Style suffix of the threaded package.
    pub thread_suffix: String,
    /// Log every block's statistics at `info` instead of `debug`.
    pub print_stats: bool,
    /// Reject duplicate tags when reading scenario files.
    pub strict_tags: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            work_dir: PathBuf::from("."),
            threads: DEFAULT_THREADS,
            thread_suffix: DEFAULT_SUFFIX.to_string(),
            print_stats: false,
            strict_tags: false,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

impl HarnessConfig {
    /// Defaults overlaid with `STYLEPROOF_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`. Unparseable values are
    /// ignored with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(dir) = lookup("STYLEPROOF_INPUT_DIR") {
            cfg.input_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("STYLEPROOF_WORK_DIR") {
            cfg.work_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("STYLEPROOF_THREADS") {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => cfg.threads = n,
                _ => warn!(value = %raw, "STYLEPROOF_THREADS is not a positive integer, ignored"),
            }
        }
        if let Some(suffix) = lookup("STYLEPROOF_SUFFIX") {
            if !suffix.trim().is_empty() {
                cfg.thread_suffix = suffix.trim().to_string();
            }
        }
        for (key, field) in [
            ("STYLEPROOF_PRINT_STATS", &mut cfg.print_stats),
            ("STYLEPROOF_STRICT", &mut cfg.strict_tags),
        ] {
            if let Some(raw) = lookup(key) {
                match parse_flag(&raw) {
                    Some(v) => *field = v,
                    None => warn!(key, value = %raw, "not a boolean, ignored"),
                }
            }
        }
        cfg
    }

    /// Set the input directory.
    #[must_use]
    pub fn with_input_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.input_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the artifact directory.
    #[must_use]
    pub fn with_work_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.work_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the threaded-mode worker count.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set the threaded package suffix.
    #[must_use]
    pub fn with_thread_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.thread_suffix = suffix.into();
        self
    }

    /// Log statistics of every block at `info`.
    #[must_use]
    pub const fn with_print_stats(mut self, on: bool) -> Self {
        self.print_stats = on;
        self
    }

    /// Reject duplicate tags.
    #[must_use]
    pub const fn with_strict_tags(mut self, on: bool) -> Self {
        self.strict_tags = on;
        self
    }

    /// The threaded execution mode these settings describe.
    #[must_use]
    pub fn threaded_mode(&self) -> ExecutionMode {
        ExecutionMode::Threaded {
            threads: self.threads,
            suffix: self.thread_suffix.clone(),
        }
    }

    /// Codec options these settings describe.
    #[must_use]
    pub const fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            strict: self.strict_tags,
        }
    }
}
