// SPDX-License-Identifier: AGPL-3.0-only

//! Block-tagged text codec for scenario files.
//!
//! A scenario file is a flat sequence of top-level entries between an
//! optional `---` start marker and a `...` end marker:
//!
//! ```text
//! ---
//! epsilon: 1e-07
//! input_file: in.fourmol
//! style_name: harmonic
//! style_coeffs: |
//!   1 75.0 110.1
//!   2 45.0 111.0
//! init_energy:  4.1166199966238429e+01
//! ...
//! ```
//!
//! A scalar entry is `tag: value`; a block entry is `tag: |` followed by
//! indented lines. Reading accepts tags in any order; writing always emits
//! [`TAG_ORDER`]. Floats are written in a fixed scientific layout
//! ([`format_sci`]) that round-trips `f64` exactly.

pub mod reader;
pub mod writer;


pub use reader::{read_path, read_str, ReaderOptions};
pub use writer::{format_sci, write_path, write_scenario, GoldenRecord};

/// Canonical tags in on-disk order.
pub const TAG_ORDER: [&str; 17] = [
    "engine_version",
    "date_generated",
    "epsilon",
    "prerequisites",
    "pre_commands",
    "post_commands",
    "input_file",
    "style_name",
    "style_coeffs",
    "extract",
    "natoms",
    "init_energy",
    "init_stress",
    "init_forces",
    "run_energy",
    "run_stress",
    "run_forces",
];

/// Start-of-document marker.
pub const DOC_START: &str = "---";

/// End-of-document marker; also closes the last open block.
pub const DOC_END: &str = "...";

/// Suffix of scenario files discovered in fixture directories.
pub const SCENARIO_EXTENSION: &str = "yaml";
