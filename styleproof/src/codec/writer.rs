// SPDX-License-Identifier: AGPL-3.0-only

//! Scenario file encoding.
//!
//! The authored fields (commands, style, coefficients, tolerance) come from
//! a [`ScenarioConfig`]; everything the engine produced (version, timestamp,
//! particle count, energies, stresses, forces) comes from a [`GoldenRecord`].
//! Tags are always written in [`TAG_ORDER`](super::TAG_ORDER).

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::{DOC_END, DOC_START};
use crate::error::{HarnessError, Result};
use crate::scenario::{ForceTable, Observation, ScenarioConfig, StressTensor};

/// `strftime` layout of `date_generated` (`Fri Feb 26 23:09:02 2021`).
pub const DATE_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Engine-derived content of a golden file.
#[derive(Debug, Clone, PartialEq)]
pub struct GoldenRecord {
    /// Engine version string.
    pub engine_version: String,
    /// Generation timestamp in [`DATE_FORMAT`].
    pub date_generated: String,
    /// Live particle count.
    pub natoms: usize,
    /// Values after setup.
    pub init: Observation,
    /// Values after the short run.
    pub run: Observation,
}

impl GoldenRecord {
    /// The record a scenario already carries, for rewriting it unchanged.
    #[must_use]
    pub fn from_config(cfg: &ScenarioConfig) -> Self {
        Self {
            engine_version: cfg.engine_version.clone().unwrap_or_default(),
            date_generated: cfg.date_generated.clone().unwrap_or_default(),
            natoms: cfg.natoms,
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
        }
    }
}

/// Current local time in [`DATE_FORMAT`].
#[must_use]
pub fn timestamp_now() -> String {
    chrono::Local::now().format(DATE_FORMAT).to_string()
}

fn fix_exponent(formatted: &str) -> String {
    match formatted.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => formatted.to_string(),
    }
}

/// Format like C `% 23.16e`: sign column (space for non-negative), 16
/// fractional digits, exponent with sign and at least two digits, right
/// aligned in 23 columns.
///
/// Seventeen significant digits round-trip every finite `f64`.
#[must_use]
pub fn format_sci(value: f64) -> String {
    let body = if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        fix_exponent(&format!("{value:.16e}"))
    };
    let signed = if body.starts_with('-') {
        body
    } else {
        format!(" {body}")
    };
    format!("{signed:>23}")
}

/// Shortest round-tripping scientific form with a two-digit exponent
/// (`1e-07`), used for the authored tolerance.
#[must_use]
pub fn format_short(value: f64) -> String {
    fix_exponent(&format!("{value:e}"))
}

fn scalar<W: Write>(out: &mut W, tag: &str, value: &str) -> io::Result<()> {
    if value.is_empty() {
        writeln!(out, "{tag}: \"\"")
    } else {
        writeln!(out, "{tag}: {value}")
    }
}

fn block<W: Write, I>(out: &mut W, tag: &str, lines: I) -> io::Result<()>
where
    I: IntoIterator<Item = String>,
{
    let mut lines = lines.into_iter().peekable();
    if lines.peek().is_none() {
        return writeln!(out, "{tag}: \"\"");
    }
    writeln!(out, "{tag}: |")?;
    for line in lines {
        writeln!(out, "  {line}")?;
    }
    Ok(())
}

fn stress_line(stress: &StressTensor) -> String {
    stress
        .to_array()
        .iter()
        .map(|v| format_sci(*v))
        .collect::<Vec<_>>()
        .join(" ")
}

fn force_lines(forces: &ForceTable) -> impl Iterator<Item = String> + '_ {
    forces.iter().map(|(id, v)| {
        format!(
            "{id:>3} {} {} {}",
            format_sci(v.x),
            format_sci(v.y),
            format_sci(v.z)
        )
    })
}

/// Encode `cfg` with the engine-derived values of `record`.
///
/// # Errors
///
/// Returns any error of the underlying writer.
pub fn write_scenario<W: Write>(
    out: &mut W,
    cfg: &ScenarioConfig,
    record: &GoldenRecord,
) -> io::Result<()> {
    writeln!(out, "{DOC_START}")?;
    scalar(out, "engine_version", &record.engine_version)?;
    scalar(out, "date_generated", &record.date_generated)?;
    scalar(out, "epsilon", &format_short(cfg.epsilon))?;
    block(
        out,
        "prerequisites",
        cfg.prerequisites.iter().map(ToString::to_string),
    )?;
    block(out, "pre_commands", cfg.pre_commands.iter().cloned())?;
    block(out, "post_commands", cfg.post_commands.iter().cloned())?;
    scalar(out, "input_file", &cfg.input_file)?;
    scalar(out, "style_name", &cfg.style_name)?;
    block(out, "style_coeffs", cfg.style_coeffs.iter().cloned())?;
    block(
        out,
        "extract",
        cfg.extract.iter().map(|(k, v)| format!("{k} {v}")),
    )?;
    scalar(out, "natoms", &record.natoms.to_string())?;
    for (prefix, obs) in [("init", &record.init), ("run", &record.run)] {
        scalar(out, &format!("{prefix}_energy"), &format_sci(obs.energy))?;
        block(
            out,
            &format!("{prefix}_stress"),
            std::iter::once(stress_line(&obs.stress)),
        )?;
        block(out, &format!("{prefix}_forces"), force_lines(&obs.forces))?;
    }
    writeln!(out, "{DOC_END}")
}

/// Encode to a file, replacing it if it exists.
///
/// # Errors
///
/// Returns [`HarnessError::Io`] if the file cannot be created or written.
pub fn write_path(path: &Path, cfg: &ScenarioConfig, record: &GoldenRecord) -> Result<()> {
    let io_err = |source| HarnessError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut out = BufWriter::new(file);
    write_scenario(&mut out, cfg, record).map_err(io_err)?;
    out.flush().map_err(io_err)
}
