// SPDX-License-Identifier: AGPL-3.0-only

//! Scenario file decoding.
//!
//! Decoding happens in two passes. The lexer splits the text into
//! `(tag, line, body)` entries and resolves family aliases, so that
//! `angle_style` and `style_name` land on the same field. The assembler then
//! converts each body into its typed field. Any failure stops decoding with
//! a [`ParseError`] naming the line and, for numeric data, the token.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::warn;

use super::{DOC_END, DOC_START, TAG_ORDER};
use crate::error::{HarnessError, ParseError, Result};
use crate::scenario::{ForceTable, Prerequisite, ScenarioConfig, StressTensor, StyleFamily, Vec3};

/// Decoding switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Reject repeated tags instead of keeping the last occurrence.
    pub strict: bool,
}

impl ReaderOptions {
    /// Options rejecting repeated tags.
    #[must_use]
    pub const fn strict() -> Self {
        Self { strict: true }
    }
}

#[derive(Debug)]
enum Body {
    Scalar(String),
    Block(Vec<(usize, String)>),
}

#[derive(Debug)]
struct Entry {
    tag: &'static str,
    line: usize,
    body: Body,
}

impl Entry {
    /// Block lines, or the scalar as a single line when non-empty.
    fn lines(&self) -> Vec<(usize, &str)> {
        match &self.body {
            Body::Scalar(s) if s.is_empty() => Vec::new(),
            Body::Scalar(s) => vec![(self.line, s.as_str())],
            Body::Block(lines) => lines.iter().map(|(n, l)| (*n, l.as_str())).collect(),
        }
    }

    fn text(&self) -> String {
        match &self.body {
            Body::Scalar(s) => s.clone(),
            Body::Block(lines) => lines
                .iter()
                .map(|(_, l)| l.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    fn strings(&self) -> Vec<String> {
        self.lines().into_iter().map(|(_, l)| l.to_string()).collect()
    }
}

fn canonical_tag(tag: &str, family: StyleFamily) -> Option<&'static str> {
    if let Some(t) = TAG_ORDER.iter().find(|t| **t == tag) {
        return Some(t);
    }
    match tag {
        "lammps_version" => Some("engine_version"),
        t if t == family.style_command() => Some("style_name"),
        t if t == family.coeff_command() => Some("style_coeffs"),
        _ => None,
    }
}

/// `|` with optional indentation and chomping indicators (`|2-`).
fn is_block_indicator(rest: &str) -> bool {
    rest.strip_prefix('|')
        .is_some_and(|tail| tail.chars().all(|c| c.is_ascii_digit() || c == '+' || c == '-'))
}

fn unquote(value: &str) -> &str {
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

struct OpenBlock {
    tag: &'static str,
    written: String,
    line: usize,
    lines: Vec<(usize, String)>,
}

impl OpenBlock {
    fn close(self) -> Entry {
        Entry {
            tag: self.tag,
            line: self.line,
            body: Body::Block(self.lines),
        }
    }
}

fn lex(text: &str, family: StyleFamily) -> std::result::Result<Vec<Entry>, ParseError> {
    let mut entries = Vec::new();
    let mut open: Option<OpenBlock> = None;

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        if let Some(block) = open.as_mut() {
            if raw.starts_with(' ') || raw.starts_with('\t') {
                let content = raw.trim();
                if !content.is_empty() {
                    block.lines.push((line, content.to_string()));
                }
                continue;
            }
            if raw.trim().is_empty() {
                continue;
            }
            if let Some(block) = open.take() {
                entries.push(block.close());
            }
        }

        let trimmed = raw.trim_end();
        if trimmed.trim().is_empty() || trimmed == DOC_START || trimmed.starts_with('#') {
            continue;
        }
        if trimmed == DOC_END {
            return Ok(entries);
        }

        let (written, rest) = trimmed
            .split_once(':')
            .ok_or_else(|| ParseError::UnexpectedLine {
                line,
                text: trimmed.to_string(),
            })?;
        let written = written.trim();
        let tag = canonical_tag(written, family).ok_or_else(|| ParseError::UnknownTag {
            tag: written.to_string(),
            line,
        })?;
        // a leading `!` is a type marker and carries no content
        let rest = rest.trim();
        let rest = rest.strip_prefix('!').map_or(rest, str::trim_start);
        if is_block_indicator(rest) {
            open = Some(OpenBlock {
                tag,
                written: written.to_string(),
                line,
                lines: Vec::new(),
            });
        } else {
            entries.push(Entry {
                tag,
                line,
                body: Body::Scalar(unquote(rest).to_string()),
            });
        }
    }

    match open {
        Some(block) => Err(ParseError::TruncatedBlock {
            tag: block.written,
            line: block.line,
        }),
        None => Ok(entries),
    }
}

fn parse_float(tag: &str, line: usize, token: &str) -> std::result::Result<f64, ParseError> {
    token.parse().map_err(|_| ParseError::Malformed {
        tag: tag.to_string(),
        line,
        token: token.to_string(),
        expected: "float",
    })
}

fn parse_epsilon(entry: &Entry) -> std::result::Result<f64, ParseError> {
    let text = entry.text();
    let eps = parse_float(entry.tag, entry.line, text.trim())?;
    if !(eps.is_finite() && eps > 0.0) {
        return Err(ParseError::InvalidValue {
            tag: entry.tag.to_string(),
            line: entry.line,
            reason: format!("epsilon must be a positive finite number, got {eps}"),
        });
    }
    Ok(eps)
}

fn parse_natoms(entry: &Entry) -> std::result::Result<usize, ParseError> {
    let text = entry.text();
    let token = text.trim();
    token.parse().map_err(|_| ParseError::Malformed {
        tag: entry.tag.to_string(),
        line: entry.line,
        token: token.to_string(),
        expected: "particle count",
    })
}

fn parse_prerequisites(entry: &Entry) -> std::result::Result<Vec<Prerequisite>, ParseError> {
    entry
        .lines()
        .into_iter()
        .map(|(line, text)| {
            let words: Vec<&str> = text.split_whitespace().collect();
            match words.as_slice() {
                [category, name] => Ok(Prerequisite::new(*category, *name)),
                _ => Err(ParseError::WrongArity {
                    tag: entry.tag.to_string(),
                    line,
                    expected: 2,
                    found: words.len(),
                }),
            }
        })
        .collect()
}

fn parse_extract(
    entry: &Entry,
) -> std::result::Result<indexmap::IndexMap<String, String>, ParseError> {
    let mut map = indexmap::IndexMap::new();
    for (line, text) in entry.lines() {
        let (name, value) = text
            .split_once(char::is_whitespace)
            .ok_or_else(|| ParseError::WrongArity {
                tag: entry.tag.to_string(),
                line,
                expected: 2,
                found: 1,
            })?;
        map.insert(name.to_string(), value.trim().to_string());
    }
    Ok(map)
}

fn parse_stress(entry: &Entry) -> std::result::Result<StressTensor, ParseError> {
    let mut values = Vec::with_capacity(6);
    for (line, text) in entry.lines() {
        for token in text.split_whitespace() {
            values.push(parse_float(entry.tag, line, token)?);
        }
    }
    let found = values.len();
    let array: [f64; 6] = values.try_into().map_err(|_| ParseError::WrongArity {
        tag: entry.tag.to_string(),
        line: entry.line,
        expected: 6,
        found,
    })?;
    Ok(StressTensor::from_array(array))
}

/// Particle count the force blocks are bounded by: the last `natoms` entry
/// that parses to a non-zero count.
fn natoms_bound(entries: &[Entry]) -> Option<usize> {
    entries
        .iter()
        .rev()
        .find(|e| e.tag == "natoms")
        .and_then(|e| parse_natoms(e).ok())
        .filter(|&n| n > 0)
}

fn parse_forces(
    entry: &Entry,
    natoms: Option<usize>,
) -> std::result::Result<ForceTable, ParseError> {
    let mut table = ForceTable::new();
    let mut seen: HashMap<usize, usize> = HashMap::new();
    for (line, text) in entry.lines() {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let [id, x, y, z] = tokens.as_slice() else {
            return Err(ParseError::WrongArity {
                tag: entry.tag.to_string(),
                line,
                expected: 4,
                found: tokens.len(),
            });
        };
        let id: usize = id.parse().map_err(|_| ParseError::Malformed {
            tag: entry.tag.to_string(),
            line,
            token: (*id).to_string(),
            expected: "particle id",
        })?;
        if id == 0 {
            return Err(ParseError::InvalidValue {
                tag: entry.tag.to_string(),
                line,
                reason: "particle ids start at 1".to_string(),
            });
        }
        if let Some(n) = natoms.filter(|&n| id > n) {
            return Err(ParseError::InvalidValue {
                tag: entry.tag.to_string(),
                line,
                reason: format!("particle id {id} exceeds natoms {n}"),
            });
        }
        if let Some(first) = seen.insert(id, line) {
            return Err(ParseError::InvalidValue {
                tag: entry.tag.to_string(),
                line,
                reason: format!("particle id {id} already given on line {first}"),
            });
        }
        let v = Vec3::new(
            parse_float(entry.tag, line, x)?,
            parse_float(entry.tag, line, y)?,
            parse_float(entry.tag, line, z)?,
        );
        table.try_set(id, v).map_err(|e| ParseError::InvalidValue {
            tag: entry.tag.to_string(),
            line,
            reason: e.to_string(),
        })?;
    }
    Ok(table)
}

fn optional_text(entry: &Entry) -> Option<String> {
    let text = entry.text();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn apply(
    cfg: &mut ScenarioConfig,
    entry: &Entry,
    natoms: Option<usize>,
) -> std::result::Result<(), ParseError> {
    match entry.tag {
        "engine_version" => cfg.engine_version = optional_text(entry),
        "date_generated" => cfg.date_generated = optional_text(entry),
        "epsilon" => cfg.epsilon = parse_epsilon(entry)?,
        "prerequisites" => cfg.prerequisites = parse_prerequisites(entry)?,
        "pre_commands" => cfg.pre_commands = entry.strings(),
        "post_commands" => cfg.post_commands = entry.strings(),
        "input_file" => cfg.input_file = entry.text(),
        "style_name" => cfg.style_name = entry.text(),
        "style_coeffs" => cfg.style_coeffs = entry.strings(),
        "extract" => cfg.extract = parse_extract(entry)?,
        "natoms" => cfg.natoms = parse_natoms(entry)?,
        "init_energy" => cfg.init_energy = parse_float(entry.tag, entry.line, entry.text().trim())?,
        "init_stress" => cfg.init_stress = parse_stress(entry)?,
        "init_forces" => cfg.init_forces = parse_forces(entry, natoms)?,
        "run_energy" => cfg.run_energy = parse_float(entry.tag, entry.line, entry.text().trim())?,
        "run_stress" => cfg.run_stress = parse_stress(entry)?,
        "run_forces" => cfg.run_forces = parse_forces(entry, natoms)?,
        other => {
            return Err(ParseError::UnknownTag {
                tag: other.to_string(),
                line: entry.line,
            })
        }
    }
    Ok(())
}

/// Decode a scenario from text.
///
/// `basename` identifies the scenario (normally the file stem) and `family`
/// resolves the family-specific tag aliases.
///
/// # Errors
///
/// Returns the first [`ParseError`] encountered, or
/// [`ParseError::MissingTag`] when `input_file` or `style_name` is absent
/// or empty.
pub fn read_str(
    text: &str,
    basename: &str,
    family: StyleFamily,
    options: ReaderOptions,
) -> std::result::Result<ScenarioConfig, ParseError> {
    let entries = lex(text, family)?;
    let mut cfg = ScenarioConfig::new(basename, family);
    let mut seen: HashMap<&'static str, usize> = HashMap::new();
    let natoms = natoms_bound(&entries);

    for entry in &entries {
        if let Some(&first_line) = seen.get(entry.tag) {
            if options.strict {
                return Err(ParseError::DuplicateTag {
                    tag: entry.tag.to_string(),
                    line: entry.line,
                    first_line,
                });
            }
            warn!(
                scenario = basename,
                tag = entry.tag,
                line = entry.line,
                first_line,
                "duplicate tag, keeping the last occurrence"
            );
        }
        seen.insert(entry.tag, entry.line);
        apply(&mut cfg, entry, natoms)?;
    }

    if cfg.input_file.is_empty() {
        return Err(ParseError::MissingTag { tag: "input_file" });
    }
    if cfg.style_name.is_empty() {
        return Err(ParseError::MissingTag { tag: "style_name" });
    }
    Ok(cfg)
}

/// Decode a scenario file; the basename is the file stem.
///
/// # Errors
///
/// Returns [`HarnessError::Io`] if the file cannot be read and
/// [`HarnessError::Parse`] if it is malformed.
pub fn read_path(path: &Path, family: StyleFamily, options: ReaderOptions) -> Result<ScenarioConfig> {
    let text = fs::read_to_string(path).map_err(|source| HarnessError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let basename = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    read_str(&text, &basename, family, options).map_err(|source| HarnessError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
