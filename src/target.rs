//! Parser for `table:column:type[:offset]` target specifications.
//!
//! Each target names a table, the column holding the arrival time of its rows,
//! how that column is encoded, and how far back (in hours) to look for the
//! newest row:
//!
//! - `orders:updated_at:timestamp` — 24 hour window (default)
//! - `analytics.events:ts:integer:6` — epoch-seconds column, 6 hour window

use std::collections::HashMap;
use std::fmt;

use crate::error::TargetError;

/// Lookback window applied when a target omits the offset field.
pub const DEFAULT_OFFSET_HOURS: u32 = 24;

/// Largest accepted lookback window: 100 years.
pub const MAX_OFFSET_HOURS: u32 = 100 * 365 * 24;

/// Identifier length the server keeps before truncating (PostgreSQL `NAMEDATALEN - 1`).
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Longest suffix appended to an alias to name a result column.
const LONGEST_COLUMN_SUFFIX: &str = "_count";

/// Encoding of the arrival-time column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// `timestamp` column, compared through `EXTRACT(epoch ...)`.
    Timestamp,
    /// Integer column holding Unix epoch seconds.
    Integer,
}

impl TargetKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "timestamp" => Some(TargetKind::Timestamp),
            "integer" => Some(TargetKind::Integer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Timestamp => "timestamp",
            TargetKind::Integer => "integer",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One monitored table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub table: String,
    pub column: String,
    pub kind: TargetKind,
    pub offset_hours: u32,
}

impl Target {
    /// Table name with schema separators replaced, usable as SQL alias and metric name.
    ///
    /// Lowercased, since the server folds unquoted identifiers and returns
    /// result columns in lowercase.
    pub fn alias(&self) -> String {
        self.table.replace('.', "_").to_ascii_lowercase()
    }

    /// Lookback window in seconds.
    pub fn offset_secs(&self) -> i64 {
        i64::from(self.offset_hours) * 3600
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.table, self.column, self.kind, self.offset_hours
        )
    }
}

/// Parses a single target specification.
///
/// # Examples
///
/// ```
/// use redshift_import_stats::target::{parse_target, TargetKind};
///
/// let t = parse_target("public.orders:updated_at:timestamp").unwrap();
/// assert_eq!(t.alias(), "public_orders");
/// assert_eq!(t.kind, TargetKind::Timestamp);
/// assert_eq!(t.offset_hours, 24);
/// ```
pub fn parse_target(spec: &str) -> Result<Target, TargetError> {
    let fields: Vec<&str> = spec.split(':').collect();
    if fields.len() < 3 || fields.len() > 4 {
        return Err(malformed(spec));
    }

    let (table, column, kind) = (fields[0], fields[1], fields[2]);
    if table.is_empty() || column.is_empty() {
        return Err(malformed(spec));
    }

    let kind = TargetKind::parse(kind).ok_or_else(|| TargetError::InvalidType {
        kind: kind.to_string(),
        spec: spec.to_string(),
    })?;

    let offset_hours = match fields.get(3) {
        Some(raw) => parse_offset(raw).ok_or_else(|| TargetError::InvalidOffset {
            offset: raw.to_string(),
            spec: spec.to_string(),
        })?,
        None => DEFAULT_OFFSET_HOURS,
    };

    check_identifier(table, true, spec)?;
    check_identifier(column, false, spec)?;

    let target = Target {
        table: table.to_string(),
        column: column.to_string(),
        kind,
        offset_hours,
    };
    check_alias(&target.alias(), spec)?;

    Ok(target)
}

/// Parses every specification in order, stopping at the first invalid one.
///
/// Targets whose aliases collide would address the same derived table in the
/// generated query, so they are rejected here.
pub fn parse_targets<S: AsRef<str>>(specs: &[S]) -> Result<Vec<Target>, TargetError> {
    if specs.is_empty() {
        return Err(TargetError::NoTargets);
    }

    let mut targets = Vec::with_capacity(specs.len());
    let mut seen: HashMap<String, usize> = HashMap::with_capacity(specs.len());

    for spec in specs {
        let spec = spec.as_ref();
        let target = parse_target(spec)?;
        let alias = target.alias();
        if let Some(&idx) = seen.get(&alias) {
            return Err(TargetError::DuplicateAlias {
                alias,
                first: specs[idx].as_ref().to_string(),
                second: spec.to_string(),
            });
        }
        seen.insert(alias, targets.len());
        targets.push(target);
    }

    Ok(targets)
}

fn malformed(spec: &str) -> TargetError {
    TargetError::MalformedTarget {
        spec: spec.to_string(),
    }
}

/// Offset must be a positive whole number of hours, at most `MAX_OFFSET_HOURS`.
fn parse_offset(raw: &str) -> Option<u32> {
    raw.parse::<u32>()
        .ok()
        .filter(|hours| (1..=MAX_OFFSET_HOURS).contains(hours))
}

/// The alias names a derived table and prefixes its result columns, all unquoted.
fn check_alias(alias: &str, spec: &str) -> Result<(), TargetError> {
    let starts_with_digit = alias.chars().next().is_some_and(|c| c.is_ascii_digit());
    let too_long = alias.len() + LONGEST_COLUMN_SUFFIX.len() > MAX_IDENTIFIER_LEN;

    if starts_with_digit || too_long {
        Err(TargetError::InvalidIdentifier {
            ident: alias.to_string(),
            spec: spec.to_string(),
        })
    } else {
        Ok(())
    }
}

/// Only plain identifier characters are accepted; the query is assembled as text.
fn check_identifier(ident: &str, allow_dot: bool, spec: &str) -> Result<(), TargetError> {
    let valid = ident
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || (allow_dot && c == '.'))
        && !ident.starts_with('.')
        && !ident.ends_with('.')
        && !ident.contains("..");

    if valid {
        Ok(())
    } else {
        Err(TargetError::InvalidIdentifier {
            ident: ident.to_string(),
            spec: spec.to_string(),
        })
    }
}
