//! Maps the single row returned by the freshness query to metric values.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::error::Error;
use crate::metric::MetricOptions;
use crate::target::Target;

/// Scalar as returned by the database for one result column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Float(f64),
    Int(i64),
    Null,
    /// A type the mapper has no numeric reading for; holds the backend type name.
    Unsupported(String),
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Result row keyed by column name.
pub type ResultRow = HashMap<String, Value>;

/// Metric key to value, sorted by key.
pub type Metrics = BTreeMap<String, f64>;

/// Redistributes the flattened row into one metric per target and kind.
///
/// Every column the query was built to return must be present; a missing one
/// means the query and the mapping disagree and fails the whole cycle.
pub fn map_row(
    targets: &[Target],
    options: MetricOptions,
    row: &ResultRow,
) -> Result<Metrics, Error> {
    let mut metrics = Metrics::new();

    for target in targets {
        for kind in options.kinds() {
            let column = kind.column(target);
            let value = row
                .get(&column)
                .ok_or_else(|| Error::MissingColumn {
                    column: column.clone(),
                })?;
            metrics.insert(kind.key(target), coerce(&column, value));
        }
    }

    let expected = targets.len() * options.kinds().len();
    if row.len() > expected {
        debug!(
            "result row has {} columns, {} expected; extra columns ignored",
            row.len(),
            expected
        );
    }

    Ok(metrics)
}

fn coerce(column: &str, value: &Value) -> f64 {
    match value {
        Value::Float(v) => *v,
        Value::Int(v) => *v as f64,
        Value::Null => {
            warn!("{column}: no rows inside the lookback window, reporting 0");
            0.0
        }
        Value::Unsupported(ty) => {
            warn!("{column}: unsupported column type {ty}, reporting 0");
            0.0
        }
    }
}
