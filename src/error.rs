//! Error types for target parsing and the metric fetch cycle.

use thiserror::Error;

/// Rejection of a raw `table:column:type[:offset]` target string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    /// Wrong number of fields, or an empty table/column.
    #[error("Can't parse target: {spec}, must be table:column:type(:offset) format")]
    MalformedTarget { spec: String },

    /// Type field is neither `timestamp` nor `integer`.
    #[error("Invalid type: {kind}, target: {spec}")]
    InvalidType { kind: String, spec: String },

    /// Offset field is not a positive number of hours.
    #[error("Invalid offset: {offset}, target: {spec}")]
    InvalidOffset { offset: String, spec: String },

    /// Table or column contains characters that can't be spliced into SQL.
    #[error("Invalid identifier: {ident}, target: {spec}")]
    InvalidIdentifier { ident: String, spec: String },

    /// Two targets resolve to the same alias.
    #[error("Duplicate alias: {alias} (targets {first} and {second})")]
    DuplicateAlias {
        alias: String,
        first: String,
        second: String,
    },

    #[error("target empty")]
    NoTargets,
}

/// Error aborting a single metric fetch cycle.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Target(#[from] TargetError),

    /// Database session could not be established.
    #[error("connect: {0}")]
    Connection(String),

    /// Statement failed or did not return exactly one row.
    #[error("query: {0}")]
    QueryExecution(String),

    /// Result row lacks a column the query was built to return.
    #[error("missing column in result row: {column}")]
    MissingColumn { column: String },

    #[error("output: {0}")]
    Output(#[from] std::io::Error),

    #[error("graph definition: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error comes from user-supplied configuration rather than runtime.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Target(_))
    }
}
