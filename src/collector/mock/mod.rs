//! In-memory row source for testing the fetch cycle without a database.

use crate::collector::traits::RowSource;
use crate::error::Error;
use crate::mapper::{ResultRow, Value};
use crate::metric::MetricOptions;
use crate::query::select_columns;
use crate::target::Target;

#[derive(Debug, Clone)]
enum Outcome {
    Row(ResultRow),
    ConnectError(String),
    QueryError(String),
}

/// Row source returning a canned result and recording every statement it receives.
#[derive(Debug, Clone)]
pub struct MockSource {
    outcome: Outcome,
    queries: Vec<String>,
}

impl MockSource {
    /// Returns `row` for every statement.
    pub fn new(row: ResultRow) -> Self {
        Self {
            outcome: Outcome::Row(row),
            queries: Vec::new(),
        }
    }

    /// Answers with `value` for every column the query over `targets` selects.
    pub fn uniform(targets: &[Target], options: MetricOptions, value: Value) -> Self {
        let row = select_columns(targets, options)
            .into_iter()
            .map(|col| (col, value.clone()))
            .collect();
        Self::new(row)
    }

    /// Fails as if the server were unreachable.
    pub fn refusing(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::ConnectError(message.into()),
            queries: Vec::new(),
        }
    }

    /// Connects but fails every statement.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::QueryError(message.into()),
            queries: Vec::new(),
        }
    }

    /// Statements received so far, oldest first.
    pub fn queries(&self) -> &[String] {
        &self.queries
    }
}

impl RowSource for MockSource {
    fn fetch_row(&mut self, sql: &str) -> Result<ResultRow, Error> {
        match &self.outcome {
            Outcome::ConnectError(msg) => Err(Error::Connection(msg.clone())),
            Outcome::QueryError(msg) => {
                self.queries.push(sql.to_string());
                Err(Error::QueryExecution(msg.clone()))
            }
            Outcome::Row(row) => {
                self.queries.push(sql.to_string());
                Ok(row.clone())
            }
        }
    }
}
