//! Abstraction over query execution to enable testing and mocking.
//!
//! The `RowSource` trait lets the fetch cycle run against a live
//! Redshift/PostgreSQL connection or an in-memory mock in tests.

use crate::error::Error;
use crate::mapper::ResultRow;

/// Executes one statement expected to return exactly one row.
pub trait RowSource {
    /// Runs `sql` and returns its single row keyed by column name.
    ///
    /// # Errors
    /// `Error::Connection` if no session could be established,
    /// `Error::QueryExecution` if the statement fails or the row count is not one.
    fn fetch_row(&mut self, sql: &str) -> Result<ResultRow, Error>;
}
