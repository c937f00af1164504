//! redshift-import-stats - data freshness plugin library.
//!
//! Reports, per table, how many seconds have passed since the newest row
//! arrived, as Mackerel custom metrics:
//! - `target` — parsing of `table:column:type[:offset]` specifications
//! - `query` — single-statement SQL builder over all targets
//! - `mapper` — result row to metric values
//! - `graph` — graph definitions for the agent
//! - `collector` — query execution (live Redshift/PostgreSQL, mock)
//! - `plugin` — agent protocol and the fetch cycle

pub mod collector;
pub mod error;
pub mod graph;
pub mod mapper;
pub mod metric;
pub mod plugin;
pub mod query;
pub mod target;

pub use error::{Error, TargetError};
