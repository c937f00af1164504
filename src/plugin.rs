//! Mackerel agent plugin protocol.
//!
//! The agent runs the plugin periodically and reads stdout:
//! - normally one `key\tvalue\tepoch` line per metric;
//! - with `MACKEREL_AGENT_PLUGIN_META` set, a `# mackerel-agent-plugin` header
//!   followed by the graph definitions as JSON.

use std::collections::BTreeMap;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::collector::RowSource;
use crate::error::Error;
use crate::graph::{Graph, graph_definitions};
use crate::mapper::{Metrics, map_row};
use crate::metric::MetricOptions;
use crate::query::{EvalTime, build_query};
use crate::target::Target;

/// Base of every metric key and the default `--prefix`.
pub const DEFAULT_PREFIX: &str = "redshift-import-stats";

/// Environment variable the agent sets when it asks for graph definitions.
pub const META_ENV: &str = "MACKEREL_AGENT_PLUGIN_META";

const META_HEADER: &str = "# mackerel-agent-plugin";

#[derive(Serialize)]
struct GraphDefinitions<'a> {
    graphs: BTreeMap<String, &'a Graph>,
}

/// Returns true when the agent requested graph definitions.
pub fn meta_requested() -> bool {
    std::env::var(META_ENV).is_ok_and(|v| !v.is_empty())
}

/// Freshness plugin over a fixed target list.
#[derive(Debug, Clone)]
pub struct Plugin {
    targets: Vec<Target>,
    options: MetricOptions,
    prefix: String,
}

impl Plugin {
    pub fn new(targets: Vec<Target>, options: MetricOptions) -> Self {
        Self {
            targets,
            options,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    /// Sets the user prefix; empty means the default.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        if !prefix.is_empty() {
            self.prefix = prefix;
        }
        self
    }

    /// Prefix of every reported key: `redshift-import-stats[-<prefix>]`.
    pub fn metric_key_prefix(&self) -> String {
        if self.prefix == DEFAULT_PREFIX {
            DEFAULT_PREFIX.to_string()
        } else {
            format!("{}-{}", DEFAULT_PREFIX, self.prefix)
        }
    }

    /// Graph definitions keyed by `<metric key prefix>.<graph>`.
    pub fn graph_definition(&self) -> BTreeMap<String, Graph> {
        let key_prefix = self.metric_key_prefix();
        graph_definitions(&self.targets, self.options, &self.prefix)
            .into_iter()
            .map(|(name, graph)| (format!("{}.{}", key_prefix, name), graph))
            .collect()
    }

    /// Runs one fetch cycle: build, execute, map.
    pub fn fetch_metrics(
        &self,
        source: &mut dyn RowSource,
        now: &EvalTime,
    ) -> Result<Metrics, Error> {
        let sql = build_query(&self.targets, now, self.options);
        let row = source.fetch_row(&sql)?;
        let metrics = map_row(&self.targets, self.options, &row)?;
        debug!("fetched {} metrics", metrics.len());
        Ok(metrics)
    }

    /// Writes the meta header and graph definitions JSON.
    pub fn output_definitions(&self, out: &mut dyn Write) -> Result<(), Error> {
        let graphs = self.graph_definition();
        let defs = GraphDefinitions {
            graphs: graphs.iter().map(|(k, g)| (k.clone(), g)).collect(),
        };
        writeln!(out, "{}", META_HEADER)?;
        serde_json::to_writer(&mut *out, &defs)?;
        writeln!(out)?;
        Ok(())
    }

    /// Writes one line per finite metric value.
    pub fn output_values(
        &self,
        out: &mut dyn Write,
        metrics: &Metrics,
        at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let key_prefix = self.metric_key_prefix();
        let epoch = at.timestamp();
        for (key, value) in metrics {
            if !value.is_finite() {
                warn!("{}: non-finite value {}, skipped", key, value);
                continue;
            }
            writeln!(out, "{}.{}\t{:.6}\t{}", key_prefix, key, value, epoch)?;
        }
        Ok(())
    }

    /// Prints definitions when `meta` is set, otherwise fetches and prints values.
    ///
    /// Nothing is written when the fetch fails.
    pub fn run(
        &self,
        source: &mut dyn RowSource,
        now: &EvalTime,
        meta: bool,
        out: &mut dyn Write,
    ) -> Result<(), Error> {
        if meta {
            return self.output_definitions(out);
        }

        let metrics = self.fetch_metrics(source, now)?;
        self.output_values(out, &metrics, now.instant())?;
        info!(
            "reported {} metrics for {} targets",
            metrics.len(),
            self.targets.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MockSource;
    use crate::mapper::{ResultRow, Value};
    use crate::target::parse_targets;
    use chrono::TimeZone;

    fn now() -> EvalTime {
        EvalTime::utc(Utc.with_ymd_and_hms(2026, 2, 8, 10, 0, 0).single().unwrap())
    }

    fn plugin() -> Plugin {
        let targets =
            parse_targets(&["orders:updated_at:timestamp", "events:ts:integer:6"]).unwrap();
        Plugin::new(targets, MetricOptions::default())
    }

    #[test]
    fn test_metric_key_prefix() {
        assert_eq!(plugin().metric_key_prefix(), "redshift-import-stats");
        assert_eq!(
            plugin().with_prefix("").metric_key_prefix(),
            "redshift-import-stats"
        );
        assert_eq!(
            plugin().with_prefix("dwh").metric_key_prefix(),
            "redshift-import-stats-dwh"
        );
    }

    #[test]
    fn test_output_values() {
        let mut metrics = Metrics::new();
        metrics.insert("delay.orders".to_string(), 120.0);
        metrics.insert("delay.events".to_string(), 5.0);
        metrics.insert("delay.broken".to_string(), f64::NAN);

        let mut out = Vec::new();
        plugin()
            .output_values(&mut out, &metrics, now().instant())
            .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "redshift-import-stats.delay.events\t5.000000\t1770544800\n\
             redshift-import-stats.delay.orders\t120.000000\t1770544800\n"
        );
    }

    #[test]
    fn test_output_definitions() {
        let mut out = Vec::new();
        plugin().with_prefix("dwh").output_definitions(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let (header, json) = text.split_once('\n').unwrap();
        assert_eq!(header, "# mackerel-agent-plugin");

        let parsed: serde_json::Value = serde_json::from_str(json.trim()).unwrap();
        let graph = &parsed["graphs"]["redshift-import-stats-dwh.delay"];
        assert_eq!(graph["label"], "Dwh Delay");
        assert_eq!(graph["unit"], "integer");
        assert_eq!(graph["metrics"][0]["name"], "orders");
        assert_eq!(graph["metrics"][1]["name"], "events");
        assert_eq!(graph["metrics"][1]["stacked"], false);
    }

    #[test]
    fn test_run_prints_values() {
        let row: ResultRow = [
            ("orders_delay".to_string(), Value::Float(120.0)),
            ("events_delay".to_string(), Value::Int(5)),
        ]
        .into_iter()
        .collect();
        let mut source = MockSource::new(row);

        let mut out = Vec::new();
        plugin().run(&mut source, &now(), false, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("redshift-import-stats.delay.orders\t120.000000\t1770544800\n"));
        assert_eq!(source.queries().len(), 1);
        assert!(source.queries()[0].contains(") AS events;"));
    }

    #[test]
    fn test_run_meta_skips_database() {
        let mut source = MockSource::refusing("unreachable");
        let mut out = Vec::new();
        plugin().run(&mut source, &now(), true, &mut out).unwrap();

        assert!(String::from_utf8(out).unwrap().starts_with("# mackerel-agent-plugin\n"));
        assert!(source.queries().is_empty());
    }

    #[test]
    fn test_run_failure_writes_nothing() {
        let mut source = MockSource::new(ResultRow::new());
        let mut out = Vec::new();
        let err = plugin()
            .run(&mut source, &now(), false, &mut out)
            .unwrap_err();

        assert!(matches!(err, Error::MissingColumn { .. }));
        assert!(out.is_empty());
    }
}
