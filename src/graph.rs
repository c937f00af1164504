//! Graph definitions registered with the metrics backend.
//!
//! Built from the target list alone, so the agent can learn the graph shape
//! without a database round trip.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::metric::MetricOptions;
use crate::target::Target;

/// One graph: a titled set of series sharing a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Graph {
    pub label: String,
    pub unit: String,
    pub metrics: Vec<GraphMetric>,
}

/// One series inside a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphMetric {
    pub name: String,
    pub label: String,
    pub stacked: bool,
}

/// Builds one graph per enabled metric kind, keyed by the kind name.
///
/// Each graph lists one series per target, in target order, named by alias.
pub fn graph_definitions(
    targets: &[Target],
    options: MetricOptions,
    label_prefix: &str,
) -> BTreeMap<String, Graph> {
    let label_prefix = title_case(label_prefix);

    options
        .kinds()
        .iter()
        .map(|kind| {
            let graph = Graph {
                label: format!("{} {}", label_prefix, title_case(kind.as_str())),
                unit: "integer".to_string(),
                metrics: targets
                    .iter()
                    .map(|t| {
                        let alias = t.alias();
                        GraphMetric {
                            label: title_case(&alias),
                            name: alias,
                            stacked: false,
                        }
                    })
                    .collect(),
            };
            (kind.as_str().to_string(), graph)
        })
        .collect()
}

/// `public_order-items` → `Public Order Items`.
pub fn title_case(s: &str) -> String {
    s.split(['_', '.', '-', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
