//! Metric kinds reported per target and the names derived from them.

use crate::target::Target;

/// A value computed for every target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKind {
    /// Seconds since the newest row inside the lookback window.
    Delay,
    /// Rows inside the lookback window.
    Count,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Delay => "delay",
            MetricKind::Count => "count",
        }
    }

    /// Result column produced by the target's subquery, e.g. `orders_delay`.
    pub fn column(&self, target: &Target) -> String {
        format!("{}_{}", target.alias(), self.as_str())
    }

    /// Reported metric key, e.g. `delay.orders`.
    pub fn key(&self, target: &Target) -> String {
        format!("{}.{}", self.as_str(), target.alias())
    }
}

/// Which metric kinds an invocation collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricOptions {
    /// Also report `COUNT(*)` over the lookback window.
    pub with_count: bool,
}

impl MetricOptions {
    pub fn with_count(mut self, enabled: bool) -> Self {
        self.with_count = enabled;
        self
    }

    /// Enabled kinds, delay always first.
    pub fn kinds(&self) -> &'static [MetricKind] {
        if self.with_count {
            &[MetricKind::Delay, MetricKind::Count]
        } else {
            &[MetricKind::Delay]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::parse_target;

    #[test]
    fn test_names_follow_alias() {
        let t = parse_target("public.orders:updated_at:timestamp").unwrap();
        assert_eq!(MetricKind::Delay.column(&t), "public_orders_delay");
        assert_eq!(MetricKind::Count.column(&t), "public_orders_count");
        assert_eq!(MetricKind::Delay.key(&t), "delay.public_orders");
        assert_eq!(MetricKind::Count.key(&t), "count.public_orders");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(MetricOptions::default().kinds(), &[MetricKind::Delay]);
        assert_eq!(
            MetricOptions::default().with_count(true).kinds(),
            &[MetricKind::Delay, MetricKind::Count]
        );
    }
}
