//! SQL builder for the multi-target freshness query.
//!
//! Every target becomes a single-row derived table computing its delay (and
//! optionally its row count) over the lookback window. The outer `SELECT`
//! cross-joins them so one round trip returns every value:
//!
//! ```text
//! SELECT
//!     orders.orders_delay,
//!     events.events_delay
//! FROM
//!     ( SELECT ... FROM orders WHERE ... ) AS orders,
//!     ( SELECT ... FROM events WHERE ... ) AS events;
//! ```

use chrono::{DateTime, Duration, Local, NaiveDateTime, Utc};

use crate::metric::{MetricKind, MetricOptions};
use crate::target::{Target, TargetKind};

/// How `timestamp` columns are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WallClock {
    /// Columns hold UTC wall-clock time.
    #[default]
    Utc,
    /// Columns hold wall-clock time of the host's local zone.
    Local,
}

/// The evaluation instant shared by every subquery of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalTime {
    instant: DateTime<Utc>,
    /// Seconds east of UTC of the zone `timestamp` columns are written in.
    offset_secs: i32,
}

impl EvalTime {
    /// Captures the current instant once.
    pub fn capture(clock: WallClock) -> Self {
        match clock {
            WallClock::Utc => Self::utc(Utc::now()),
            WallClock::Local => {
                let now = Local::now();
                Self::with_offset(now.with_timezone(&Utc), now.offset().local_minus_utc())
            }
        }
    }

    pub fn utc(instant: DateTime<Utc>) -> Self {
        Self::with_offset(instant, 0)
    }

    pub fn with_offset(instant: DateTime<Utc>, offset_secs: i32) -> Self {
        Self {
            instant,
            offset_secs,
        }
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }

    /// Unix seconds of the instant.
    pub fn epoch(&self) -> i64 {
        self.instant.timestamp()
    }

    /// Wall-clock reading in the configured zone.
    pub fn wall(&self) -> NaiveDateTime {
        self.instant.naive_utc() + Duration::seconds(i64::from(self.offset_secs))
    }

    /// Epoch of the wall-clock reading taken as UTC, comparable with
    /// `EXTRACT(epoch FROM ts)` on a zone-less column.
    pub fn wall_epoch(&self) -> i64 {
        self.epoch() + i64::from(self.offset_secs)
    }

    /// Lower bound literal for a `timestamp` column, clamped to the earliest
    /// representable time.
    fn wall_literal(&self, target: &Target) -> String {
        self.wall()
            .checked_sub_signed(Duration::seconds(target.offset_secs()))
            .unwrap_or(NaiveDateTime::MIN)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }
}

/// Result columns the built query returns, in select-list order.
pub fn select_columns(targets: &[Target], options: MetricOptions) -> Vec<String> {
    targets
        .iter()
        .flat_map(|t| options.kinds().iter().map(move |kind| kind.column(t)))
        .collect()
}

/// Builds the single statement covering all targets.
///
/// Output depends only on the arguments: the same targets and instant always
/// produce the same text.
pub fn build_query(targets: &[Target], now: &EvalTime, options: MetricOptions) -> String {
    let select_list = targets
        .iter()
        .flat_map(|t| {
            let alias = t.alias();
            options
                .kinds()
                .iter()
                .map(move |kind| format!("\t{}.{}", alias, kind.column(t)))
        })
        .collect::<Vec<_>>()
        .join(",\n");

    let from_list = targets
        .iter()
        .map(|t| build_subquery(t, now, options))
        .collect::<Vec<_>>()
        .join(",\n");

    format!("SELECT\n{select_list}\nFROM\n{from_list};\n")
}

fn build_subquery(target: &Target, now: &EvalTime, options: MetricOptions) -> String {
    let alias = target.alias();
    let table = &target.table;
    let column = &target.column;

    let (delay_expr, lower_bound) = match target.kind {
        TargetKind::Timestamp => (
            format!(
                "{} - EXTRACT(epoch FROM MAX({column}))::double precision",
                now.wall_epoch()
            ),
            format!("'{}'", now.wall_literal(target)),
        ),
        TargetKind::Integer => (
            format!("({} - MAX({column}))::double precision", now.epoch()),
            (now.epoch() - target.offset_secs()).to_string(),
        ),
    };

    let delay_column = MetricKind::Delay.column(target);
    let count_select = if options.with_count {
        format!(
            ",\n\t\t\tCOUNT(*)::bigint AS {}",
            MetricKind::Count.column(target)
        )
    } else {
        String::new()
    };

    format!(
        "\t(\n\t\tSELECT {delay_expr} AS {delay_column}{count_select}\n\t\tFROM {table} WHERE {column} >= {lower_bound}\n\t) AS {alias}"
    )
}
