//! End-to-end fetch cycle over a mock row source.

use chrono::{TimeZone, Utc};

use redshift_import_stats::collector::{MockSource, RowSource};
use redshift_import_stats::mapper::{ResultRow, Value};
use redshift_import_stats::metric::MetricOptions;
use redshift_import_stats::plugin::Plugin;
use redshift_import_stats::query::{EvalTime, build_query, select_columns};
use redshift_import_stats::target::{TargetKind, parse_targets};
use redshift_import_stats::{Error, TargetError};

fn now() -> EvalTime {
    EvalTime::utc(Utc.with_ymd_and_hms(2026, 2, 8, 10, 0, 0).single().unwrap())
}

#[test]
fn two_targets_end_to_end() {
    let targets = parse_targets(&["orders:updated_at:timestamp", "events:ts:integer:6"]).unwrap();
    assert_eq!(targets[0].kind, TargetKind::Timestamp);
    assert_eq!(targets[0].offset_hours, 24);
    assert_eq!(targets[1].kind, TargetKind::Integer);
    assert_eq!(targets[1].offset_hours, 6);

    let sql = build_query(&targets, &now(), MetricOptions::default());
    assert!(sql.starts_with("SELECT\n\torders.orders_delay,\n\tevents.events_delay\nFROM\n"));
    assert!(sql.contains(") AS orders,\n"));
    assert!(sql.ends_with(") AS events;\n"));

    let row: ResultRow = [
        ("orders_delay".to_string(), Value::Float(120.0)),
        ("events_delay".to_string(), Value::Int(5)),
    ]
    .into_iter()
    .collect();
    let mut source = MockSource::new(row);

    let plugin = Plugin::new(targets, MetricOptions::default());
    let metrics = plugin.fetch_metrics(&mut source, &now()).unwrap();

    assert_eq!(metrics.len(), 2);
    assert_eq!(metrics["delay.orders"], 120.0);
    assert_eq!(metrics["delay.events"], 5.0);
    assert_eq!(source.queries(), &[sql]);
}

#[test]
fn count_metrics_round_trip() {
    let targets = parse_targets(&[
        "public.orders:updated_at:timestamp:2",
        "raw.events:ts:integer",
    ])
    .unwrap();
    let options = MetricOptions::default().with_count(true);

    let columns = select_columns(&targets, options);
    assert_eq!(
        columns,
        vec![
            "public_orders_delay",
            "public_orders_count",
            "raw_events_delay",
            "raw_events_count",
        ]
    );

    let mut source = MockSource::uniform(&targets, options, Value::Float(42.5));
    let plugin = Plugin::new(targets, options).with_prefix("dwh");

    let mut out = Vec::new();
    plugin.run(&mut source, &now(), false, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    let keys: Vec<&str> = text
        .lines()
        .map(|l| l.split('\t').next().unwrap())
        .collect();
    assert_eq!(
        keys,
        vec![
            "redshift-import-stats-dwh.count.public_orders",
            "redshift-import-stats-dwh.count.raw_events",
            "redshift-import-stats-dwh.delay.public_orders",
            "redshift-import-stats-dwh.delay.raw_events",
        ]
    );
    assert!(text.lines().all(|l| l.contains("\t42.500000\t1770544800")));
}

#[test]
fn parse_errors_reference_input() {
    assert_eq!(
        parse_targets(&["bad"]).unwrap_err(),
        TargetError::MalformedTarget {
            spec: "bad".to_string()
        }
    );

    let err = parse_targets(&["t:c:weird"]).unwrap_err();
    assert!(err.to_string().contains("weird"));
    assert!(matches!(err, TargetError::InvalidType { ref kind, .. } if kind == "weird"));

    let err = parse_targets(&["t:c:integer:soon"]).unwrap_err();
    assert!(matches!(err, TargetError::InvalidOffset { ref offset, .. } if offset == "soon"));
}

#[test]
fn target_errors_are_configuration_errors() {
    for specs in [vec!["bad"], vec!["t:c:integer:0"], vec!["a:x:integer", "A:y:integer"]] {
        let err: Error = parse_targets(&specs[..]).unwrap_err().into();
        assert!(err.is_config(), "{specs:?}");
    }

    let err: Error = parse_targets::<&str>(&[]).unwrap_err().into();
    assert!(matches!(err, Error::Target(TargetError::NoTargets)));
    assert!(err.is_config());
}

#[test]
fn connection_failure_is_terminal() {
    let targets = parse_targets(&["orders:updated_at:timestamp"]).unwrap();
    let plugin = Plugin::new(targets, MetricOptions::default());
    let mut source = MockSource::refusing("connection refused");

    let mut out = Vec::new();
    let err = plugin
        .run(&mut source, &now(), false, &mut out)
        .unwrap_err();
    assert!(matches!(err, Error::Connection(_)));
    assert!(!err.is_config());
    assert!(out.is_empty());
}

#[test]
fn query_failure_is_terminal() {
    let targets = parse_targets(&["orders:updated_at:timestamp"]).unwrap();
    let plugin = Plugin::new(targets, MetricOptions::default());
    let mut source = MockSource::failing("ERROR: permission denied for relation orders");

    let err = plugin.fetch_metrics(&mut source, &now()).unwrap_err();
    assert!(matches!(err, Error::QueryExecution(ref msg) if msg.contains("permission denied")));
}

#[test]
fn row_source_is_object_safe() {
    let mut sources: Vec<Box<dyn RowSource>> = vec![
        Box::new(MockSource::new(ResultRow::new())),
        Box::new(MockSource::refusing("x")),
    ];
    assert!(sources[0].fetch_row("SELECT 1").unwrap().is_empty());
    assert!(sources[1].fetch_row("SELECT 1").is_err());
}
