//! mackerel-plugin-redshift-import-stats - table freshness plugin for mackerel-agent.
//!
//! Usage:
//!   mackerel-plugin-redshift-import-stats -H cluster.example.com -d dwh -u monitor \
//!       -t public.orders:updated_at:timestamp -t events:ts:integer:6
//!
//! Connection flags fall back to PGHOST, PGPORT, PGUSER, PGPASSWORD,
//! PGDATABASE and PGSSLMODE.

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::io::Write;

use clap::{Parser, ValueEnum};
use tracing::{Level, debug, error};
use tracing_subscriber::EnvFilter;

use redshift_import_stats::Error;
use redshift_import_stats::collector::{ConnectionConfig, DEFAULT_PORT, PostgresSource, SslMode};
use redshift_import_stats::metric::MetricOptions;
use redshift_import_stats::plugin::{DEFAULT_PREFIX, Plugin, meta_requested};
use redshift_import_stats::query::{EvalTime, WallClock};
use redshift_import_stats::target::parse_targets;

/// Exit code for invalid flags or targets.
const EXIT_USAGE: i32 = 3;
/// Exit code for connection, query or output failures.
const EXIT_FAILURE: i32 = 1;

/// Reports seconds since the newest row of each target table.
#[derive(Parser)]
#[command(
    name = "mackerel-plugin-redshift-import-stats",
    about = "Data freshness metrics for Redshift/PostgreSQL tables",
    version
)]
struct Args {
    /// Redshift endpoint.
    #[arg(short = 'H', long, env = "PGHOST", default_value = "localhost")]
    host: String,

    /// Port number.
    #[arg(short, long, env = "PGPORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Database name.
    #[arg(short, long, env = "PGDATABASE")]
    database: Option<String>,

    /// User name.
    #[arg(short, long, env = "PGUSER")]
    user: Option<String>,

    /// Password.
    #[arg(short = 'P', long, env = "PGPASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// TLS negotiation.
    #[arg(long, env = "PGSSLMODE", value_enum, default_value_t = SslModeArg::Require)]
    sslmode: SslModeArg,

    /// Connection timeout in seconds (0 waits indefinitely).
    #[arg(long, default_value = "10")]
    connect_timeout: u64,

    /// Target table, repeatable. Format: table:column:type[:offset]
    ///   table: target table name, optionally schema-qualified
    ///   column: time column of the table
    ///   type: type of the time column [timestamp, integer]
    ///   offset: lookback window in hours (default: 24)
    #[arg(
        short,
        long = "target",
        value_name = "TABLE:COLUMN:TYPE[:OFFSET]",
        required = true,
        verbatim_doc_comment
    )]
    targets: Vec<String>,

    /// Metric key prefix.
    #[arg(long, default_value = DEFAULT_PREFIX)]
    prefix: String,

    /// Also report the number of rows inside each lookback window.
    #[arg(long)]
    count: bool,

    /// Zone of the wall-clock values stored in timestamp columns.
    #[arg(long, value_enum, default_value_t = TimezoneArg::Utc)]
    timezone: TimezoneArg,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SslModeArg {
    Disable,
    Prefer,
    Require,
}

impl From<SslModeArg> for SslMode {
    fn from(arg: SslModeArg) -> Self {
        match arg {
            SslModeArg::Disable => SslMode::Disable,
            SslModeArg::Prefer => SslMode::Prefer,
            SslModeArg::Require => SslMode::Require,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum TimezoneArg {
    Utc,
    Local,
}

impl From<TimezoneArg> for WallClock {
    fn from(arg: TimezoneArg) -> Self {
        match arg {
            TimezoneArg::Utc => WallClock::Utc,
            TimezoneArg::Local => WallClock::Local,
        }
    }
}

impl Args {
    fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
            sslmode: self.sslmode.into(),
            connect_timeout: (self.connect_timeout > 0).then_some(self.connect_timeout),
        }
    }
}

/// Initializes the tracing subscriber on stderr; stdout carries the plugin output.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for crate_name in ["mackerel_plugin_redshift_import_stats", "redshift_import_stats"] {
        if let Ok(directive) = format!("{}={}", crate_name, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> Result<(), Error> {
    let targets = parse_targets(&args.targets)?;
    debug!("{} targets: {:?}", targets.len(), targets);

    let options = MetricOptions::default().with_count(args.count);
    let plugin = Plugin::new(targets, options).with_prefix(args.prefix.clone());
    let now = EvalTime::capture(args.timezone.into());
    let mut source = PostgresSource::new(args.connection_config());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    plugin.run(&mut source, &now, meta_requested(), &mut out)?;
    out.flush()?;
    Ok(())
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_USAGE } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(&args) {
        if e.is_config() {
            error!("Failed Parse Targets: {}", e);
            std::process::exit(EXIT_USAGE);
        }
        error!("Failed FetchMetrics: {}", e);
        std::process::exit(EXIT_FAILURE);
    }
}
