//! Live row source backed by a `postgres::Client`.

use native_tls::TlsConnector;
use postgres::types::Type;
use postgres::{Client, NoTls, Row};
use postgres_native_tls::MakeTlsConnector;
use tracing::{debug, info};

use super::traits::RowSource;
use super::{ConnectionConfig, SslMode, format_postgres_error};
use crate::error::Error;
use crate::mapper::{ResultRow, Value};

/// Executes the freshness query over a single lazily opened session.
pub struct PostgresSource {
    config: ConnectionConfig,
    client: Option<Client>,
}

impl PostgresSource {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            client: None,
        }
    }

    fn ensure_connected(&mut self) -> Result<&mut Client, Error> {
        if self.client.is_none() {
            debug!("connecting: {}", self.config);
            let conn_str = self.config.connection_string();
            let result = match self.config.sslmode {
                SslMode::Disable => Client::connect(&conn_str, NoTls),
                SslMode::Prefer | SslMode::Require => {
                    let connector = TlsConnector::builder()
                        .build()
                        .map_err(|e| Error::Connection(format!("TLS setup: {}", e)))?;
                    Client::connect(&conn_str, MakeTlsConnector::new(connector))
                }
            };
            let client = result.map_err(|e| Error::Connection(format_postgres_error(&e)))?;
            info!("connected to {}:{}", self.config.host, self.config.port);
            self.client = Some(client);
        }

        self.client
            .as_mut()
            .ok_or_else(|| Error::Connection("not connected".to_string()))
    }
}

impl RowSource for PostgresSource {
    fn fetch_row(&mut self, sql: &str) -> Result<ResultRow, Error> {
        let client = self.ensure_connected()?;
        debug!("query:\n{}", sql);

        let rows = match client.query(sql, &[]) {
            Ok(rows) => rows,
            Err(e) => {
                // Session may be unusable after a failed statement.
                self.client = None;
                return Err(Error::QueryExecution(format_postgres_error(&e)));
            }
        };

        match rows.as_slice() {
            [row] => Ok(convert_row(row)),
            _ => Err(Error::QueryExecution(format!(
                "expected exactly one row, got {}",
                rows.len()
            ))),
        }
    }
}

fn convert_row(row: &Row) -> ResultRow {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| (col.name().to_string(), read_value(row, idx, col.type_())))
        .collect()
}

/// Reads a numeric column, widening to `f64`/`i64`.
fn read_value(row: &Row, idx: usize, ty: &Type) -> Value {
    let value = if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx).map(Value::from)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)
            .map(|v| Value::from(v.map(f64::from)))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx).map(Value::from)
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)
            .map(|v| Value::from(v.map(i64::from)))
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)
            .map(|v| Value::from(v.map(i64::from)))
    } else {
        return Value::Unsupported(ty.name().to_string());
    };

    value.unwrap_or_else(|_| Value::Unsupported(ty.name().to_string()))
}
