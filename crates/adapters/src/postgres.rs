// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change-data-capture input for Postgres.
//!
//! On stream start the input installs, under one transaction, a
//! notification function and an AFTER row trigger on every table in
//! the public schema, then listens on a channel named after the input
//! and decodes each notification into an [`Event`].

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgListener, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use weir_core::{Event, Input, InputConfig, InputError, Operation};

/// Acquire timeout for bootstrap connections.
const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Listener retry pacing: start at the minimum, double per failure,
/// cap at the maximum, reset on the next good notification.
const RETRY_MIN: Duration = Duration::from_secs(1);
const RETRY_MAX: Duration = Duration::from_secs(10);

/// Construction failures for [`PostgresInput`].
#[derive(Debug, Error)]
pub enum PostgresInputError {
    /// The connection string parses as neither a postgres URL nor a
    /// DSN sqlx understands.
    #[error("malformed connection string: {0}")]
    MalformedDsn(String),
}

/// Row-change notification payload emitted by the installed trigger
/// function.
#[derive(Debug, Deserialize)]
struct ChangeRecord {
    tbl: String,
    id: serde_json::Value,
    op: String,
}

/// Streams row-level changes out of a Postgres database.
///
/// The connection pool used for bootstrap and the notification
/// listener are independent connections; the listener re-establishes
/// itself after drops, paced by [`RETRY_MIN`]..[`RETRY_MAX`].
#[derive(Debug)]
pub struct PostgresInput {
    pool: PgPool,
    config: InputConfig,
}

impl PostgresInput {
    /// Build an input from `config`, whose connection string may be
    /// anything sqlx accepts for Postgres.
    ///
    /// The pool connects lazily: a malformed connection string fails
    /// here, an unreachable database on [`Input::stream`].
    pub fn new(config: InputConfig) -> Result<Self, PostgresInputError> {
        let options = PgConnectOptions::from_str(&config.connection_string)
            .map_err(|e| PostgresInputError::MalformedDsn(e.to_string()))?;

        let pool = PgPoolOptions::new()
            .acquire_timeout(CONNECT_TIMEOUT)
            .connect_lazy_with(options);

        Ok(Self { pool, config })
    }

    /// Whether this input's config asks for `operation` events.
    fn wants(&self, operation: Operation) -> bool {
        self.config.operations.is_empty() || self.config.operations.contains(&operation)
    }

    /// Install the notification function and per-table row triggers,
    /// under one transaction.
    async fn install_triggers(&self) -> Result<(), InputError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| InputError::Bootstrap(e.to_string()))?;

        sqlx::query(&notify_function_sql(self.config.id()))
            .execute(&mut *tx)
            .await
            .map_err(|e| InputError::Bootstrap(e.to_string()))?;

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT tablename FROM pg_catalog.pg_tables WHERE schemaname = 'public'",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| InputError::Bootstrap(e.to_string()))?;

        for table in &tables {
            sqlx::query(&row_trigger_sql(self.config.id(), table))
                .execute(&mut *tx)
                .await
                .map_err(|e| InputError::Bootstrap(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| InputError::Bootstrap(e.to_string()))?;

        tracing::debug!(input = %self.config.id(), tables = tables.len(), "triggers installed");

        Ok(())
    }
}

#[async_trait]
impl Input for PostgresInput {
    fn id(&self) -> String {
        self.config.id().to_string()
    }

    async fn stream(
        &self,
        cancel: CancellationToken,
        sink: mpsc::Sender<Event>,
    ) -> Result<(), InputError> {
        self.install_triggers().await?;

        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| InputError::Source(e.to_string()))?;
        listener
            .listen(self.config.id())
            .await
            .map_err(|e| InputError::Source(e.to_string()))?;

        let mut retry = RETRY_MIN;
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                received = listener.recv() => received,
            };

            let notification = match received {
                Ok(notification) => {
                    retry = RETRY_MIN;
                    notification
                }
                Err(err) => {
                    // The listener reconnects on the next recv; pace
                    // the attempts.
                    tracing::warn!(input = %self.config.id(), error = %err, "listener dropped");
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(retry) => {}
                    }
                    retry = (retry * 2).min(RETRY_MAX);
                    continue;
                }
            };

            let event = decode_change(notification.payload(), self.config.id())?;
            if !self.wants(event.operation) {
                continue;
            }

            if sink.send(event).await.is_err() {
                // Receiver gone: the router has shut down.
                return Ok(());
            }
        }
    }
}

/// Decode one notification payload into an event.
///
/// A payload that is not the trigger function's JSON means the
/// database is emitting garbage; that is not recoverable here, so the
/// decode error propagates and ends the stream.
fn decode_change(payload: &str, trigger: &str) -> Result<Event, InputError> {
    let record: ChangeRecord =
        serde_json::from_str(payload).map_err(|e| InputError::Decode(e.to_string()))?;

    Ok(Event {
        location: record.tbl,
        operation: Operation::parse_lossy(&record.op),
        id: coerce_id(&record.id),
        trigger: trigger.to_string(),
    })
}

/// The trigger function forwards `id` as whatever the row carried;
/// strings come through unquoted, anything else as its JSON text.
fn coerce_id(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `CREATE OR REPLACE` for the function every row trigger calls: it
/// notifies the channel named after the input with the changed table,
/// the row's `id` column (0 when absent), and the DML operation.
fn notify_function_sql(id: &str) -> String {
    format!(
        r#"CREATE OR REPLACE FUNCTION process_record_{id}() RETURNS TRIGGER as $process_record_{id}$
BEGIN
    PERFORM pg_notify('{id}', json_build_object('tbl', TG_TABLE_NAME, 'id', COALESCE(NEW.id, 0), 'op', TG_OP)::Text);
    RETURN NEW;
END;
$process_record_{id}$ LANGUAGE plpgsql;"#
    )
}

/// `CREATE OR REPLACE` for one table's AFTER row trigger.
fn row_trigger_sql(id: &str, table: &str) -> String {
    format!(
        r#"CREATE OR REPLACE TRIGGER {table}_{id}_trigger
AFTER INSERT OR UPDATE OR DELETE ON {table} FOR EACH ROW
EXECUTE PROCEDURE process_record_{id}();"#
    )
}

#[cfg(test)]
#[path = "postgres_tests.rs"]
mod postgres_tests;
