use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use pulseboard_core::error::{Result, PulseError};
use pulseboard_core::{CounterState, MetricName};

use super::CounterRepository;

const RECORD_ID: &str = "global";

fn db_err(ctx: &'static str) -> impl FnOnce(sqlx::Error) -> PulseError {
    move |e| PulseError::Persistence(format!("{ctx}: {e}"))
}

fn to_db(value: u64) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| PulseError::Persistence(format!("value {value} exceeds sqlite integer range")))
}

fn from_db(metric: MetricName, value: i64) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| PulseError::Persistence(format!("stored {metric} is negative: {value}")))
}

/// SQLite-backed repository: one row (`id = 'global'`) in `dashboard_metrics`.
///
/// The pool connects lazily and the schema is created on first use, so an
/// unreachable database never blocks startup and later writes keep retrying.
pub struct SqliteCounterRepository {
    pool: SqlitePool,
    schema_ready: AtomicBool,
}

impl SqliteCounterRepository {
    /// Build a lazily-connected pool for `db_url` (`sqlite://path` or
    /// `sqlite::memory:`).
    pub async fn connect(db_url: &str) -> Result<Self> {
        let in_memory = db_url.contains(":memory:");

        // Ensure the directory exists if it's a file path
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    tokio::fs::create_dir_all(parent).await.map_err(|e| {
                        PulseError::Persistence(format!("create database directory failed: {e}"))
                    })?;
                }
            }
        }

        let mut options = SqliteConnectOptions::from_str(db_url)
            .map_err(db_err("invalid sqlite url"))?
            .create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // An in-memory database lives as long as its single connection.
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_lazy_with(options)
        } else {
            SqlitePoolOptions::new()
                .max_connections(4)
                .connect_lazy_with(options)
        };

        tracing::info!(url = %db_url, "sqlite repository configured");
        Ok(Self {
            pool,
            schema_ready: AtomicBool::new(false),
        })
    }

    async fn ensure_schema(&self) -> Result<()> {
        if self.schema_ready.load(Ordering::Acquire) {
            return Ok(());
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dashboard_metrics (
                id TEXT PRIMARY KEY,
                paircode INTEGER NOT NULL DEFAULT 0,
                api INTEGER NOT NULL DEFAULT 0,
                bot INTEGER NOT NULL DEFAULT 0,
                cdn INTEGER NOT NULL DEFAULT 0,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err("create dashboard_metrics table failed"))?;

        self.schema_ready.store(true, Ordering::Release);
        tracing::debug!("dashboard_metrics schema ready");
        Ok(())
    }
}

#[async_trait]
impl CounterRepository for SqliteCounterRepository {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn load(&self) -> Result<Option<CounterState>> {
        self.ensure_schema().await?;

        let row = sqlx::query_as::<_, (i64, i64, i64, i64)>(
            r#"
            SELECT paircode, api, bot, cdn
            FROM dashboard_metrics
            WHERE id = ?
            "#,
        )
        .bind(RECORD_ID)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("load counters failed"))?;

        let Some((paircode, api, bot, cdn)) = row else { return Ok(None); };
        Ok(Some(CounterState {
            paircode: from_db(MetricName::Paircode, paircode)?,
            api: from_db(MetricName::Api, api)?,
            bot: from_db(MetricName::Bot, bot)?,
            cdn: from_db(MetricName::Cdn, cdn)?,
        }))
    }

    async fn save_field(&self, metric: MetricName, value: u64) -> Result<()> {
        self.ensure_schema().await?;

        // Column names come from the closed MetricName set, never from input.
        let col = metric.as_str();
        let sql = format!(
            "INSERT INTO dashboard_metrics (id, {col}, updated_at) \
             VALUES (?, ?, CURRENT_TIMESTAMP) \
             ON CONFLICT(id) DO UPDATE SET {col} = excluded.{col}, updated_at = CURRENT_TIMESTAMP"
        );
        sqlx::query(&sql)
            .bind(RECORD_ID)
            .bind(to_db(value)?)
            .execute(&self.pool)
            .await
            .map_err(db_err("save counter failed"))?;
        Ok(())
    }

    async fn save_all(&self, state: &CounterState) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO dashboard_metrics (id, paircode, api, bot, cdn, updated_at)
            VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(id) DO UPDATE SET
                paircode = excluded.paircode,
                api = excluded.api,
                bot = excluded.bot,
                cdn = excluded.cdn,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(RECORD_ID)
        .bind(to_db(state.paircode)?)
        .bind(to_db(state.api)?)
        .bind(to_db(state.bot)?)
        .bind(to_db(state.cdn)?)
        .execute(&self.pool)
        .await
        .map_err(db_err("save all counters failed"))?;
        Ok(())
    }
}
