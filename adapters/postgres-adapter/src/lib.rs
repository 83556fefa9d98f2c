//! PostgreSQL adapter implementing the expense and budget repository ports.
//!
//! - Connection settings come from `DB_HOST`, `DB_PORT`, `DB_USER`,
//!   `DB_PASSWORD`, `DB_NAME`, `SSL_MODE` and `DB_MAX_CONNECTIONS`.
//! - Schema changes are tracked in a `schema_migrations` table.
//!
//! Notes:
//! - The domain repository traits are synchronous. We bridge to the async sqlx
//!   pool using `block_on`, reusing the current Tokio runtime when there is one.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use domain::{CoreError, Logger};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};

mod budgets;
mod expenses;
mod migrations;

pub use budgets::PgBudgetRepo;
pub use expenses::PgExpenseRepo;

pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Connection settings for the PostgreSQL pool.
#[derive(Clone)]
pub struct PgSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: PgSslMode,
    pub max_connections: u32,
}

// The password never reaches logs or panic messages.
impl fmt::Debug for PgSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl PgSettings {
    /// Build from process environment variables.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. `DB_HOST`, `DB_USER` and `DB_NAME` are
    /// required; everything else has a default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| CoreError::Store(format!("missing {key}")))
        };

        let port = match lookup("DB_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| CoreError::Store(format!("invalid DB_PORT: {e}")))?,
            None => DEFAULT_PORT,
        };
        let ssl_mode = match lookup("SSL_MODE") {
            Some(raw) => parse_ssl_mode(&raw)?,
            None => PgSslMode::Prefer,
        };
        let max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    CoreError::Store("DB_MAX_CONNECTIONS must be a positive integer".into())
                })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            host: required("DB_HOST")?,
            port,
            user: required("DB_USER")?,
            password: lookup("DB_PASSWORD").unwrap_or_default(),
            database: required("DB_NAME")?,
            ssl_mode,
            max_connections,
        })
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
            .ssl_mode(self.ssl_mode)
    }
}

/// Accepts libpq spellings: disable, allow, prefer, require, verify-ca, verify-full.
pub fn parse_ssl_mode(raw: &str) -> Result<PgSslMode, CoreError> {
    PgSslMode::from_str(&raw.trim().to_ascii_lowercase())
        .map_err(|_| CoreError::Store(format!("unsupported SSL_MODE '{}'", raw.trim())))
}

/// Connection pool plus the runtime used to drive it from sync callers.
pub struct PgStore {
    pool: PgPool,
    // None when constructed inside an existing runtime (the api-server case)
    rt: Option<Arc<tokio::runtime::Runtime>>,
    log: Logger,
}

impl PgStore {
    /// Open a pool and apply pending migrations.
    pub fn connect(settings: &PgSettings, log: Logger) -> Result<Self, CoreError> {
        let target = format!("{}:{}/{}", settings.host, settings.port, settings.database);
        Self::connect_with(settings.connect_options(), settings.max_connections, &target, log)
    }

    /// Same as [`PgStore::connect`] for prebuilt options, e.g. parsed from a URL.
    /// `target` names the server in failure logs and must not carry credentials.
    pub fn connect_with(
        options: PgConnectOptions,
        max_connections: u32,
        target: &str,
        log: Logger,
    ) -> Result<Self, CoreError> {
        let rt = maybe_create_runtime()?;
        let pool = block_on_with_rt(
            &rt,
            PgPoolOptions::new()
                .max_connections(max_connections)
                .connect_with(options),
        )
        .map_err(|e| {
            log.error(&format!("connect to {target} failed: {e}"));
            map_pgerr(e)
        })?;

        let store = Self { pool, rt, log };
        let applied = store.block_on(migrations::apply_migrations(&store.pool))?;
        if applied > 0 {
            store.log.info(&format!("applied {applied} migration(s)"));
        }
        Ok(store)
    }

    pub fn from_env(log: Logger) -> Result<Self, CoreError> {
        let settings = PgSettings::from_env()?;
        Self::connect(&settings, log)
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub(crate) fn block_on<F: Future>(&self, fut: F) -> F::Output {
        block_on_with_rt(&self.rt, fut)
    }

    /// Log a driver failure and convert it into the domain error.
    pub(crate) fn fail(&self, what: &str, e: sqlx::Error) -> CoreError {
        if !matches!(e, sqlx::Error::RowNotFound) {
            self.log.error(&format!("{what} failed: {e}"));
        }
        map_pgerr(e)
    }
}

fn maybe_create_runtime() -> Result<Option<Arc<tokio::runtime::Runtime>>, CoreError> {
    if tokio::runtime::Handle::try_current().is_ok() {
        Ok(None)
    } else {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|e| CoreError::Store(format!("tokio runtime init: {e}")))?;
        Ok(Some(Arc::new(rt)))
    }
}

fn block_on_with_rt<F: Future>(rt: &Option<Arc<tokio::runtime::Runtime>>, fut: F) -> F::Output {
    match rt {
        Some(rt) => rt.block_on(fut),
        None => tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut)),
    }
}

pub(crate) fn map_pgerr(e: sqlx::Error) -> CoreError {
    match e {
        sqlx::Error::RowNotFound => CoreError::NotFound,
        other => CoreError::Store(format!("postgres error: {other}")),
    }
}

/// Repository windows are `usize`; Postgres LIMIT/OFFSET bind as BIGINT.
pub(crate) fn to_sql_int(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
