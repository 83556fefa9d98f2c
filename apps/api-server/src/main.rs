//! api-server: HTTP API for the expense tracker workspace.
//!
//! Provides CRUD endpoints for expenses and budgets:
//! - Storage: SQLite (default), in-memory, or PostgreSQL when the `postgres`
//!   feature is enabled.
//! - Logging: every handler, service and store gets a `Logger` whose sink
//!   forwards to `tracing`, tagged with `LOG_GROUP` and the component name.
//! - CORS: Configurable via CORS_ALLOW_ORIGIN (origin string) for browser clients.
//! - Docs: OpenAPI document at `/swagger.json`, rendered by Redoc at `/docs`.
//!
//! Run:
//! ```bash
//! # pretty logs (default); PORT optional
//! cargo run -p api-server
//!
//! # with the PostgreSQL adapter enabled (requires DB_* env vars)
//! STORAGE_PROVIDER=postgres DB_HOST=localhost DB_USER=app DB_NAME=expenses \
//!   cargo run -p api-server --features postgres
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.

mod budgets;
mod config;
mod docs;
mod error;
mod expenses;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use axum::{routing::get, Router};
use domain::adapters::memory_repo::InMemoryRepo;
use domain::id::{format_id, IdGenerator};
use domain::service::{BudgetService, ExpenseService};
use domain::{
    BudgetRepository, Clock, CoreError, EntityKind, ExpenseRepository, Level, LogSink, Logger,
};
use serde::Deserialize;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use utoipa::IntoParams;
use uuid::Uuid;

use config::{Config, StorageProvider};

type ExpenseSvc = ExpenseService<Arc<dyn ExpenseRepository>, RandomIds, SystemClock>;
type BudgetSvc = BudgetService<Arc<dyn BudgetRepository>, RandomIds>;

#[derive(Clone)]
pub struct AppState {
    pub expenses: Arc<ExpenseSvc>,
    pub budgets: Arc<BudgetSvc>,
    pub request_timeout: Duration,
    pub expense_log: Logger,
    pub budget_log: Logger,
}

impl AppState {
    fn new(backend: Backend, log: &Logger, request_timeout: Duration) -> Self {
        let expenses = ExpenseService::new(
            backend.expenses,
            RandomIds,
            SystemClock,
            log.for_source("expense-service"),
        );
        let budgets = BudgetService::new(backend.budgets, RandomIds, log.for_source("budget-service"));
        Self {
            expenses: Arc::new(expenses),
            budgets: Arc::new(budgets),
            request_timeout,
            expense_log: log.for_source("expense-handler"),
            budget_log: log.for_source("budget-handler"),
        }
    }
}

/// Query string shared by the collection routes: `?id=` or `?page=&limit=`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecordQuery {
    /// Fetch this one record instead of a page
    pub id: Option<String>,
    /// 1-based page number, required when listing
    pub page: Option<String>,
    /// Page size in `1..=500`, required when listing
    pub limit: Option<String>,
}

/// Repositories for both record kinds, type-erased over the storage provider.
struct Backend {
    expenses: Arc<dyn ExpenseRepository>,
    budgets: Arc<dyn BudgetRepository>,
}

impl Backend {
    fn memory() -> Self {
        let repo = Arc::new(InMemoryRepo::new());
        Self {
            expenses: repo.clone(),
            budgets: repo,
        }
    }

    #[cfg(feature = "sqlite")]
    fn sqlite(cfg: &Config, log: Logger) -> Result<Self, CoreError> {
        use sqlite_adapter::{SqliteBudgetRepo, SqliteExpenseRepo, SqliteStore};

        let store = Arc::new(SqliteStore::open(&cfg.db_path, log)?);
        Ok(Self {
            expenses: Arc::new(SqliteExpenseRepo::new(store.clone())),
            budgets: Arc::new(SqliteBudgetRepo::new(store)),
        })
    }

    #[cfg(feature = "postgres")]
    fn postgres(log: Logger) -> Result<Self, CoreError> {
        use postgres_adapter::{PgBudgetRepo, PgExpenseRepo, PgStore};

        let store = Arc::new(PgStore::from_env(log)?);
        Ok(Self {
            expenses: Arc::new(PgExpenseRepo::new(store.clone())),
            budgets: Arc::new(PgBudgetRepo::new(store)),
        })
    }
}

// Construct the repositories based on config and feature flags.
fn build_backend(cfg: &Config, log: &Logger) -> Result<Backend, CoreError> {
    match cfg.storage_provider {
        StorageProvider::Memory => Ok(Backend::memory()),
        #[cfg(feature = "sqlite")]
        StorageProvider::Sqlite => Backend::sqlite(cfg, log.for_source("sqlite-store")),
        #[cfg(feature = "postgres")]
        StorageProvider::Postgres => Backend::postgres(log.for_source("postgres-store")),
        #[allow(unreachable_patterns)]
        other => Err(CoreError::Store(format!(
            "STORAGE_PROVIDER={other} requires building api-server with the `{other}` feature"
        ))),
    }
}

/// Log sink that forwards events to `tracing` with `group` and `source` fields.
struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, group: &str, source: &str, message: &str) {
        match level {
            Level::Debug => tracing::debug!(group, source, "{message}"),
            Level::Info => tracing::info!(group, source, "{message}"),
            Level::Warn => tracing::warn!(group, source, "{message}"),
            Level::Error => tracing::error!(group, source, "{message}"),
        }
    }
}

/// `<kind>_<decimal digits of a random UUID v4>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&self, kind: EntityKind) -> String {
        format_id(kind, Uuid::new_v4().as_u128())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> std::time::SystemTime {
        std::time::SystemTime::now()
    }
}

#[tokio::main]
async fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&cfg);
    cfg.warn_if_insecure();
    info!("{}", domain::about());

    let log = Logger::new(Arc::new(TracingSink), cfg.log_group.clone(), "api-server");
    let backend = match build_backend(&cfg, &log) {
        Ok(b) => b,
        Err(e) => {
            error!(err = %e, provider = %cfg.storage_provider, "storage init failed");
            std::process::exit(1);
        }
    };
    info!(provider = %cfg.storage_provider, "storage ready");

    let state = AppState::new(backend, &log, cfg.request_timeout);
    let app = build_app(state, cfg.cors_allow_origin.clone());

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(%addr, err = %e, "bind failed");
            std::process::exit(1);
        }
    };
    info!(%addr, "api-server listening");
    if let Err(e) = axum::serve(listener, app).await {
        error!(err = %e, "server error");
        std::process::exit(1);
    }
}

fn init_tracing(cfg: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
    }
}

fn routes() -> Router<AppState> {
    use axum::routing::post;

    Router::new()
        .route("/", get(hello))
        .route(
            "/expenses",
            post(expenses::create_expense)
                .get(expenses::query_expenses)
                .put(expenses::update_expense)
                .delete(expenses::delete_expense_by_query),
        )
        .route(
            "/expenses/:id",
            get(expenses::get_expense).delete(expenses::delete_expense),
        )
        .route(
            "/budgets",
            post(budgets::create_budget)
                .get(budgets::query_budgets)
                .put(budgets::update_budget)
                .delete(budgets::delete_budget_by_query),
        )
        .route(
            "/budgets/:id",
            get(budgets::get_budget).delete(budgets::delete_budget),
        )
        .merge(docs::routes())
}

fn build_app(state: AppState, cors_allow_origin: HeaderValue) -> Router {
    // Request ID header name
    let x_request_id = axum::http::HeaderName::from_static("x-request-id");

    let app = routes()
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .with_state(state);

    // CORS - already validated in Config::from_env()
    let cors = if cors_allow_origin == HeaderValue::from_static("*") {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list([cors_allow_origin]))
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PUT,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    };
    app.layer(cors)
}

async fn hello() -> &'static str {
    "expense tracker is running"
}
