//! HTTP error mapping.
//!
//! Clients only see a code and a generic message; the detail goes to the
//! handler's log sink.

use std::time::Duration;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domain::service::ServiceError;
use domain::{CoreError, Logger};
use http_common::PageParamError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("malformed request body: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Store(String),
    #[error("request exceeded {0:?}")]
    Timeout(Duration),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Decode(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode(_) => "invalid_json",
            Self::Validation(_) => "invalid_request",
            Self::NotFound(_) => "not_found",
            Self::Store(_) => "internal",
            Self::Timeout(_) => "timeout",
        }
    }

    /// Record the full error on the handler's sink and pass it on.
    ///
    /// Service failures were already logged by the service, so only the
    /// failures that originate at the HTTP layer are logged above debug.
    pub fn logged(self, log: &Logger) -> Self {
        match &self {
            Self::Decode(_) | Self::Validation(_) => log.warn(&self.to_string()),
            Self::Timeout(_) => log.error(&self.to_string()),
            Self::NotFound(_) | Self::Store(_) => log.debug(&self.to_string()),
        }
        self
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err.cause() {
            CoreError::Validation(msg) => Self::Validation(msg.clone()),
            CoreError::NotFound => Self::NotFound(err.to_string()),
            CoreError::Store(_) => Self::Store(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Decode(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PageParamError> for ApiError {
    fn from(err: PageParamError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(http_common::json_err(self.code()))).into_response()
    }
}

/// Run a blocking service call on the blocking pool, bounded by `limit`.
///
/// On timeout the task is abandoned; whatever the store was doing may still
/// complete in the background. A panicked call never reached the service's
/// own logging, so it is reported on `log` here.
pub async fn run_blocking<T, F>(limit: Duration, log: &Logger, call: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(call)).await {
        Err(_) => Err(ApiError::Timeout(limit)),
        Ok(Err(join)) => {
            let detail = format!("worker task failed: {join}");
            log.error(&detail);
            Err(ApiError::Store(detail))
        }
        Ok(Ok(result)) => result.map_err(ApiError::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::logging::MemorySink;
    use domain::{EntityKind, Operation};
    use std::sync::Arc;

    #[test]
    fn statuses_and_codes() {
        let cases = [
            (ApiError::Decode("x".into()), 400, "invalid_json"),
            (ApiError::Validation("x".into()), 400, "invalid_request"),
            (ApiError::NotFound("x".into()), 404, "not_found"),
            (ApiError::Store("x".into()), 500, "internal"),
            (ApiError::Timeout(Duration::from_secs(1)), 504, "timeout"),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status().as_u16(), status);
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn service_errors_are_classified() {
        let not_found = ServiceError::new(Operation::Get, EntityKind::Expense, CoreError::NotFound);
        assert!(matches!(ApiError::from(not_found), ApiError::NotFound(_)));

        let store = ServiceError::new(
            Operation::List,
            EntityKind::Budget,
            CoreError::Store("connection reset".into()),
        );
        match ApiError::from(store) {
            ApiError::Store(detail) => assert!(detail.contains("connection reset")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decode_failures_are_logged() {
        let sink = Arc::new(MemorySink::new());
        let log = Logger::new(sink.clone(), "test", "expense-handler");
        let _ = ApiError::Decode("expected value at line 1".into()).logged(&log);

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].message.contains("expected value"));
        assert_eq!(events[0].source, "expense-handler");
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let res: Result<(), ApiError> =
            run_blocking(Duration::from_millis(20), &Logger::null(), || {
                std::thread::sleep(Duration::from_millis(300));
                Ok(())
            })
            .await;
        assert!(matches!(res, Err(ApiError::Timeout(_))));
    }

    #[tokio::test]
    async fn panicked_calls_are_logged_as_errors() {
        let sink = Arc::new(MemorySink::new());
        let log = Logger::new(sink.clone(), "test", "budget-handler");
        let res: Result<(), ApiError> = run_blocking(Duration::from_secs(5), &log, || -> Result<(), ServiceError> {
            panic!("repository poisoned")
        })
        .await;

        let err = res.unwrap_err();
        assert_eq!(err.code(), "internal");
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, domain::Level::Error);
        assert!(events[0].message.contains("worker task failed"));
    }
}
