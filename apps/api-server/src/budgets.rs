//! `/budgets` handlers. Same surface as `/expenses`; dates travel as `YYYY-MM-DD`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use domain::{Budget, NewBudget};
use http_common::{non_empty, parse_page_params};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::docs::ErrorBody;
use crate::error::{run_blocking, ApiError};
use crate::{AppState, RecordQuery};

#[derive(Deserialize, ToSchema)]
pub struct CreateBudgetReq {
    #[serde(default)]
    description: String,
    amount: f64,
    /// `YYYY-MM-DD`
    start_date: NaiveDate,
    /// `YYYY-MM-DD`, not before `start_date`
    end_date: NaiveDate,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateBudgetReq {
    #[serde(default)]
    id: String,
    #[serde(default)]
    description: String,
    amount: f64,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

#[derive(Serialize, ToSchema)]
pub struct BudgetOut {
    id: String,
    description: String,
    amount: f64,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

impl From<Budget> for BudgetOut {
    fn from(b: Budget) -> Self {
        Self {
            id: b.id,
            description: b.description,
            amount: b.amount,
            start_date: b.start_date,
            end_date: b.end_date,
        }
    }
}

#[utoipa::path(
    post,
    path = "/budgets",
    tag = "budgets",
    request_body = CreateBudgetReq,
    responses(
        (status = 201, description = "Budget created", body = BudgetOut),
        (status = 400, description = "Body is not valid JSON for this resource, or fails validation", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody),
        (status = 504, description = "Store call exceeded the request timeout", body = ErrorBody),
    )
)]
pub async fn create_budget(
    State(state): State<AppState>,
    body: Result<Json<CreateBudgetReq>, JsonRejection>,
) -> Result<(StatusCode, Json<BudgetOut>), ApiError> {
    let log = &state.budget_log;
    let Json(req) = body.map_err(|e| ApiError::from(e).logged(log))?;
    let input = NewBudget {
        description: req.description,
        amount: req.amount,
        start_date: req.start_date,
        end_date: req.end_date,
    };

    let svc = state.budgets.clone();
    let created = run_blocking(state.request_timeout, log, move || svc.create(input))
        .await
        .map_err(|e| e.logged(log))?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

#[utoipa::path(
    get,
    path = "/budgets/{id}",
    tag = "budgets",
    params(("id" = String, Path, description = "Budget id")),
    responses(
        (status = 200, description = "The budget", body = BudgetOut),
        (status = 404, description = "No record with this id", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody),
        (status = 504, description = "Store call exceeded the request timeout", body = ErrorBody),
    )
)]
pub async fn get_budget(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BudgetOut>, ApiError> {
    fetch(&state, id).await.map(Json)
}

#[utoipa::path(
    get,
    path = "/budgets",
    tag = "budgets",
    params(RecordQuery),
    responses(
        (status = 200, description = "The budget named by `id`, otherwise one page of budgets", body = [BudgetOut]),
        (status = 400, description = "Missing or invalid `page`/`limit`", body = ErrorBody),
        (status = 404, description = "No record with this id", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody),
        (status = 504, description = "Store call exceeded the request timeout", body = ErrorBody),
    )
)]
pub async fn query_budgets(
    State(state): State<AppState>,
    query: Result<Query<RecordQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let log = &state.budget_log;
    let Query(q) = query.map_err(|e| ApiError::from(e).logged(log))?;

    if let Some(id) = non_empty(q.id.as_deref()) {
        return Ok(Json(fetch(&state, id.to_string()).await?).into_response());
    }

    let params = parse_page_params(q.page.as_deref(), q.limit.as_deref())
        .map_err(|e| ApiError::from(e).logged(log))?;
    let svc = state.budgets.clone();
    let rows = run_blocking(state.request_timeout, log, move || {
        svc.list(params.page, params.limit)
    })
    .await
    .map_err(|e| e.logged(log))?;
    Ok(Json(rows.into_iter().map(BudgetOut::from).collect::<Vec<_>>()).into_response())
}

#[utoipa::path(
    put,
    path = "/budgets",
    tag = "budgets",
    request_body = UpdateBudgetReq,
    responses(
        (status = 200, description = "The stored budget", body = BudgetOut),
        (status = 400, description = "Body is not valid JSON for this resource, or fails validation", body = ErrorBody),
        (status = 404, description = "No record with this id", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody),
        (status = 504, description = "Store call exceeded the request timeout", body = ErrorBody),
    )
)]
pub async fn update_budget(
    State(state): State<AppState>,
    body: Result<Json<UpdateBudgetReq>, JsonRejection>,
) -> Result<Json<BudgetOut>, ApiError> {
    let log = &state.budget_log;
    let Json(req) = body.map_err(|e| ApiError::from(e).logged(log))?;
    let budget = Budget {
        id: req.id,
        description: req.description,
        amount: req.amount,
        start_date: req.start_date,
        end_date: req.end_date,
    };

    let svc = state.budgets.clone();
    let stored = run_blocking(state.request_timeout, log, move || svc.update(budget))
        .await
        .map_err(|e| e.logged(log))?;
    Ok(Json(stored.into()))
}

#[utoipa::path(
    delete,
    path = "/budgets/{id}",
    tag = "budgets",
    params(("id" = String, Path, description = "Budget id")),
    responses(
        (status = 200, description = "Budget deleted"),
        (status = 404, description = "No record with this id", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody),
        (status = 504, description = "Store call exceeded the request timeout", body = ErrorBody),
    )
)]
pub async fn delete_budget(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    remove(&state, id).await
}

#[utoipa::path(
    delete,
    path = "/budgets",
    tag = "budgets",
    params(("id" = Option<String>, Query, description = "Budget id")),
    responses(
        (status = 200, description = "Budget deleted"),
        (status = 400, description = "Missing id", body = ErrorBody),
        (status = 404, description = "No record with this id", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody),
        (status = 504, description = "Store call exceeded the request timeout", body = ErrorBody),
    )
)]
pub async fn delete_budget_by_query(
    State(state): State<AppState>,
    query: Result<Query<RecordQuery>, QueryRejection>,
) -> Result<StatusCode, ApiError> {
    let Query(q) = query.map_err(|e| ApiError::from(e).logged(&state.budget_log))?;
    let id = non_empty(q.id.as_deref()).unwrap_or_default().to_string();
    remove(&state, id).await
}

async fn fetch(state: &AppState, id: String) -> Result<BudgetOut, ApiError> {
    let log = &state.budget_log;
    let svc = state.budgets.clone();
    run_blocking(state.request_timeout, log, move || svc.get(&id))
        .await
        .map(BudgetOut::from)
        .map_err(|e| e.logged(log))
}

async fn remove(state: &AppState, id: String) -> Result<StatusCode, ApiError> {
    let log = &state.budget_log;
    let svc = state.budgets.clone();
    run_blocking(state.request_timeout, log, move || svc.delete(&id))
        .await
        .map_err(|e| e.logged(log))?;
    Ok(StatusCode::OK)
}
