//! `/expenses` handlers.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domain::{Expense, NewExpense};
use http_common::{non_empty, parse_page_params};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::docs::ErrorBody;
use crate::error::{run_blocking, ApiError};
use crate::{AppState, RecordQuery};

#[derive(Deserialize, ToSchema)]
pub struct CreateExpenseReq {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    amount: f64,
    #[serde(default)]
    currency: String,
}

/// Full replacement of the mutable fields. `date_creation`, if sent, is ignored.
#[derive(Deserialize, ToSchema)]
pub struct UpdateExpenseReq {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    amount: f64,
    #[serde(default)]
    currency: String,
}

#[derive(Serialize, ToSchema)]
pub struct ExpenseOut {
    id: String,
    name: String,
    description: String,
    amount: f64,
    currency: String,
    /// Unix seconds, set once at creation
    date_creation: i64,
}

impl From<Expense> for ExpenseOut {
    fn from(e: Expense) -> Self {
        Self {
            id: e.id,
            name: e.name,
            description: e.description,
            amount: e.amount,
            currency: e.currency,
            date_creation: e.date_creation,
        }
    }
}

#[utoipa::path(
    post,
    path = "/expenses",
    tag = "expenses",
    request_body = CreateExpenseReq,
    responses(
        (status = 201, description = "Expense created", body = ExpenseOut),
        (status = 400, description = "Body is not valid JSON for this resource, or fails validation", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody),
        (status = 504, description = "Store call exceeded the request timeout", body = ErrorBody),
    )
)]
pub async fn create_expense(
    State(state): State<AppState>,
    body: Result<Json<CreateExpenseReq>, JsonRejection>,
) -> Result<(StatusCode, Json<ExpenseOut>), ApiError> {
    let log = &state.expense_log;
    let Json(req) = body.map_err(|e| ApiError::from(e).logged(log))?;
    let input = NewExpense {
        name: req.name,
        description: req.description,
        amount: req.amount,
        currency: req.currency,
    };

    let svc = state.expenses.clone();
    let created = run_blocking(state.request_timeout, log, move || svc.create(input))
        .await
        .map_err(|e| e.logged(log))?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

#[utoipa::path(
    get,
    path = "/expenses/{id}",
    tag = "expenses",
    params(("id" = String, Path, description = "Expense id")),
    responses(
        (status = 200, description = "The expense", body = ExpenseOut),
        (status = 404, description = "No record with this id", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody),
        (status = 504, description = "Store call exceeded the request timeout", body = ErrorBody),
    )
)]
pub async fn get_expense(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ExpenseOut>, ApiError> {
    fetch(&state, id).await.map(Json)
}

/// `GET /expenses?id=` fetches one record; `GET /expenses?page=&limit=` lists.
#[utoipa::path(
    get,
    path = "/expenses",
    tag = "expenses",
    params(RecordQuery),
    responses(
        (status = 200, description = "The expense named by `id`, otherwise one page of expenses", body = [ExpenseOut]),
        (status = 400, description = "Missing or invalid `page`/`limit`", body = ErrorBody),
        (status = 404, description = "No record with this id", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody),
        (status = 504, description = "Store call exceeded the request timeout", body = ErrorBody),
    )
)]
pub async fn query_expenses(
    State(state): State<AppState>,
    query: Result<Query<RecordQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let log = &state.expense_log;
    let Query(q) = query.map_err(|e| ApiError::from(e).logged(log))?;

    if let Some(id) = non_empty(q.id.as_deref()) {
        let found = fetch(&state, id.to_string()).await?;
        return Ok(Json(found).into_response());
    }

    let params = parse_page_params(q.page.as_deref(), q.limit.as_deref())
        .map_err(|e| ApiError::from(e).logged(log))?;
    let svc = state.expenses.clone();
    let rows = run_blocking(state.request_timeout, log, move || {
        svc.list(params.page, params.limit)
    })
    .await
    .map_err(|e| e.logged(log))?;
    let out: Vec<ExpenseOut> = rows.into_iter().map(Into::into).collect();
    Ok(Json(out).into_response())
}

#[utoipa::path(
    put,
    path = "/expenses",
    tag = "expenses",
    request_body = UpdateExpenseReq,
    responses(
        (status = 200, description = "The stored expense", body = ExpenseOut),
        (status = 400, description = "Body is not valid JSON for this resource, or fails validation", body = ErrorBody),
        (status = 404, description = "No record with this id", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody),
        (status = 504, description = "Store call exceeded the request timeout", body = ErrorBody),
    )
)]
pub async fn update_expense(
    State(state): State<AppState>,
    body: Result<Json<UpdateExpenseReq>, JsonRejection>,
) -> Result<Json<ExpenseOut>, ApiError> {
    let log = &state.expense_log;
    let Json(req) = body.map_err(|e| ApiError::from(e).logged(log))?;
    let expense = Expense {
        id: req.id,
        name: req.name,
        description: req.description,
        amount: req.amount,
        currency: req.currency,
        // Never written; the stored value comes back from the update.
        date_creation: 0,
    };

    let svc = state.expenses.clone();
    let stored = run_blocking(state.request_timeout, log, move || svc.update(expense))
        .await
        .map_err(|e| e.logged(log))?;
    Ok(Json(stored.into()))
}

#[utoipa::path(
    delete,
    path = "/expenses/{id}",
    tag = "expenses",
    params(("id" = String, Path, description = "Expense id")),
    responses(
        (status = 200, description = "Expense deleted"),
        (status = 404, description = "No record with this id", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody),
        (status = 504, description = "Store call exceeded the request timeout", body = ErrorBody),
    )
)]
pub async fn delete_expense(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    remove(&state, id).await
}

/// `DELETE /expenses?id=`
#[utoipa::path(
    delete,
    path = "/expenses",
    tag = "expenses",
    params(("id" = Option<String>, Query, description = "Expense id")),
    responses(
        (status = 200, description = "Expense deleted"),
        (status = 400, description = "Missing id", body = ErrorBody),
        (status = 404, description = "No record with this id", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody),
        (status = 504, description = "Store call exceeded the request timeout", body = ErrorBody),
    )
)]
pub async fn delete_expense_by_query(
    State(state): State<AppState>,
    query: Result<Query<RecordQuery>, QueryRejection>,
) -> Result<StatusCode, ApiError> {
    let Query(q) = query.map_err(|e| ApiError::from(e).logged(&state.expense_log))?;
    // An absent id reaches the service as "" and is rejected there.
    let id = non_empty(q.id.as_deref()).unwrap_or_default().to_string();
    remove(&state, id).await
}

async fn fetch(state: &AppState, id: String) -> Result<ExpenseOut, ApiError> {
    let log = &state.expense_log;
    let svc = state.expenses.clone();
    let found = run_blocking(state.request_timeout, log, move || svc.get(&id))
        .await
        .map_err(|e| e.logged(log))?;
    Ok(found.into())
}

async fn remove(state: &AppState, id: String) -> Result<StatusCode, ApiError> {
    let log = &state.expense_log;
    let svc = state.expenses.clone();
    run_blocking(state.request_timeout, log, move || svc.delete(&id))
        .await
        .map_err(|e| e.logged(log))?;
    Ok(StatusCode::OK)
}
