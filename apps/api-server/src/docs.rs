//! OpenAPI document for the expense and budget routes.
//!
//! Served raw at `/swagger.json` and rendered with Redoc at `/docs`.

use axum::{routing::get, Json, Router};
use utoipa::{OpenApi, ToSchema};
use utoipa_redoc::{Redoc, Servable};

use crate::{budgets, expenses, AppState};

/// Body of every non-2xx response.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ErrorBody {
    error: ErrorDetail,
}

#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ErrorDetail {
    /// One of `invalid_json`, `invalid_request`, `not_found`, `internal`, `timeout`
    #[schema(example = "not_found")]
    code: String,
    /// Generic text for the code; never carries store or decoder detail
    #[schema(example = "Resource not found")]
    message: String,
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Expense tracker API"),
    paths(
        expenses::create_expense,
        expenses::get_expense,
        expenses::query_expenses,
        expenses::update_expense,
        expenses::delete_expense,
        expenses::delete_expense_by_query,
        budgets::create_budget,
        budgets::get_budget,
        budgets::query_budgets,
        budgets::update_budget,
        budgets::delete_budget,
        budgets::delete_budget_by_query,
    ),
    components(schemas(
        expenses::CreateExpenseReq,
        expenses::UpdateExpenseReq,
        expenses::ExpenseOut,
        budgets::CreateBudgetReq,
        budgets::UpdateBudgetReq,
        budgets::BudgetOut,
        ErrorBody,
        ErrorDetail,
    )),
    tags(
        (name = "expenses", description = "Individual spending records"),
        (name = "budgets", description = "Spending limits over a date range"),
    )
)]
pub struct ApiDoc;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/swagger.json", get(openapi_json))
        .merge(Redoc::with_url("/docs", ApiDoc::openapi()))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
