//! Shared HTTP utilities for the expense tracker workspace.
//!
//! Provides the structured error body and pagination parameter parsing used by
//! the api-server handlers. Framework-agnostic: nothing here depends on axum.

use std::fmt;

// ============================================================================
// JSON Response Helpers
// ============================================================================

/// Create a structured error JSON with a default message based on the code.
///
/// Returns: `{"error": {"code": "<code>", "message": "<default message>"}}`
pub fn json_err(code: &str) -> serde_json::Value {
    let message = match code {
        "not_found" => "Resource not found",
        "invalid_json" => "Request body is not valid JSON for this resource",
        "invalid_request" => "Invalid request",
        "timeout" => "Request timed out",
        "error" | "internal" => "Internal server error",
        _ => code, // Fallback to code as message for unknown codes
    };
    serde_json::json!({"error": {"code": code, "message": message}})
}

// ============================================================================
// Pagination
// ============================================================================

/// Largest accepted `limit` query value.
pub const MAX_LIMIT: i64 = 500;

/// Raw 1-based pagination inputs as accepted at the HTTP boundary.
///
/// `page` may still be zero or negative; the service clamps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: i64,
    pub limit: i64,
}

/// Why pagination parameters were rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageParamError {
    MissingPage,
    MissingLimit,
    InvalidPage,
    InvalidLimit,
    LimitOutOfRange,
}

impl fmt::Display for PageParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::MissingPage => "missing page parameter",
            Self::MissingLimit => "missing limit parameter",
            Self::InvalidPage => "page must be an integer",
            Self::InvalidLimit => "limit must be an integer",
            Self::LimitOutOfRange => "limit must be between 1 and 500",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for PageParamError {}

/// Parse `page` and `limit` query values.
///
/// Both are required integers; `limit` must be in `1..=500`.
pub fn parse_page_params(
    page: Option<&str>,
    limit: Option<&str>,
) -> Result<PageParams, PageParamError> {
    let page = page
        .ok_or(PageParamError::MissingPage)?
        .trim()
        .parse::<i64>()
        .map_err(|_| PageParamError::InvalidPage)?;
    let limit = limit
        .ok_or(PageParamError::MissingLimit)?
        .trim()
        .parse::<i64>()
        .map_err(|_| PageParamError::InvalidLimit)?;
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(PageParamError::LimitOutOfRange);
    }
    Ok(PageParams { page, limit })
}

/// Treat an empty or whitespace-only query value as absent.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
