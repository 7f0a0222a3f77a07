use crate::error::ApiError;
use actix_web::{HttpRequest, HttpResponse, Responder};
use serde_json::json;

// resource names registered by the router
pub const EMPLOYEES: &str = "employee-list";
pub const ATTENDANCE: &str = "attendance-list";

/// API root, links to every resource collection
#[utoipa::path(
    get,
    path = "/api",
    responses(
        (status = 200, description = "Collection URLs", body = Object, example = json!({
            "employees": "http://127.0.0.1:8000/api/employees",
            "attendance": "http://127.0.0.1:8000/api/attendance"
        }))
    ),
    tag = "Root"
)]
pub async fn api_root(req: HttpRequest) -> Result<impl Responder, ApiError> {
    let url = |name: &str| {
        req.url_for_static(name).map_err(|e| {
            tracing::error!(error = ?e, name, "Failed to build resource url");
            ApiError::Internal
        })
    };

    let employees = url(EMPLOYEES)?.to_string();
    let attendance = url(ATTENDANCE)?.to_string();

    Ok(HttpResponse::Ok().json(json!({
        "employees": employees,
        "attendance": attendance,
    })))
}
