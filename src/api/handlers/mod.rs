pub mod export;
pub mod filters;
pub mod transactions;

use actix_web::HttpResponse;

use crate::utils::error::AppError;

/// JSON error body with a status matching the error kind
pub(crate) fn error_response(error: &AppError) -> HttpResponse {
    let body = serde_json::json!({
        "status": "error",
        "message": error.to_string()
    });
    match error {
        AppError::InvalidRequest(_) | AppError::InvalidPattern(_) => HttpResponse::BadRequest().json(body),
        AppError::ExportError(_) => HttpResponse::InternalServerError().json(body),
    }
}
