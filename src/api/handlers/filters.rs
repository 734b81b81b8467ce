use actix_web::{web, HttpResponse, Responder};
use log::warn;
use std::sync::Arc;

use crate::api::handlers::error_response;
use crate::capture::filter;
use crate::capture::manager::CaptureManager;
use crate::models::filter::FilterConfig;

/// Get the committed filter
pub async fn get_filter(
    capture_manager: web::Data<Arc<CaptureManager>>,
) -> impl Responder {
    HttpResponse::Ok().json(capture_manager.filter().as_ref())
}

/// Commit a new filter. Fields left out of the body take their defaults.
pub async fn update_filter(
    capture_manager: web::Data<Arc<CaptureManager>>,
    request: web::Json<FilterConfig>,
) -> impl Responder {
    let config = request.into_inner();

    // An invalid pattern is still committed; it just hides nothing
    let warning = filter::validate(&config).err().map(|e| {
        warn!("Committing filter with {}", e);
        e.to_string()
    });
    let summary = config.summary();
    capture_manager.commit_filter(config);

    HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "summary": summary,
        "warning": warning
    }))
}

/// Restore the default filter
pub async fn reset_filter(
    capture_manager: web::Data<Arc<CaptureManager>>,
) -> impl Responder {
    capture_manager.reset_filter();

    HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "filter": FilterConfig::default()
    }))
}

/// Check a filter without committing it
pub async fn validate_filter(request: web::Json<FilterConfig>) -> impl Responder {
    match filter::validate(&request) {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "status": "success",
            "summary": request.summary()
        })),
        Err(e) => error_response(&e),
    }
}
