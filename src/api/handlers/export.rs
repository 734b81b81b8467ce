use actix_web::{web, HttpResponse, Responder};
use log::error;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::api::handlers::error_response;
use crate::capture::manager::CaptureManager;

/// Request for exporting transactions
#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ExportRequest {
    /// Store positions to export; the visible set when absent
    pub indices: Option<Vec<usize>>,

    /// Destination file; a timestamped file in the export directory when absent
    pub path: Option<PathBuf>,
}

/// Export selected or visible transactions to a text file
pub async fn export_transactions(
    capture_manager: web::Data<Arc<CaptureManager>>,
    request: web::Json<ExportRequest>,
) -> impl Responder {
    let manager = capture_manager.get_ref().clone();
    let ExportRequest { indices, path } = request.into_inner();

    // File I/O runs off the async workers
    let result = web::block(move || match indices {
        Some(indices) => manager.export_selected(&indices, path),
        None => manager.export_visible(path),
    })
    .await;

    match result {
        Ok(Ok(report)) => HttpResponse::Ok().json(serde_json::json!({
            "status": "success",
            "message": format!("Exported {} entry(ies) to: {}", report.entries, report.path.display()),
            "path": report.path,
            "entries": report.entries,
            "bytes": report.bytes
        })),
        Ok(Err(e)) => error_response(&e),
        Err(e) => {
            error!("Export task failed: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "status": "error",
                "message": "Export task failed"
            }))
        }
    }
}
