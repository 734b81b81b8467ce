use actix_web::{web, HttpResponse, Responder};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::capture::manager::CaptureManager;
use crate::models::transaction::{RawExchange, RawResponse, TransactionSummary};

/// Query parameters for listing transactions
#[derive(Deserialize)]
pub struct TransactionsQuery {
    /// Offset for pagination
    #[serde(default = "default_offset")]
    offset: usize,

    /// Limit for pagination
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_offset() -> usize { 0 }
fn default_limit() -> usize { 100 }

/// A captured exchange as posted by the proxy, with messages as text
#[derive(Deserialize)]
pub struct RecordRequest {
    pub method: String,
    pub url: Option<String>,

    /// Raw request text, headers then body
    pub request: String,

    #[serde(default)]
    pub request_body_offset: Option<usize>,

    #[serde(default)]
    pub response: Option<RecordResponse>,
}

/// Response half of a posted exchange
#[derive(Deserialize)]
pub struct RecordResponse {
    /// Raw response text, headers then body
    pub raw: String,

    #[serde(default)]
    pub body_offset: Option<usize>,

    #[serde(default)]
    pub status_code: u16,

    #[serde(default)]
    pub mime_type: Option<String>,
}

impl From<RecordRequest> for RawExchange {
    fn from(request: RecordRequest) -> Self {
        RawExchange {
            method: request.method,
            url: request.url,
            request: request.request.into_bytes(),
            request_body_offset: request.request_body_offset,
            response: request.response.map(|response| RawResponse {
                bytes: response.raw.into_bytes(),
                body_offset: response.body_offset,
                status_code: response.status_code,
                stated_mime_type: response.mime_type,
            }),
        }
    }
}

/// Store positions to act on
#[derive(Deserialize)]
pub struct IndicesRequest {
    pub indices: Vec<usize>,
}

/// Response for listing transactions
#[derive(Serialize)]
struct TransactionsResponse {
    transactions: Vec<TransactionSummary>,
    total: usize,
    store_size: usize,
    offset: usize,
    limit: usize,
}

/// Record a completed exchange
pub async fn record_transaction(
    capture_manager: web::Data<Arc<CaptureManager>>,
    request: web::Json<RecordRequest>,
) -> impl Responder {
    let index = capture_manager.record(request.into_inner().into());
    let id = capture_manager
        .store()
        .get(index)
        .map(|t| t.sequence_number)
        .unwrap_or_default();

    debug!("Recorded transaction #{} at index {}", id, index);

    HttpResponse::Created().json(serde_json::json!({
        "status": "success",
        "index": index,
        "id": id
    }))
}

/// Get the visible transactions
pub async fn get_transactions(
    capture_manager: web::Data<Arc<CaptureManager>>,
    query: web::Query<TransactionsQuery>,
) -> impl Responder {
    let (transactions, total) = capture_manager.visible_summaries(query.offset, query.limit);
    let store_size = capture_manager.store().len();

    debug!("Retrieved {} transactions (offset: {}, limit: {}, visible: {}, stored: {})",
         transactions.len(), query.offset, query.limit, total, store_size);

    HttpResponse::Ok().json(TransactionsResponse {
        transactions,
        total,
        store_size,
        offset: query.offset,
        limit: query.limit,
    })
}

/// Get a transaction by store position
pub async fn get_transaction(
    capture_manager: web::Data<Arc<CaptureManager>>,
    path: web::Path<usize>,
) -> impl Responder {
    let index = path.into_inner();

    match capture_manager.detail(index) {
        Some((transaction, details)) => HttpResponse::Ok().json(serde_json::json!({
            "index": index,
            "transaction": transaction,
            "details": details
        })),
        None => HttpResponse::NotFound().json(serde_json::json!({
            "status": "error",
            "message": format!("No transaction at index {}", index)
        })),
    }
}

/// Remove every transaction
pub async fn clear_transactions(
    capture_manager: web::Data<Arc<CaptureManager>>,
) -> impl Responder {
    let removed = capture_manager.clear();

    HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "removed": removed
    }))
}

/// Remove the transactions at the given store positions
pub async fn delete_transactions(
    capture_manager: web::Data<Arc<CaptureManager>>,
    request: web::Json<IndicesRequest>,
) -> impl Responder {
    if request.indices.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "status": "error",
            "message": "No entries selected."
        }));
    }

    let removed = capture_manager.delete(&request.indices);

    HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "removed": removed
    }))
}

/// Collapse duplicate transactions
pub async fn deduplicate_transactions(
    capture_manager: web::Data<Arc<CaptureManager>>,
) -> impl Responder {
    let removed = capture_manager.deduplicate();
    info!("Deduplication removed {} transaction(s)", removed);

    HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "removed": removed,
        "message": format!("Removed {} duplicate(s).", removed)
    }))
}

/// Get log statistics
pub async fn get_stats(
    capture_manager: web::Data<Arc<CaptureManager>>,
) -> impl Responder {
    HttpResponse::Ok().json(capture_manager.stats())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes;
    use crate::models::config::AppConfig;
    use actix_web::{test, App};
    use serde_json::{json, Value};

    fn state() -> web::Data<Arc<CaptureManager>> {
        web::Data::new(Arc::new(CaptureManager::new(AppConfig::default())))
    }

    fn exchange(method: &str, path: &str, status: u16, mime: &str, body: &str) -> Value {
        json!({
            "method": method,
            "url": format!("http://a.com{}", path),
            "request": format!("{} {} HTTP/1.1\r\nHost: a.com\r\n\r\n", method, path),
            "response": {
                "raw": format!("HTTP/1.1 {} X\r\nServer: t\r\n\r\n{}", status, body),
                "status_code": status,
                "mime_type": mime
            }
        })
    }

    #[actix_web::test]
    async fn test_record_list_and_delete() {
        let data = state();
        let app = test::init_service(App::new().app_data(data.clone()).configure(routes::configure)).await;

        for (path, status) in [("/a", 200), ("/b", 404), ("/a", 200)] {
            let req = test::TestRequest::post()
                .uri("/api/transactions")
                .set_json(exchange("GET", path, status, "HTML", "same"))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), 201);
        }

        let req = test::TestRequest::get().uri("/api/transactions?limit=2").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total"], 3);
        assert_eq!(body["transactions"].as_array().unwrap().len(), 2);
        assert_eq!(body["transactions"][1]["status"], 404);

        let req = test::TestRequest::post().uri("/api/transactions/dedupe").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["removed"], 1);

        let req = test::TestRequest::post()
            .uri("/api/transactions/delete")
            .set_json(json!({ "indices": [0, 9] }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["removed"], 1);
        assert_eq!(data.store().len(), 1);

        let req = test::TestRequest::get().uri("/api/transactions/0").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["transaction"]["url"], "http://a.com/a");
        assert!(body["details"].as_str().unwrap().starts_with("ENTRY #1 | GET"));

        let req = test::TestRequest::get().uri("/api/transactions/5").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);

        let req = test::TestRequest::delete().uri("/api/transactions").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["removed"], 1);
    }

    #[actix_web::test]
    async fn test_filter_endpoints() {
        let data = state();
        let app = test::init_service(App::new().app_data(data.clone()).configure(routes::configure)).await;

        for (path, status) in [("/x.png", 200), ("/y.json", 404)] {
            let req = test::TestRequest::post()
                .uri("/api/transactions")
                .set_json(exchange("GET", path, status, "JSON", ""))
                .to_request();
            test::call_service(&app, req).await;
        }

        let req = test::TestRequest::put()
            .uri("/api/filter")
            .set_json(json!({ "hide_extensions": "", "show_4xx": false }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "success");
        assert!(!data.filter().show_4xx);

        let req = test::TestRequest::get().uri("/api/stats").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total_entries"], 2);
        assert_eq!(body["visible_entries"], 1);

        let req = test::TestRequest::post()
            .uri("/api/filter/validate")
            .set_json(json!({ "search_term": "(", "use_regex": true }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);

        let req = test::TestRequest::post().uri("/api/filter/reset").to_request();
        test::call_service(&app, req).await;
        assert!(data.filter().show_4xx);
    }

    #[actix_web::test]
    async fn test_export_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let data = state();
        let app = test::init_service(App::new().app_data(data.clone()).configure(routes::configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/export")
            .set_json(json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);

        let req = test::TestRequest::post()
            .uri("/api/transactions")
            .set_json(exchange("GET", "/page", 200, "HTML", "<p/>"))
            .to_request();
        test::call_service(&app, req).await;

        let path = dir.path().join("out.txt");
        let req = test::TestRequest::post()
            .uri("/api/export")
            .set_json(json!({ "indices": [0], "path": path }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["entries"], 1);
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("ENTRY #1 | GET | http://a.com/page"));

        let req = test::TestRequest::post()
            .uri("/api/export")
            .set_json(json!({ "path": dir.path().join("missing/out.txt") }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 500);
    }
}
