use actix_web::{web, HttpResponse, Responder};
use serde_json::json;
use crate::api::handlers::{
    export::export_transactions,
    filters::{
        get_filter,
        update_filter,
        reset_filter,
        validate_filter,
    },
    transactions::{
        record_transaction,
        get_transactions,
        get_transaction,
        clear_transactions,
        delete_transactions,
        deduplicate_transactions,
        get_stats,
    },
};
use crate::api::websocket::ws_index;

/// Root endpoint to provide information about the API
async fn index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "name": "TrafficLog API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "HTTP transaction logger with filtering, deduplication and export",
        "endpoints": [
            {
                "path": "/api/transactions",
                "method": "POST",
                "description": "Record a captured request/response pair"
            },
            {
                "path": "/api/transactions",
                "method": "GET",
                "description": "List transactions passing the current filter"
            },
            {
                "path": "/api/transactions",
                "method": "DELETE",
                "description": "Clear the transaction log"
            },
            {
                "path": "/api/transactions/{index}",
                "method": "GET",
                "description": "Get a transaction and its formatted details"
            },
            {
                "path": "/api/transactions/delete",
                "method": "POST",
                "description": "Delete transactions by store index"
            },
            {
                "path": "/api/transactions/dedupe",
                "method": "POST",
                "description": "Remove duplicates, keeping the most recent"
            },
            {
                "path": "/api/filter",
                "method": "GET",
                "description": "Get the current filter"
            },
            {
                "path": "/api/filter",
                "method": "PUT",
                "description": "Apply a new filter"
            },
            {
                "path": "/api/filter/reset",
                "method": "POST",
                "description": "Restore the default filter"
            },
            {
                "path": "/api/filter/validate",
                "method": "POST",
                "description": "Check a filter without applying it"
            },
            {
                "path": "/api/stats",
                "method": "GET",
                "description": "Get log statistics and export size estimate"
            },
            {
                "path": "/api/export",
                "method": "POST",
                "description": "Export selected or visible transactions to a file"
            },
            {
                "path": "/api/ws",
                "method": "GET",
                "description": "WebSocket endpoint for real-time updates"
            }
        ]
    }))
}

/// Configure API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        // Root endpoint
        .route("/", web::get().to(index))
        .service(
            web::scope("/api")
                // WebSocket route for real-time updates
                .route("/ws", web::get().to(ws_index))

                // Transaction log
                .service(
                    web::scope("/transactions")
                        .route("", web::post().to(record_transaction))
                        .route("", web::get().to(get_transactions))
                        .route("", web::delete().to(clear_transactions))
                        .route("/delete", web::post().to(delete_transactions))
                        .route("/dedupe", web::post().to(deduplicate_transactions))
                        .route("/{index}", web::get().to(get_transaction))
                )
                // Filter state
                .service(
                    web::scope("/filter")
                        .route("", web::get().to(get_filter))
                        .route("", web::put().to(update_filter))
                        .route("/reset", web::post().to(reset_filter))
                        .route("/validate", web::post().to(validate_filter))
                )
                .route("/stats", web::get().to(get_stats))
                .route("/export", web::post().to(export_transactions))
        );
}
