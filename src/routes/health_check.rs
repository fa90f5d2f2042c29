use actix_web::HttpResponse;

/// GET /health_check
///
/// Liveness only; does not touch the user store.
pub async fn health_check() -> HttpResponse {
    tracing::debug!("Health check endpoint called");
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}
