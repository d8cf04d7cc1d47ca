/// Operational endpoints: health check and Prometheus scrape
use crate::{
    context::AppContext,
    db,
    error::{Envelope, MarketResult},
    metrics,
};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};

/// Health status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    /// Live sessions at the time of the check
    pub sessions: usize,
    pub catalog_items: usize,
}

/// Build operational routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
}

/// Returns 200 after a database round-trip, 503 otherwise
pub async fn health(State(ctx): State<AppContext>) -> Response {
    if let Err(e) = db::test_connection(&ctx.db).await {
        tracing::warn!(error = %e, "health check failed: database unreachable");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(Envelope::error("Database unavailable")),
        )
            .into_response();
    }

    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sessions: ctx.sessions.active_count().await,
        catalog_items: ctx.catalog.len(),
    })
    .into_response()
}

pub async fn metrics_text() -> MarketResult<Response> {
    let body = metrics::render_metrics()?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_serialization() {
        let status = HealthStatus {
            status: "ok".to_string(),
            version: "0.1.0".to_string(),
            sessions: 2,
            catalog_items: 10,
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["sessions"], 2);
        assert_eq!(json["catalog_items"], 10);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_renders() {
        metrics::record_login("success");
        let response = metrics_text().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
