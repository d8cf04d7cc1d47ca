/// Request instrumentation
use crate::metrics;
use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Record latency and status of every request under its route template
pub async fn track_metrics(request: Request, next: Next) -> Response {
    // Unmatched paths are folded together to keep label cardinality bounded
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_string());

    let start = Instant::now();
    let response = next.run(request).await;

    metrics::record_http_request(
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}
