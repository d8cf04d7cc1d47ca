/// HTTP server setup and routing
use crate::{
    api::middleware::track_metrics,
    context::AppContext,
    error::{Envelope, MarketError, MarketResult},
    rate_limit::rate_limit_middleware,
};
use axum::{
    http::{header, Method, StatusCode},
    middleware,
    response::Json,
    Router,
};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Build the main application router
/// Returns Router<()> because state is already provided
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .merge(crate::api::routes())
        .fallback(not_found)
        .with_state(ctx.clone())
        .layer(middleware::from_fn_with_state(ctx, rate_limit_middleware))
        .layer(middleware::from_fn(track_metrics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<Envelope<String>>) {
    (
        StatusCode::NOT_FOUND,
        Json(Envelope::error("Endpoint not found!")),
    )
}

/// Bind the configured address and serve until Ctrl-C
pub async fn serve(ctx: AppContext) -> MarketResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| MarketError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    info!("Bazaar listening on {}", addr);
    info!("   Catalog items: {}", ctx.catalog.len());
    info!("   Service URL: {}", ctx.service_url());

    serve_with_shutdown(listener, ctx, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves
///
/// All sessions are dropped once the server has stopped accepting requests.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    ctx: AppContext,
    shutdown: F,
) -> MarketResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let sessions = ctx.sessions.clone();
    let app = build_router(ctx);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| MarketError::Internal(format!("Server error: {}", e)))?;

    let dropped = sessions.clear().await;
    info!(dropped, "server stopped, sessions cleared");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
