/// API routes and handlers
pub mod health;
pub mod market;
pub mod middleware;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(market::routes())
        .merge(health::routes())
}
