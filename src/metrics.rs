/// Prometheus metrics for the Bazaar server
///
/// Everything is registered in the default registry and exposed by the
/// `/metrics` endpoint.

use crate::error::{MarketError, MarketResult};
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // ========== Session Metrics ==========

    /// Sessions currently open
    pub static ref SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "bazaar_sessions_active",
        "Number of live sessions"
    )
    .unwrap();

    /// Login attempts by outcome
    pub static ref LOGINS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "bazaar_logins_total",
        "Total number of login attempts",
        &["outcome"]
    )
    .unwrap();

    /// Accounts created on first login
    pub static ref ACCOUNT_CREATIONS_TOTAL: IntCounter = register_int_counter!(
        "bazaar_account_creations_total",
        "Total number of accounts created"
    )
    .unwrap();

    // ========== Trading Metrics ==========

    /// Trades by kind and outcome
    pub static ref TRADES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "bazaar_trades_total",
        "Total number of buy and sell attempts",
        &["kind", "outcome"]
    )
    .unwrap();

    // ========== HTTP Metrics ==========

    /// Request latency by route and status
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "bazaar_http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["path", "status"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .unwrap();
}

/// Outcome label for a fallible operation
pub fn outcome_label<T>(result: &MarketResult<T>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(MarketError::InvalidNickname) => "invalid_nickname",
        Err(MarketError::UnknownItem) => "unknown_item",
        Err(MarketError::AlreadyOwned) => "already_owned",
        Err(MarketError::SessionAlreadyActive) => "session_active",
        Err(MarketError::NotOwned) => "not_owned",
        Err(MarketError::InsufficientCredits) => "insufficient_credits",
        Err(MarketError::Timeout(_)) => "timeout",
        Err(_) => "error",
    }
}

pub fn record_login(outcome: &str) {
    LOGINS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_account_created() {
    ACCOUNT_CREATIONS_TOTAL.inc();
}

pub fn record_trade(kind: &str, outcome: &str) {
    TRADES_TOTAL.with_label_values(&[kind, outcome]).inc();
}

pub fn record_http_request(path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[path, &status.to_string()])
        .observe(duration_secs);
}

/// Render all registered metrics in the Prometheus text format
pub fn render_metrics() -> MarketResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| MarketError::Internal(format!("Failed to encode metrics: {}", e)))?;

    String::from_utf8(buffer)
        .map_err(|e| MarketError::Internal(format!("Metrics are not valid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_trade() {
        record_trade("buy", "success");
        record_trade("sell", "not_owned");
        let metrics = render_metrics().unwrap();
        assert!(metrics.contains("bazaar_trades_total"));
        assert!(metrics.contains("not_owned"));
    }

    #[test]
    fn test_record_login() {
        record_login("success");
        record_account_created();
        let metrics = render_metrics().unwrap();
        assert!(metrics.contains("bazaar_logins_total"));
        assert!(metrics.contains("bazaar_account_creations_total"));
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome_label(&Ok::<(), MarketError>(())), "success");
        assert_eq!(
            outcome_label::<()>(&Err(MarketError::InsufficientCredits)),
            "insufficient_credits"
        );
        assert_eq!(
            outcome_label::<()>(&Err(MarketError::Internal("x".to_string()))),
            "error"
        );
    }

    #[test]
    fn test_http_histogram() {
        record_http_request("/buy_item", 200, 0.01);
        let metrics = render_metrics().unwrap();
        assert!(metrics.contains("bazaar_http_request_duration_seconds"));
    }
}
