/// End-to-end tests for the marketplace HTTP API
///
/// Each test runs against its own database and catalog in a temporary
/// directory. Client tests talk to a real server on an ephemeral port; router
/// tests call the axum router directly.
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use bazaar::{
    catalog::ItemId,
    client::{ClientError, MarketClient},
    config::{ClientConfig, ServerConfig},
    context::AppContext,
    server,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_test::{assert_err, assert_ok};
use tower::ServiceExt;

const CATALOG: &str = r#"{
    "1": {"name": "Rusty Sword", "type": "weapon", "price": 100},
    "2": {"name": "Dragon Plate", "type": "armor", "price": 1500},
    "3": {"name": "Lantern", "type": "misc", "price": 400}
}"#;

const BONUS: i64 = 1000;

async fn test_context(configure: impl FnOnce(&mut ServerConfig)) -> (TempDir, AppContext) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("all_items.json"), CATALOG).unwrap();

    let mut config = ServerConfig::with_data_directory(dir.path());
    config.credits.range_begin = BONUS;
    config.credits.range_end = BONUS;
    configure(&mut config);

    let ctx = AppContext::new(config).await.unwrap();
    (dir, ctx)
}

struct RunningServer {
    _dir: TempDir,
    ctx: AppContext,
    url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<bazaar::error::MarketResult<()>>,
}

impl RunningServer {
    async fn start() -> Self {
        let (dir, ctx) = test_context(|_| {}).await;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server::serve_with_shutdown(listener, ctx.clone(), async {
            let _ = rx.await;
        }));

        Self {
            _dir: dir,
            ctx,
            url,
            shutdown: Some(tx),
            handle,
        }
    }

    fn client(&self) -> MarketClient {
        MarketClient::new(&ClientConfig {
            server_url: self.url.clone(),
            timeout_secs: 3,
        })
        .unwrap()
    }

    async fn stop(mut self) -> AppContext {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.unwrap().unwrap();
        self.ctx
    }
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn login(app: &Router, nickname: &str) -> String {
    let (status, body) = post_json(app, "/login", json!({"nickname": nickname})).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["token"].as_str().unwrap().to_string()
}

fn rejected(result: Result<impl std::fmt::Debug, ClientError>) -> String {
    match result {
        Err(ClientError::Rejected(msg)) => msg,
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_client_trading_session() {
    let server = RunningServer::start().await;
    let mut client = server.client();

    let info = client.login("Alice").await.unwrap();
    assert_eq!(info.nickname, "Alice");
    assert_eq!(info.credits, BONUS);

    let catalog = client.all_items().await.unwrap();
    assert_eq!(catalog.len(), 3);
    assert_eq!(catalog.get(ItemId(3)).unwrap().name, "Lantern");

    assert_eq!(
        client.buy(ItemId(1)).await.unwrap(),
        "Item was purchased successfully."
    );
    // Cached info was discarded by the buy
    assert_eq!(client.account_info().await.unwrap().credits, 900);
    assert_eq!(assert_ok!(client.my_items().await), vec![ItemId(1)]);

    assert_eq!(rejected(client.buy(ItemId(1)).await), "Item was already purchased!");
    assert_eq!(rejected(client.buy(ItemId(2)).await), "Not enough credits to buy item!");
    assert_eq!(rejected(client.buy(ItemId(42)).await), "Unknown item id!");
    assert_eq!(client.account_info().await.unwrap().credits, 900);

    assert_eq!(
        client.sell(ItemId(1)).await.unwrap(),
        "Item was sold successfully."
    );
    assert_eq!(client.account_info().await.unwrap().credits, BONUS);
    assert!(client.my_items().await.unwrap().is_empty());
    assert_eq!(
        rejected(client.sell(ItemId(1)).await),
        "There is no such item in account!"
    );

    client.logout().await;
    assert!(!client.is_logged_in());

    server.stop().await;
}

#[tokio::test]
async fn test_second_login_rejected_until_logout() {
    let server = RunningServer::start().await;
    let mut first = server.client();
    let mut second = server.client();

    first.login("bob").await.unwrap();
    assert_eq!(rejected(second.login("BOB").await), "Session already exists!");

    first.logout().await;

    // Bonus accumulates on the next login
    let info = second.login("bob").await.unwrap();
    assert_eq!(info.credits, 2 * BONUS);

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_clears_sessions() {
    let server = RunningServer::start().await;
    let mut client = server.client();

    client.login("carol").await.unwrap();
    assert_eq!(server.ctx.sessions.active_count().await, 1);

    let ctx = server.stop().await;
    assert_eq!(ctx.sessions.active_count().await, 0);
}

#[tokio::test]
async fn test_token_rejected_after_logout() {
    let (_dir, ctx) = test_context(|_| {}).await;
    let app = server::build_router(ctx);

    let token = login(&app, "dave").await;

    let (status, body) = post_json(&app, "/logout", json!({"token": token})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "data": "Logged out."}));

    for endpoint in ["/get_account_info", "/get_all_items", "/get_my_items", "/logout"] {
        let (status, body) = post_json(&app, endpoint, json!({"token": token})).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", endpoint);
        assert_eq!(body, json!({"status": "error", "data": "Session not found!"}));
    }

    let (_, body) = post_json(&app, "/buy_item", json!({"token": token, "id": 1})).await;
    assert_eq!(body["data"], "Session not found!");
}

#[tokio::test]
async fn test_envelopes_over_router() {
    let (_dir, ctx) = test_context(|_| {}).await;
    let app = server::build_router(ctx);

    let (status, body) = post_json(&app, "/login", json!({"nickname": "erin"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["data"], json!({"nickname": "erin", "credits": BONUS}));
    let token = body["token"].as_str().unwrap().to_string();

    // Numeric strings are accepted as item ids
    let (_, body) = post_json(&app, "/buy_item", json!({"token": token, "id": "3"})).await;
    assert_eq!(body["data"], "Item was purchased successfully.");

    let (_, body) = post_json(&app, "/get_my_items", json!({"token": token})).await;
    assert_eq!(body, json!({"status": "ok", "data": [3]}));

    let (_, body) = post_json(&app, "/get_all_items", json!({"token": token})).await;
    assert_eq!(body["data"]["2"]["price"], 1500);
    assert_eq!(body["data"]["1"]["type"], "weapon");

    let (status, body) = post_json(&app, "/sell_item", json!({"token": token, "id": "lamp"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"], "Unknown item id!");

    let (_, body) = post_json(&app, "/get_account_info", json!({"token": token})).await;
    assert_eq!(body["data"]["credits"], BONUS - 400);
}

#[tokio::test]
async fn test_rejections_use_envelope() {
    let (_dir, ctx) = test_context(|_| {}).await;
    let app = server::build_router(ctx.clone());

    let (status, body) = post_json(&app, "/login", json!({"nickname": "ab"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"status": "error", "data": "Invalid nickname!"}));

    let (status, body) = post_json(&app, "/get_account_info", json!({"token": "forged"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["data"], "Invalid token!");

    // Missing field
    let (status, body) = post_json(&app, "/buy_item", json!({"token": "x"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    // Not JSON at all
    let request = Request::builder()
        .method("POST")
        .uri("/login")
        .body(Body::from("nickname=frank"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, body) = post_json(&app, "/no_such_endpoint", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");

    assert_eq!(ctx.sessions.active_count().await, 0);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let (_dir, ctx) = test_context(|_| {}).await;
    let app = server::build_router(ctx);

    login(&app, "grace").await;

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sessions"], 1);
    assert_eq!(body["catalog_items"], 3);

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("bazaar_logins_total"));
}

#[tokio::test]
async fn test_login_rate_limited() {
    let (_dir, ctx) = test_context(|config| {
        config.rate_limit.enabled = true;
        config.rate_limit.login_requests_per_second = 1;
        config.rate_limit.burst_size = 2;
    })
    .await;
    let app = server::build_router(ctx);

    login(&app, "henry").await;
    login(&app, "irene").await;

    let request = Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"nickname": "jack"}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
}

#[tokio::test]
async fn test_concurrent_logins_single_session() {
    let server = RunningServer::start().await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let mut client = server.client();
        handles.push(tokio::spawn(async move { client.login("kate").await }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    // Exactly one bonus was granted
    assert_eq!(winners[0].credits, BONUS);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(result, Err(ClientError::Rejected(msg)) if msg == "Session already exists!"));
    }

    let mut observer = server.client();
    assert_err!(observer.login("kate").await);
    assert_eq!(server.ctx.sessions.active_count().await, 1);

    server.stop().await;
}

#[tokio::test]
async fn test_client_against_dead_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let mut client = MarketClient::new(&ClientConfig {
        server_url: url,
        timeout_secs: 1,
    })
    .unwrap();

    let err = client.login("luke").await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));

    // Logout without a session is a silent no-op
    client.logout().await;
    assert!(!client.is_logged_in());
}
