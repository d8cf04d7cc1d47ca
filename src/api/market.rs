/// Marketplace endpoints
///
/// Every route is a `POST` with a JSON body. Malformed bodies are turned into
/// `BadRequest` so they still come back in the standard envelope.
use crate::{
    account::{LoginRequest, TokenRequest, TradeRequest},
    catalog::{Catalog, ItemId},
    context::AppContext,
    db::account::AccountInfo,
    error::{Envelope, MarketResult},
    trading::TradeReceipt,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};

/// Build marketplace routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/get_account_info", post(get_account_info))
        .route("/get_all_items", post(get_all_items))
        .route("/get_my_items", post(get_my_items))
        .route("/buy_item", post(buy_item))
        .route("/sell_item", post(sell_item))
}

async fn login(
    State(ctx): State<AppContext>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> MarketResult<Json<Envelope<AccountInfo>>> {
    let Json(req) = payload?;

    let outcome = ctx.account_manager.login(&req.nickname).await?;

    Ok(Json(Envelope::ok(outcome.info).with_token(outcome.token)))
}

async fn logout(
    State(ctx): State<AppContext>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> MarketResult<Json<Envelope<&'static str>>> {
    let Json(req) = payload?;

    ctx.account_manager.logout(&req.token).await?;

    Ok(Json(Envelope::ok("Logged out.")))
}

async fn get_account_info(
    State(ctx): State<AppContext>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> MarketResult<Json<Envelope<AccountInfo>>> {
    let Json(req) = payload?;

    let auth = ctx.account_manager.authenticate(&req.token).await?;
    let info = ctx.account_manager.account_info(auth.account_id).await?;

    Ok(Json(Envelope::ok(info)))
}

async fn get_all_items(
    State(ctx): State<AppContext>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> MarketResult<Json<Envelope<Catalog>>> {
    let Json(req) = payload?;

    ctx.account_manager.authenticate(&req.token).await?;

    Ok(Json(Envelope::ok(Catalog::clone(&ctx.catalog))))
}

async fn get_my_items(
    State(ctx): State<AppContext>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> MarketResult<Json<Envelope<Vec<ItemId>>>> {
    let Json(req) = payload?;

    let auth = ctx.account_manager.authenticate(&req.token).await?;
    let items = ctx.account_manager.owned_items(auth.account_id).await?;

    Ok(Json(Envelope::ok(items)))
}

async fn buy_item(
    State(ctx): State<AppContext>,
    payload: Result<Json<TradeRequest>, JsonRejection>,
) -> MarketResult<Json<Envelope<&'static str>>> {
    let Json(req) = payload?;

    let auth = ctx.account_manager.authenticate(&req.token).await?;
    let item_id = req.id.parse()?;
    let receipt = ctx.trading_engine.buy(auth.account_id, item_id).await?;

    Ok(Json(trade_confirmation(&receipt)))
}

async fn sell_item(
    State(ctx): State<AppContext>,
    payload: Result<Json<TradeRequest>, JsonRejection>,
) -> MarketResult<Json<Envelope<&'static str>>> {
    let Json(req) = payload?;

    let auth = ctx.account_manager.authenticate(&req.token).await?;
    let item_id = req.id.parse()?;
    let receipt = ctx.trading_engine.sell(auth.account_id, item_id).await?;

    Ok(Json(trade_confirmation(&receipt)))
}

fn trade_confirmation(receipt: &TradeReceipt) -> Envelope<&'static str> {
    Envelope::ok(receipt.kind.success_message())
}
