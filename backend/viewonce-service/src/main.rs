use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use db_pool::{create_pool, DbConfig};
use message_store::{MessageStore, PgMessageStore};
use std::sync::Arc;
use viewonce_service::{
    bridge::BridgeClient,
    config::Config,
    context::BotContext,
    logging, migrations,
    repository::PgAccessRequestRepository,
    routes,
    services::{AccessRequestManager, EventDispatcher, RequestEventHandler},
    state::AppState,
};

#[actix_web::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env()?;
    logging::init_tracing(cfg.log_json);

    tracing::info!("Starting viewonce-service");

    let db_cfg = DbConfig::new("viewonce-service", cfg.database_url.clone());
    db_cfg.log_config();
    let pool = create_pool(db_cfg)
        .await
        .context("Failed to create database pool")?;

    migrations::run_all(&pool)
        .await
        .context("Failed to run migrations")?;

    let bridge = Arc::new(BridgeClient::new(&cfg.bridge)?);
    let account = bridge
        .fetch_session()
        .await
        .context("Failed to fetch bot session from bridge")?;
    tracing::info!(account_id = account.id, jid = %account.jid, "Bot session loaded");

    let context = BotContext::new(account);

    let store: Arc<dyn MessageStore> =
        Arc::new(PgMessageStore::new(pool.clone()).with_unwrap_depth(cfg.unwrap_max_depth));
    let requests = Arc::new(PgAccessRequestRepository::new(pool.clone()));

    let manager = Arc::new(AccessRequestManager::new(
        context.clone(),
        store.clone(),
        requests,
        bridge.clone(),
        bridge,
        cfg.request_settings(),
    ));
    let handler = Arc::new(RequestEventHandler::new(
        store,
        manager,
        cfg.command_matcher(),
    ));
    let dispatcher = Arc::new(EventDispatcher::new(handler, cfg.worker_limit));

    let state = AppState {
        context,
        dispatcher: dispatcher.clone(),
    };

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, workers = cfg.worker_limit, "HTTP server listening");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(routes::configure)
    })
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {bind_addr}"))?
    .run()
    .await
    .context("HTTP server failed")?;

    dispatcher.shutdown().await;
    tracing::info!("viewonce-service stopped");
    Ok(())
}
