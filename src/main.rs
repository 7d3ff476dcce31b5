use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use checkout::{
    auth::inspector_auth,
    handlers::{
        inspector::{get_intent_handler, list_events_handler, list_intents_handler},
        intents::{create_intent_handler, intent_status_handler},
        webhooks::webhook_handler,
    },
    intents::{IdempotencyLocks, IntentConfig},
    processor::{HttpProcessorClient, ProcessorConfig},
    state::AppState,
    webhooks::WebhookConfig,
};
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::cors::{Any, CorsLayer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:checkout.db".to_string());
    let bind_addr =
        std::env::var("CHECKOUT_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    let inspector_token = std::env::var("CHECKOUT_INSPECTOR_API_TOKEN")
        .ok()
        .filter(|token| !token.trim().is_empty());

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON;").execute(&pool).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let webhook =
        WebhookConfig::from_env().map_err(|_| "CHECKOUT_WEBHOOK_SECRET is required")?;
    let processor_config =
        ProcessorConfig::from_env().map_err(|_| "CHECKOUT_PROCESSOR_API_KEY is required")?;

    let state = AppState {
        pool,
        processor: Arc::new(HttpProcessorClient::new(processor_config)),
        intents: IntentConfig::from_env(),
        key_locks: IdempotencyLocks::new(),
        webhook,
        inspector_token,
    };

    let cors = match std::env::var("CHECKOUT_ALLOWED_ORIGIN") {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>()?)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    let inspector_routes = Router::new()
        .route("/intents", get(list_intents_handler))
        .route("/intents/:id", get(get_intent_handler))
        .route("/events", get(list_events_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inspector_auth,
        ));

    let app = Router::new()
        .route("/payment-intents", post(create_intent_handler))
        .route("/payment-intents/:id", get(intent_status_handler))
        .route("/webhooks/processor", post(webhook_handler))
        .nest("/api/inspector", inspector_routes)
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = bind_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "checkout backend listening");
    axum::serve(listener, app).await?;

    Ok(())
}
