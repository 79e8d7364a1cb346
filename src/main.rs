use std::sync::Arc;

use anyhow::Context;
use axum::middleware::from_fn;
use axum::Router;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod app_state;
mod config;
mod db;
mod graphql;
mod middleware;
mod utils;
mod workflow;

use crate::api::auth::SecurityAddon;
use crate::api::graphql::graphql_routes;
use crate::api::statuses::StatusDoc;
use crate::api::submissions::SubmissionDoc;
use crate::app_state::AppState;
use crate::config::{Config, StoreBackend};
use crate::db::memory::MemoryStore;
use crate::db::queries::submission::PgSubmissionStore;
use crate::db::store::SubmissionStore;
use crate::graphql::graph_schema::create_schema;
use crate::middleware::auth::jwt_middleware;
use crate::workflow::service::{DocumentLinks, WorkflowService};

/// Request bodies carry JSON payloads and storage references only.
const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(OpenApi)]
#[openapi(modifiers(&SecurityAddon))]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::init().map_err(anyhow::Error::msg)?;

    std::fs::create_dir_all(&config.log_dir).context("Failed to create logs directory")?;
    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "internship_backend.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("internship_backend=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(non_blocking))
        .init();

    let (store, pool): (Arc<dyn SubmissionStore>, Option<PgPool>) = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = db::pool::get_db_pool(&config)
                .await
                .context("Failed to connect to the database")?;
            db::pool::run_migrations(&pool)
                .await
                .context("Failed to run migrations")?;
            let store: Arc<dyn SubmissionStore> = Arc::new(PgSubmissionStore::new(pool.clone()));
            (store, Some(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; submissions are lost on restart");
            let store: Arc<dyn SubmissionStore> = Arc::new(MemoryStore::new());
            (store, None)
        }
    };

    let documents = DocumentLinks {
        public_url: config.storage_public_url.clone(),
        bucket: config.storage_bucket.clone(),
    };
    let state = AppState::new(WorkflowService::new(store, documents));
    let graphql_schema = create_schema(state.workflow.clone());

    let merged_doc = ApiDoc::openapi()
        .merge_from(SubmissionDoc::openapi())
        .merge_from(StatusDoc::openapi());

    let public_routes = Router::new()
        .merge(api::health::health_routes())
        .merge(api::statuses::status_routes());

    let private_routes = Router::new()
        .merge(api::submissions::submission_routes())
        .merge(graphql_routes(graphql_schema))
        .route_layer(from_fn(jwt_middleware));

    let app = Router::new()
        .merge(public_routes)
        .merge(private_routes)
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", merged_doc.clone()))
        .merge(RapiDoc::with_openapi("/api-docs/rapidoc.json", merged_doc).path("/rapidoc"))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Server running at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server encountered an error")?;

    if let Some(pool) = pool {
        tracing::info!("Closing database pool...");
        pool.close().await;
    }
    tracing::info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C, shutting down...");
}
