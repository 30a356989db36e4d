pub mod handlers;
pub mod types;

use crate::{
    Result,
    advice::AdviceGenerator,
    config::{Config, ServerConfig},
    llm::OpenAiClient,
    pipeline::ServiceContext,
    storage::TempFileStore,
    vision::{ClassLabels, OnnxClassifier, OnnxDetector},
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use handlers::AppState;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

pub async fn run(config: Config) -> Result<()> {
    let context = build_context(&config)?;
    let app = router(AppState::new(context), &config.server);

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Loads labels and model weights and wires the request context. Any missing
/// file is fatal: the process must not serve traffic without its models.
pub fn build_context(config: &Config) -> Result<ServiceContext> {
    let labels = ClassLabels::load_from_dir(&config.models.classifier.labels_dir)?;
    let classifier = OnnxClassifier::load(&config.models.classifier, labels)?;
    let detector = OnnxDetector::load(&config.models.detector)?;

    let llm_client = OpenAiClient::new(config.llm.clone())?;
    info!(
        "Text generation via {} ({})",
        config.llm.provider,
        llm_client.model()
    );
    let advisor = AdviceGenerator::new(
        Arc::new(llm_client),
        Duration::from_secs(config.llm.timeout_secs),
    );

    Ok(ServiceContext::new(
        Arc::new(classifier),
        Arc::new(detector),
        advisor,
        TempFileStore::new(&config.storage.temp_dir),
    ))
}

pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let app = Router::new()
        .route("/predict", post(handlers::predict))
        .route("/chat", post(handlers::chat))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(config.max_upload_bytes)),
        );

    if config.cors_allow_any_origin {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

impl AppState {
    pub fn new(context: ServiceContext) -> Self {
        Self {
            context: Arc::new(context),
        }
    }
}
