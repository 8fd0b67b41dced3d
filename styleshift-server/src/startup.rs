use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use styleshift_core::{
    pipeline::ensure_dir, select_best_device, ModelBackend, ModelCache, PipelineDirs,
    StyleCatalog, StylePipeline,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
    config::Args,
    handlers,
    queue::{JobQueue, QueueOptions, WorkerPool},
    IMAGES_ROUTE,
};

// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<StylePipeline>,
    pub queue: JobQueue,
}

pub fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}

pub fn build_pipeline(args: &Args) -> Result<StylePipeline> {
    for dir in [&args.products_dir, &args.results_dir, &args.models_dir] {
        ensure_dir(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let catalog = match &args.catalog {
        Some(path) => StyleCatalog::from_json_file(path, &args.models_dir),
        None => StyleCatalog::builtin(&args.models_dir),
    }
    .context("failed to build style catalog")?;

    let device = select_best_device(args.device_map()).context("failed to set up device")?;
    let loader = args.backend.loader(args.generator_config());
    let models = if args.no_model_cache {
        ModelCache::uncached(loader, device)
    } else {
        ModelCache::new(loader, device)
    };

    for style in catalog.iter() {
        if !style.weights.is_file() && args.backend == ModelBackend::Generator {
            tracing::warn!(
                style_id = %style.id,
                weights = %style.weights.display(),
                "weights file not found, transfers with this style will fail"
            );
        }
    }
    tracing::info!(
        styles = catalog.len(),
        backend = %args.backend,
        model_cache = !args.no_model_cache,
        "style catalog ready"
    );

    Ok(StylePipeline::new(
        catalog,
        models,
        PipelineDirs {
            products: args.products_dir.clone(),
            results: args.results_dir.clone(),
        },
    ))
}

pub fn router(state: AppState) -> Router {
    let results = ServeDir::new(&state.pipeline.dirs().results);
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/styles", get(handlers::list_styles))
        .route("/api/transfer", post(handlers::create_transfer))
        .route("/api/health", get(handlers::health))
        .nest_service(IMAGES_ROUTE, results)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Builds the router and starts the transfer workers. Must run inside a
/// Tokio runtime.
pub fn build_app(args: &Args) -> Result<(Router, WorkerPool)> {
    let pipeline = Arc::new(build_pipeline(args)?);
    let (queue, workers) = JobQueue::start(
        pipeline.clone(),
        QueueOptions {
            workers: args.workers as usize,
            capacity: args.queue_capacity as usize,
            job_timeout: args.job_timeout(),
        },
    );
    Ok((router(AppState { pipeline, queue }), workers))
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining transfer queue");
}
