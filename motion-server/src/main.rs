//! # MotionEdit Server
//!
//! Serves the animation edit API. Binds to localhost unless told otherwise.

use std::net::IpAddr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use motion_core::classifier::{DEFAULT_SCALE_CAP, DEFAULT_SCALE_FACTOR};
use motion_core::HeuristicConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use motion_server::config::{
    EditorConfig, PipelineConfig, ServerConfig, DEFAULT_MAX_BODY_BYTES, DEFAULT_MODEL_TIMEOUT,
    DEFAULT_PORT,
};
use motion_server::metrics;
use motion_server::{build_router, AppState, EditPipeline};

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "motion-edit", version, about = "Natural-language editing for Lottie animations")]
struct Args {
    /// Port to listen on.
    #[arg(long, env = "MOTION_EDIT_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Interface to bind.
    #[arg(long, env = "MOTION_EDIT_BIND", default_value = "127.0.0.1")]
    bind: IpAddr,

    /// Model API key. Falls back to GOOGLE_API_KEY, then EMERGENT_LLM_KEY.
    #[arg(long, env = "MOTION_EDIT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Override the model API base URL.
    #[arg(long, env = "MOTION_EDIT_MODEL_ENDPOINT")]
    model_endpoint: Option<String>,

    /// Override the model name.
    #[arg(long, env = "MOTION_EDIT_MODEL_NAME")]
    model_name: Option<String>,

    /// Deadline for one model call, in seconds.
    #[arg(
        long,
        env = "MOTION_EDIT_TIMEOUT_SECS",
        default_value_t = DEFAULT_MODEL_TIMEOUT.as_secs()
    )]
    timeout_secs: u64,

    /// Growth factor for "bigger" prompts.
    #[arg(long, env = "MOTION_EDIT_SCALE_FACTOR", default_value_t = DEFAULT_SCALE_FACTOR)]
    scale_factor: f64,

    /// Upper bound for scaled sizes.
    #[arg(long, env = "MOTION_EDIT_SCALE_CAP", default_value_t = DEFAULT_SCALE_CAP)]
    scale_cap: f64,

    /// Largest accepted request body, in bytes.
    #[arg(long, env = "MOTION_EDIT_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,

    /// Comma-separated allowed CORS origins.
    #[arg(long, env = "CORS_ORIGINS", default_value = "*")]
    cors_origins: String,
}

impl Args {
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let mut editor = EditorConfig {
            api_key: self
                .api_key
                .filter(|key| !key.trim().is_empty())
                .or_else(EditorConfig::api_key_from_env),
            model: self.model_name,
            timeout: Duration::from_secs(self.timeout_secs),
            ..EditorConfig::default()
        };
        if let Some(endpoint) = self.model_endpoint {
            editor = editor.with_endpoint(&endpoint)?;
        }

        let pipeline = PipelineConfig {
            editor,
            heuristics: HeuristicConfig {
                scale_factor: self.scale_factor,
                scale_cap: self.scale_cap,
                ..HeuristicConfig::default()
            },
        };
        let config = ServerConfig {
            bind: self.bind,
            port: self.port,
            cors_origins: ServerConfig::parse_origins(&self.cors_origins),
            max_body_bytes: self.max_body_bytes,
            pipeline,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Initialize structured tracing with optional JSON format.
///
/// Set `RUST_LOG` to control log levels (default: info,motion_server=debug,tower_http=debug).
/// Set `RUST_LOG_FORMAT=json` for JSON output (recommended for production).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,motion_server=debug,motion_core=debug,tower_http=debug")
    });

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Args::parse()
        .into_config()
        .context("invalid configuration")?;

    let metrics_handle = metrics::init_metrics()
        .map_err(|e| anyhow::anyhow!("Failed to initialize Prometheus metrics: {}", e))?;
    tracing::info!("Prometheus metrics initialized");

    let pipeline = EditPipeline::from_config(&config.pipeline);
    if !pipeline.model_configured() {
        tracing::warn!("no model API key found; every edit will use the heuristic fallback");
    }

    let state = AppState::new(pipeline).with_metrics(metrics_handle);
    let app = build_router(state, &config);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("MotionEdit server starting on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("MotionEdit server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
