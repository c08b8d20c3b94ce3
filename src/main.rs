use deepguard::config::AppConfig;
use deepguard::{app, utils, AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_logging().expect("Failed to initialize logging");

    let config = AppConfig::from_env();
    config.log_summary();

    // Scratch space for uploads and sampled frames
    let state = AppState::from_config(config);
    state
        .pipeline
        .workspace()
        .ensure_dir()
        .await
        .expect("Failed to create temp directory");
    tracing::info!("Temp directory ready: {}", state.pipeline.workspace().dir().display());

    match tokio::task::spawn_blocking(utils::check_ffmpeg_available).await {
        Ok(Ok(())) => tracing::info!("✓ FFmpeg and FFprobe are available"),
        Ok(Err(e)) => tracing::warn!("{} Video uploads will get a neutral verdict.", e),
        Err(e) => tracing::warn!("FFmpeg check did not run: {}", e),
    }

    let bind_addr = state.config.bind_addr.clone();
    let app = app(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind listener");
    tracing::info!("listening on {}", bind_addr);
    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .await
        .expect("Server error");
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,deepguard=trace,reqwest=info,hyper=info,tower=info".to_string()
        } else {
            "info,deepguard=info,reqwest=warn,hyper=warn,tower=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    // JSON output for log aggregation, human-readable otherwise
    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("🛡️ DeepGuard starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Build mode: {}", if cfg!(debug_assertions) { "development" } else { "production" });
    tracing::info!("Log level: {}", log_level);

    Ok(())
}
