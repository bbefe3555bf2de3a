use anyhow::Result;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use misspoke::{
    api::{AppState, create_router},
    config::{Config, LoggingConfig},
    database::Database,
    llm_service::LLMService,
    log_system_event,
    session_service::SessionService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Keep the guard alive so buffered file output is flushed on exit
    let _guard = setup_logging(&LoggingConfig::from_env()?)?;

    let config = Config::from_env()?;
    config.validate()?;

    log_system_event!(startup, component = "server", "misspoke server starting");

    let db = Database::new(&config.database.url).await?;
    info!("Database initialized successfully");

    let llm_service = LLMService::with_site(
        config.llm.api_key.clone(),
        config.llm.base_url.clone(),
        config.llm.provider,
        config.llm.models.clone(),
        config.llm.site_url.clone(),
        config.llm.app_title.clone(),
    );
    info!(
        provider = llm_service.provider_name(),
        models = ?llm_service.models(),
        "Initialized LLM service"
    );

    let session_service = SessionService::new(db, Arc::new(llm_service.clone()));

    let state = AppState {
        session_service,
        llm_service,
    };

    let app = create_router(state).layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn setup_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::fmt;

    let env_filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info,misspoke=debug"));

    let console_layer = config.console_enabled.then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(true)
    });

    let mut guard = None;
    let file_layer = if config.file_enabled {
        if let Err(e) = std::fs::create_dir_all(&config.log_directory) {
            eprintln!("Warning: Could not create log directory {}: {}", config.log_directory, e);
        }

        let file_appender = tracing_appender::rolling::daily(&config.log_directory, "misspoke.log");
        let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(file_guard);

        // No ANSI colors in files
        Some(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_writer(non_blocking_file),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if config.file_enabled {
        info!(
            "Logging initialized - writing to {}/misspoke.log with daily rotation",
            config.log_directory
        );
    }

    Ok(guard)
}
