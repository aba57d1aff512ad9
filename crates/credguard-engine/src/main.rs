//! credguard engine binary.
//!
//! Loads `credguard.yaml` (or the path in `CREDGUARD_CONFIG`), opens the rule
//! and usage stores, and serves the reporting surface.

use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use credguard_engine::cancel::EmptyExecutionRegistry;
use credguard_engine::{app_state, config, router};

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::var("CREDGUARD_CONFIG").unwrap_or_else(|_| "credguard.yaml".into());
    match run(&path).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "credguard-engine failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::load_from_file(path)?;
    let listen = cfg.server.listen_addr()?;

    // standalone: no runtime attached, so graph stops go straight to hard kill
    let state = app_state::AppState::new(cfg, Arc::new(EmptyExecutionRegistry))?;
    let app = router::build_router(state);

    tracing::info!(%listen, "credguard-engine starting");
    let listener = tokio::net::TcpListener::bind(listen).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
