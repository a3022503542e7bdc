// Forbid unwrap() in production code. Test code may use it.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
use std::sync::Arc;

use charger_hub::CompositionRoot;
use charger_hub::config::Settings;
use charger_hub::environment::ProcessEnv;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "charger_hub=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = match Settings::load(&ProcessEnv) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!(
        "Loaded configuration: listen_port={}, hub_path={}",
        settings.listen_port,
        settings.realtime.path
    );

    // Nothing may listen until composition has fully succeeded.
    let root = CompositionRoot::new(Arc::new(ProcessEnv));
    let app = match root.compose(&settings) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!("Startup aborted: {e}");
            std::process::exit(1);
        }
    };

    let listener = tokio::net::TcpListener::bind(app.listen_addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind {}: {e}", app.listen_addr);
            std::process::exit(1);
        });
    tracing::info!(runtime = %app.runtime, "listening on {}", app.listen_addr);

    axum::serve(listener, app.router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Server error: {e}");
            std::process::exit(1);
        });
    tracing::info!("server stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
