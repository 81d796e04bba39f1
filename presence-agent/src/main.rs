//! Presence Agent - watches peer availability and serves live tracking sessions.

use std::env;
use std::path::Path;
use std::sync::Arc;

use presence_common::{PresenceSnapshot, USERS_PATH};
use presence_tracker::{MemoryStore, PresenceStore, RestStore};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod config;
mod error;
mod state;
mod watchers;

use config::{Config, StoreBackend, StoreConfig};
use state::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    println!("presence-agent {}", VERSION);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle --version / -V
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        print_version();
        return Ok(());
    }

    // Load configuration
    let config = Config::load().map_err(|e| {
        format!(
            "Failed to load configuration: {}. \
             Make sure config.toml exists or set the AGENT__AGENT__USER_ID environment variable.",
            e
        )
    })?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting presence-agent for user {}", config.agent.user_id);

    let store = open_store(&config.store)?;
    tracing::info!("Using {} presence store", store.backend());

    let state = Arc::new(AppState::new(config.clone(), store));

    // A missing record just means the user has not registered yet
    match state.status.lock().await.load().await {
        Ok(status) => tracing::info!("Own status: {}", status),
        Err(e) => tracing::warn!("Failed to load own status: {}", e),
    }

    watchers::spawn_all(state.clone());

    // Build router
    let app = api::app(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", config.api.host, config.api.port);
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn open_store(
    config: &StoreConfig,
) -> Result<Arc<dyn PresenceStore>, Box<dyn std::error::Error>> {
    match config.backend {
        StoreBackend::Rest => {
            let base_url = config
                .base_url
                .as_deref()
                .ok_or("store.base_url is required for the rest backend")?;
            tracing::info!("Connecting to realtime database at {}", base_url);
            Ok(Arc::new(RestStore::new(base_url, config.auth_token.clone())))
        }
        StoreBackend::Memory => {
            let store = match &config.seed_file {
                Some(path) => {
                    let snapshot = load_seed(Path::new(path))?;
                    tracing::info!("Seeded {} users from {}", snapshot.len(), path);
                    MemoryStore::with_users(
                        snapshot
                            .iter()
                            .map(|(id, record)| (id.to_string(), record.clone())),
                    )
                }
                None => MemoryStore::new(),
            };
            Ok(Arc::new(store))
        }
    }
}

/// Read the `users` collection out of a database export.
fn load_seed(path: &Path) -> Result<PresenceSnapshot, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read seed file {}: {}", path.display(), e))?;
    let root: serde_json::Value = serde_json::from_str(&content)?;
    Ok(PresenceSnapshot::from_json(&root[USERS_PATH]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_seed_reads_users_collection() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"users": {{"ana": {{"firstName": "Ana", "status": "available"}}, "luis": {{"firstName": "Luis"}}}}}}"#
        )
        .unwrap();

        let snapshot = load_seed(file.path()).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot.get("ana").and_then(|r| r.first_name.as_deref()),
            Some("Ana")
        );
    }

    #[test]
    fn test_load_seed_without_users_is_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"other": 1}}"#).unwrap();
        assert!(load_seed(file.path()).unwrap().is_empty());
    }

    #[test]
    fn test_rest_backend_needs_base_url() {
        let config = StoreConfig {
            backend: StoreBackend::Rest,
            ..Default::default()
        };
        assert!(open_store(&config).is_err());
    }
}
