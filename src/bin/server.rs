use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;

use ecoshare::auth::Authenticator;
use ecoshare::config::ServerConfig;
use ecoshare::handlers::{routes, AppState};
use ecoshare::security_logger::{log_security_event, SecurityEvent};
use ecoshare::storage::MemoryStorage;

#[tokio::main]
async fn main() {
    // Initialize env
    match dotenvy::dotenv() {
        Ok(path) => info!("Environment variables loaded from {}", path.display()),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    // Initialize logging
    env_logger::init();

    // A missing or weak signing secret aborts startup
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log_security_event(SecurityEvent::ConfigurationError {
                component: "config".to_string(),
                error: e.to_string(),
            });
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Configuration: {:?}", config);

    let storage = Arc::new(MemoryStorage::new());

    let state = match AppState::new(&config, storage) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize services: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(ref admin) = config.bootstrap_admin {
        if let Err(e) = bootstrap_admin(&state.authenticator, admin).await {
            error!("Failed to create bootstrap admin: {}", e);
            std::process::exit(1);
        }
    }

    // Build the server address
    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    let api = routes(state);

    match (config.enable_tls, &config.tls_cert_path, &config.tls_key_path) {
        (true, Some(cert), Some(key)) => {
            info!("Starting EcoShare server on https://{}", addr);
            warp::serve(api)
                .tls()
                .cert_path(cert)
                .key_path(key)
                .run(addr)
                .await;
        }
        _ => {
            info!("Starting EcoShare server on http://{}", addr);
            warp::serve(api).run(addr).await;
        }
    }
}

async fn bootstrap_admin(
    authenticator: &Arc<Authenticator>,
    admin: &ecoshare::config::AdminBootstrap,
) -> ecoshare::Result<()> {
    match authenticator.ensure_admin(admin).await? {
        Some(account) => info!("Bootstrap admin '{}' ready (id {})", account.username, account.id),
        None => info!("Bootstrap admin '{}' already present", admin.username),
    }
    Ok(())
}
