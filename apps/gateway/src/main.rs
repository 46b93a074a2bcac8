use std::net::SocketAddr;
use std::path::Path;
use std::process;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clover_gateway::config::{Config, LISTEN_RETRY_AFTER, MAIL_POLL_INTERVAL, MAIL_RELAY_TIMEOUT};
use clover_gateway::db::memory::MemoryStore;
use clover_gateway::db::peers::MemoryPeerStore;
use clover_gateway::db::pg::PgStore;
use clover_gateway::db::store::{DurableStore, MailQueue};
use clover_gateway::gateway::media::DisabledMedia;
use clover_gateway::gateway::session::Gateway;
use clover_gateway::mail::scheduler::MailScheduler;
use clover_gateway::mail::transport::HttpRelayTransport;
use clover_gateway::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing; env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(version = %config.app_version, "clover gateway starting");
    if config.uses_default_secret() {
        tracing::warn!("AUTH_SECRET not set, using the development default");
    }

    let (store, queue): (Arc<dyn DurableStore>, Arc<dyn MailQueue>) = match &config.database_url {
        Some(url) => match clover_gateway::db::pool::connect(url) {
            Ok(pool) => {
                let pg = Arc::new(PgStore::new(pool));
                (pg.clone(), pg)
            }
            Err(e) => {
                tracing::error!(%e, "failed to create database pool");
                process::exit(1);
            }
        },
        None => {
            tracing::warn!("DATABASE_URL not set, state will not survive a restart");
            let memory = Arc::new(MemoryStore::new());
            (memory.clone(), memory)
        }
    };

    let gateway = Arc::new(Gateway::new(
        config.auth_secret.clone(),
        store,
        Arc::new(MemoryPeerStore::new()),
        Some(Arc::new(DisabledMedia)),
    ));

    if config.mail.enabled {
        match &config.mail.relay_url {
            Some(url) => match HttpRelayTransport::new(url, MAIL_RELAY_TIMEOUT) {
                Ok(transport) => {
                    let scheduler = Arc::new(MailScheduler::new(
                        queue,
                        Arc::new(transport),
                        config.mail.default_from.clone(),
                    ));
                    scheduler.spawn(MAIL_POLL_INTERVAL);
                    tracing::info!(relay = %url, "mail scheduler running");
                }
                Err(e) => {
                    tracing::error!(%e, "failed to build mail relay client");
                    process::exit(1);
                }
            },
            None => tracing::warn!("MAIL_ENABLED is set but MAIL_RELAY_URL is missing, mail disabled"),
        }
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState {
        config: Arc::new(config),
        gateway,
    };
    let app = clover_gateway::app(state);

    let listener = match clover_gateway::listen::bind_with_retry(addr, LISTEN_RETRY_AFTER).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, %e, "failed to bind");
            process::exit(1);
        }
    };
    tracing::info!(%addr, "clover gateway listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(%e, "server error");
        process::exit(1);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(%e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}
