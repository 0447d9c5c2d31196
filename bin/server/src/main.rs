use std::sync::Arc;
use stellvia_platform_access::{
    BusinessService, HttpBusinessService, SessionStateMachine, TokenManager,
};
use stellvia_relay::{AuthRelayClient, HttpRelayClient};
use stellvia_scheduler::{LoginSweep, NotificationSweep, Notifier, PollingScheduler};
use stellvia_server::{Outbox, ServerConfig, WebState, events, router};
use stellvia_session::{RedisSessionStore, SessionStore};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    let providers = config.providers().expect("invalid provider list");
    tracing::info!(providers = providers.len(), "Loaded configuration");

    // No degraded mode without the session store
    let store: Arc<dyn SessionStore> = Arc::new(
        RedisSessionStore::connect(&config.redis_url, config.session.clone())
            .await
            .expect("failed to connect to session store"),
    );

    let relay: Arc<dyn AuthRelayClient> = Arc::new(
        HttpRelayClient::new(config.relay.clone()).expect("failed to build relay client"),
    );
    let backend: Arc<dyn BusinessService> = Arc::new(
        HttpBusinessService::new(config.backend.clone())
            .expect("failed to build business service client"),
    );
    let tokens = Arc::new(
        TokenManager::new(store.clone(), relay.clone())
            .with_skew_seconds(config.token_skew_seconds),
    );
    let machine = Arc::new(SessionStateMachine::new(
        store.clone(),
        relay.clone(),
        tokens.clone(),
        backend.clone(),
        providers,
    ));

    // Background sweeps deliver into the outbox the web front reads
    let outbox = Arc::new(Outbox::new());
    let notifier: Arc<dyn Notifier> = outbox.clone();
    let scheduler = PollingScheduler::from_config(
        &config.polling,
        LoginSweep::new(
            store.clone(),
            relay,
            machine.clone(),
            notifier.clone(),
            &config.polling,
        ),
        NotificationSweep::new(store, tokens, backend, notifier, &config.polling),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeps = scheduler.spawn(shutdown_rx);

    let (sender, event_loop) = events::channel(machine, &config.events);
    tokio::spawn(event_loop.run());

    let state = WebState::new(sender, outbox, config.web.clone(), config.session.ttl());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("shutting down background sweeps");
    let _ = shutdown_tx.send(true);
    for sweep in sweeps {
        if let Err(e) = sweep.await {
            tracing::warn!(error = %e, "sweep task ended abnormally");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
