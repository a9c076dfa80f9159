use std::sync::Arc;

use cfcheck::check::Checker;
use cfcheck::config::{StoreConfig, load_config, setup_http_client};
use cfcheck::http_probe::probe::HttpFetcher;
use cfcheck::server::serve;
use cfcheck::store::{CheckStore, MemoryStore, RedisStore};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app = load_config()?;
    match &app.config_file {
        Some(path) => log::info!("Using config file: {path}"),
        None => log::info!("No config file found, using defaults"),
    }

    let store: Arc<dyn CheckStore> = match &app.config.store {
        StoreConfig::Memory => {
            log::info!("Using in-memory check store");
            Arc::new(MemoryStore::new())
        }
        StoreConfig::Redis { url } => Arc::new(RedisStore::connect(url).await?),
    };

    let client = setup_http_client(&app.config)?;
    let policy = app.check_policy();
    log::info!(
        "Probe timeout {}ms, freshness window {}s",
        policy.probe_timeout.as_millis(),
        policy.freshness_window.as_secs()
    );
    let checker = Checker::new(Arc::new(HttpFetcher::new(client)), store, policy);

    let listener = TcpListener::bind(&app.config.listen_addr).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    serve(listener, checker.clone(), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await;

    log::info!("Waiting for pending cache writes");
    checker.flush_writes().await;
    Ok(())
}
