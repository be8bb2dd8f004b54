use std::sync::Arc;

use log::{error, info, warn};

use presence_relay::config::Config;
use presence_relay::server::Server;
use presence_relay::store::MemoryStore;
use presence_relay::tls::load_tls_config;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let server = Server::new(Arc::new(MemoryStore::new()));
    let routes = presence_relay::routes(server);

    let tls = config.tls.as_ref().and_then(|paths| match load_tls_config(paths) {
        Ok(_) => Some(paths),
        Err(e) => {
            warn!("Failed to load TLS config: {}", e);
            None
        }
    });

    match tls {
        Some(paths) => {
            info!("Starting secure server (HTTPS/WSS) on {}...", config.addr);
            warp::serve(routes)
                .tls()
                .cert_path(&paths.cert)
                .key_path(&paths.key)
                .run(config.addr)
                .await;
        }
        None => {
            info!("Starting server (HTTP/WS) on {}...", config.addr);
            warp::serve(routes).run(config.addr).await;
        }
    }
}
