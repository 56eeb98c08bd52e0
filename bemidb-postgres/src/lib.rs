//! Postgres wire-protocol front-end for the BemiDB lakehouse gateway.

pub mod auth;
pub mod bootstrap;
mod config;
mod handlers;

use std::io::{Error as IOError, ErrorKind};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use bemidb_pg_catalog::{CatalogCache, MaterializedViewStore, QueryRewriter};
use lake_pg::LakeEngine;
use log::{info, warn};
use pgwire::api::PgWireServerHandlers;
use pgwire::tokio::process_socket;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

pub use bootstrap::bootstrap_engine;
pub use config::GatewayConfig;
pub use handlers::{HandlerFactory, LakeSessionService, Parser, RemappedStatement};

/// re-exports
pub use bemidb_pg_catalog;
pub use lake_pg;
pub use pgwire;

/// Serve the gateway over the Postgres protocol.
///
/// Wires the engine, catalog cache and materialized-view store into the
/// standard handler set, then accepts connections until the process stops.
pub async fn serve(
    engine: Arc<dyn LakeEngine>,
    cache: Arc<CatalogCache>,
    store: Arc<dyn MaterializedViewStore>,
    config: Arc<GatewayConfig>,
) -> Result<(), IOError> {
    let rewriter = QueryRewriter::new(engine.clone(), cache, store);
    let factory = Arc::new(HandlerFactory::new(engine, rewriter, config.clone()));
    serve_with_handlers(factory, config).await
}

/// Serve with custom pgwire handlers.
///
/// Lets callers replace the built-in query processing or authentication
/// while keeping the listener and admission control.
pub async fn serve_with_handlers(
    handlers: Arc<impl PgWireServerHandlers + Sync + Send + 'static>,
    config: Arc<GatewayConfig>,
) -> Result<(), IOError> {
    let addr = listen_addr(config.host(), *config.port())?;
    let listener = TcpListener::bind(addr).await?;
    info!("listening on {addr} (database {})", config.database());

    // Admission control: a permit is taken before accept, so once
    // max_connections are active new clients wait in the TCP backlog.
    let semaphore = Arc::new(Semaphore::new(*config.max_connections()));

    loop {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| IOError::new(ErrorKind::Other, e))?;

        match listener.accept().await {
            Ok((socket, peer)) => {
                let handlers = handlers.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(e) = process_socket(socket, None, handlers).await {
                        warn!("error processing connection from {peer}: {e}");
                    }
                });
            }
            Err(e) => {
                warn!("error accepting connection: {e}");
            }
        }
    }
}

/// IPv4 or IPv6 is inferred from the host literal.
fn listen_addr(host: &str, port: u16) -> Result<SocketAddr, IOError> {
    let ip: IpAddr = host
        .parse()
        .map_err(|e| IOError::new(ErrorKind::InvalidInput, format!("invalid host {host}: {e}")))?;
    Ok(SocketAddr::new(ip, port))
}
