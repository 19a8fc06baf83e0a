//! The accept loop — binds the listening socket and spawns one worker per
//! accepted connection.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;

use palaver_core::config::PalaverConfig;

use crate::commands::CommandSet;
use crate::registry::ConnectionRegistry;
use crate::router::Router;
use crate::worker;

pub struct ChatServer {
    listener: TcpListener,
    registry: Arc<ConnectionRegistry>,
    router: Arc<Router>,
}

impl ChatServer {
    /// Bind the listener and assemble the shared state. Nothing runs until
    /// [`ChatServer::run`].
    pub async fn bind(config: &PalaverConfig) -> io::Result<Self> {
        let addr = format!("{}:{}", config.network.bind_addr, config.network.port);
        let listener = TcpListener::bind(&addr).await?;

        let registry = Arc::new(ConnectionRegistry::new(config.limits.max_connections));
        let router = Arc::new(Router::new(registry.clone(), CommandSet::with_builtins()));

        Ok(Self {
            listener,
            registry,
            router,
        })
    }

    /// The bound address — useful when the config asked for port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    /// Accept connections until the shutdown channel fires. Workers run as
    /// independent tasks; a failed accept is logged, not fatal.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> io::Result<()> {
        tracing::info!(addr = %self.local_addr()?, "chat server listening");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("chat server shutting down");
                    return Ok(());
                }

                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            tracing::debug!(%addr, "accepted connection");
                            tokio::spawn(worker::run(
                                stream,
                                addr,
                                self.registry.clone(),
                                self.router.clone(),
                            ));
                        }
                        Err(e) => tracing::warn!(error = %e, "accept failed"),
                    }
                }
            }
        }
    }
}
