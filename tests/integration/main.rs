//! Palaver integration test harness.
//!
//! Each test runs a real server on an ephemeral localhost port and drives
//! real clients against it over TCP — the full stack, packets and acks
//! included. Tests own their server; nothing is shared between them.

mod chat;
mod limits;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use palaver_client::ChatClient;
use palaver_core::config::PalaverConfig;
use palaver_core::{Message, MessageKind};
use palaver_server::ChatServer;

/// How long a test waits for a message it expects.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a test listens to prove nothing arrives.
pub const QUIET_WINDOW: Duration = Duration::from_millis(300);

// ── Harness ───────────────────────────────────────────────────────────────────

pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: broadcast::Sender<()>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    /// Bind a server on an ephemeral port and run it in the background.
    pub async fn start(max_connections: usize) -> Result<Self> {
        let mut config = PalaverConfig::default();
        config.network.bind_addr = "127.0.0.1".to_owned();
        config.network.port = 0;
        config.limits.max_connections = max_connections;

        let server = ChatServer::bind(&config).await.context("bind failed")?;
        let addr = server.local_addr()?;
        let (shutdown, _) = broadcast::channel(1);
        let handle = tokio::spawn(server.run(shutdown.subscribe()));

        Ok(Self {
            addr,
            shutdown,
            handle,
        })
    }

    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.handle.await?.context("server task failed")
    }
}

pub async fn login(server: &TestServer, username: &str) -> Result<ChatClient> {
    ChatClient::login(server.addr, username)
        .await
        .with_context(|| format!("login failed for {username}"))
}

/// Receive the next message, failing the test on timeout.
pub async fn recv(client: &mut ChatClient) -> Result<Message> {
    match tokio::time::timeout(RECV_TIMEOUT, client.next_message()).await {
        Ok(Ok(Some(m))) => Ok(m),
        Ok(Ok(None)) => bail!("server closed the connection"),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => bail!("timed out waiting for a message"),
    }
}

/// Expect the next message to be a server announcement with this exact text.
///
/// Tests drain announcements explicitly: a drained announcement is proof the
/// server finished the action that produced it, which pins down cross-client
/// ordering for the assertions that follow.
pub async fn expect_announce(client: &mut ChatClient, text: &str) -> Result<()> {
    let m = recv(client).await?;
    if m.kind != MessageKind::Announce || m.body_text() != text {
        bail!(
            "expected announce {text:?}, got {:?} ({:?})",
            m.kind,
            m.body_text()
        );
    }
    Ok(())
}

/// Receive until a message of `kind` arrives, skipping announcements only.
pub async fn recv_kind(client: &mut ChatClient, kind: MessageKind) -> Result<Message> {
    loop {
        let m = recv(client).await?;
        if m.kind == kind {
            return Ok(m);
        }
        if m.kind == MessageKind::Announce {
            continue;
        }
        bail!("expected {kind:?}, got {:?} ({:?})", m.kind, m.body_text());
    }
}

/// Prove that nothing is delivered to this client for a quiet window.
pub async fn expect_silence(client: &mut ChatClient) -> Result<()> {
    match tokio::time::timeout(QUIET_WINDOW, client.next_message()).await {
        Err(_) => Ok(()),
        Ok(Ok(Some(m))) => bail!("expected silence, got {:?} ({:?})", m.kind, m.body_text()),
        Ok(Ok(None)) => bail!("expected silence, server closed the connection"),
        Ok(Err(e)) => Err(e.into()),
    }
}
