//! Login-time refusals and connection lifecycle: duplicate names, capacity,
//! and disconnect announcements.

use crate::*;
use palaver_client::ClientError;

#[tokio::test]
async fn duplicate_username_is_refused_and_original_survives() -> Result<()> {
    let server = TestServer::start(8).await?;

    let mut alice = login(&server, "alice").await?;
    expect_announce(&mut alice, "alice has joined!").await?;

    match ChatClient::login(server.addr, "alice").await {
        Err(ClientError::LoginRejected { kind, reason }) => {
            assert_eq!(kind, MessageKind::UserError);
            assert!(reason.contains("taken"), "unexpected reason: {reason}");
        }
        Ok(_) => bail!("duplicate login unexpectedly succeeded"),
        Err(other) => bail!("expected LoginRejected, got {other}"),
    }

    // The existing connection is untouched and still fully functional.
    let mut bob = login(&server, "bob").await?;
    expect_announce(&mut alice, "bob has joined!").await?;
    expect_announce(&mut bob, "bob has joined!").await?;

    alice.broadcast("still here").await?;
    let m = recv(&mut bob).await?;
    assert_eq!(m.body_text(), "still here");

    server.stop().await
}

#[tokio::test]
async fn login_past_capacity_is_refused_with_server_full() -> Result<()> {
    let server = TestServer::start(2).await?;

    let mut alice = login(&server, "alice").await?;
    expect_announce(&mut alice, "alice has joined!").await?;
    let mut bob = login(&server, "bob").await?;
    expect_announce(&mut alice, "bob has joined!").await?;
    expect_announce(&mut bob, "bob has joined!").await?;

    match ChatClient::login(server.addr, "carol").await {
        Err(ClientError::LoginRejected { kind, reason }) => {
            assert_eq!(kind, MessageKind::ServerError);
            assert_eq!(reason, "Server is full");
        }
        Ok(_) => bail!("over-capacity login unexpectedly succeeded"),
        Err(other) => bail!("expected LoginRejected, got {other}"),
    }

    // Existing connections are unaffected by the refusal.
    alice.broadcast("cozy in here").await?;
    let m = recv(&mut bob).await?;
    assert_eq!(m.body_text(), "cozy in here");

    server.stop().await
}

#[tokio::test]
async fn disconnect_is_announced_once_and_frees_the_slot() -> Result<()> {
    let server = TestServer::start(8).await?;

    let mut alice = login(&server, "alice").await?;
    expect_announce(&mut alice, "alice has joined!").await?;
    let mut bob = login(&server, "bob").await?;
    expect_announce(&mut alice, "bob has joined!").await?;
    expect_announce(&mut bob, "bob has joined!").await?;
    let carol = login(&server, "carol").await?;
    expect_announce(&mut alice, "carol has joined!").await?;
    expect_announce(&mut bob, "carol has joined!").await?;

    // Closing the socket is the only goodbye carol sends.
    drop(carol);

    expect_announce(&mut alice, "User \"carol\" has disconnected.").await?;
    expect_announce(&mut bob, "User \"carol\" has disconnected.").await?;

    // Exactly one announcement each.
    expect_silence(&mut alice).await?;
    expect_silence(&mut bob).await?;

    // The slot and the name are reusable.
    let mut carol_again = login(&server, "carol").await?;
    expect_announce(&mut carol_again, "carol has joined!").await?;

    server.stop().await
}

#[tokio::test]
async fn capacity_frees_up_after_disconnect() -> Result<()> {
    let server = TestServer::start(1).await?;

    let alice = login(&server, "alice").await?;

    match ChatClient::login(server.addr, "bob").await {
        Err(ClientError::LoginRejected { kind, .. }) => {
            assert_eq!(kind, MessageKind::ServerError);
        }
        Ok(_) => bail!("over-capacity login unexpectedly succeeded"),
        Err(other) => bail!("expected LoginRejected, got {other}"),
    }

    drop(alice);

    // The worker needs a moment to notice the close and release the slot.
    let mut bob = None;
    for _ in 0..50 {
        match ChatClient::login(server.addr, "bob").await {
            Ok(client) => {
                bob = Some(client);
                break;
            }
            Err(ClientError::LoginRejected { .. }) => {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            Err(other) => return Err(other.into()),
        }
    }
    let mut bob = bob.context("slot never freed after disconnect")?;
    expect_announce(&mut bob, "bob has joined!").await?;

    server.stop().await
}
