//! End-to-end messaging behavior: announcements, broadcasts, whispers,
//! and commands.

use crate::*;

#[tokio::test]
async fn login_is_announced_to_everyone_including_the_newcomer() -> Result<()> {
    let server = TestServer::start(8).await?;

    let mut alice = login(&server, "alice").await?;
    expect_announce(&mut alice, "alice has joined!").await?;

    let mut bob = login(&server, "bob").await?;
    expect_announce(&mut alice, "bob has joined!").await?;
    expect_announce(&mut bob, "bob has joined!").await?;

    server.stop().await
}

#[tokio::test]
async fn broadcast_reaches_everyone_but_the_sender() -> Result<()> {
    let server = TestServer::start(8).await?;

    let mut alice = login(&server, "alice").await?;
    expect_announce(&mut alice, "alice has joined!").await?;
    let mut bob = login(&server, "bob").await?;
    expect_announce(&mut alice, "bob has joined!").await?;
    expect_announce(&mut bob, "bob has joined!").await?;
    let mut carol = login(&server, "carol").await?;
    expect_announce(&mut alice, "carol has joined!").await?;
    expect_announce(&mut bob, "carol has joined!").await?;
    expect_announce(&mut carol, "carol has joined!").await?;

    alice.broadcast("hello all").await?;

    let m = recv(&mut bob).await?;
    assert_eq!(m.kind, MessageKind::Broadcast);
    assert_eq!(m.sender, "alice");
    assert_eq!(m.body_text(), "hello all");

    let m = recv(&mut carol).await?;
    assert_eq!(m.kind, MessageKind::Broadcast);
    assert_eq!(m.body_text(), "hello all");

    expect_silence(&mut alice).await?;

    server.stop().await
}

#[tokio::test]
async fn whisper_reaches_only_its_target() -> Result<()> {
    let server = TestServer::start(8).await?;

    let mut alice = login(&server, "alice").await?;
    expect_announce(&mut alice, "alice has joined!").await?;
    let mut bob = login(&server, "bob").await?;
    expect_announce(&mut alice, "bob has joined!").await?;
    expect_announce(&mut bob, "bob has joined!").await?;
    let mut carol = login(&server, "carol").await?;
    expect_announce(&mut alice, "carol has joined!").await?;
    expect_announce(&mut bob, "carol has joined!").await?;
    expect_announce(&mut carol, "carol has joined!").await?;

    alice.whisper("bob", "psst, over here").await?;

    let m = recv(&mut bob).await?;
    assert_eq!(m.kind, MessageKind::Whisper);
    assert_eq!(m.sender, "alice");
    assert_eq!(m.receiver, "bob");
    assert_eq!(m.body_text(), "psst, over here");

    expect_silence(&mut carol).await?;
    expect_silence(&mut alice).await?;

    server.stop().await
}

#[tokio::test]
async fn whisper_to_unknown_user_bounces_an_error() -> Result<()> {
    let server = TestServer::start(8).await?;

    let mut alice = login(&server, "alice").await?;
    expect_announce(&mut alice, "alice has joined!").await?;
    let mut bob = login(&server, "bob").await?;
    expect_announce(&mut alice, "bob has joined!").await?;
    expect_announce(&mut bob, "bob has joined!").await?;

    alice.whisper("ghost", "anyone there?").await?;

    let m = recv(&mut alice).await?;
    assert_eq!(m.kind, MessageKind::UserError);
    assert_eq!(m.body_text(), "Could not find a user with that name.");

    expect_silence(&mut bob).await?;

    server.stop().await
}

#[tokio::test]
async fn who_lists_all_connected_users() -> Result<()> {
    let server = TestServer::start(8).await?;

    let mut alice = login(&server, "alice").await?;
    let mut bob = login(&server, "bob").await?;
    expect_announce(&mut bob, "bob has joined!").await?;

    alice.command("who").await?;

    let m = recv_kind(&mut alice, MessageKind::Response).await?;
    assert_eq!(m.body_text(), "All users: alice, bob");

    server.stop().await
}

#[tokio::test]
async fn unknown_command_bounces_an_error() -> Result<()> {
    let server = TestServer::start(8).await?;

    let mut alice = login(&server, "alice").await?;

    alice.command("frobnicate").await?;

    let m = recv_kind(&mut alice, MessageKind::UserError).await?;
    assert_eq!(m.body_text(), "Could not find the command \"frobnicate\".");

    server.stop().await
}

#[tokio::test]
async fn long_messages_survive_chunking() -> Result<()> {
    let server = TestServer::start(8).await?;

    let mut alice = login(&server, "alice").await?;
    expect_announce(&mut alice, "alice has joined!").await?;
    let mut bob = login(&server, "bob").await?;
    expect_announce(&mut alice, "bob has joined!").await?;
    expect_announce(&mut bob, "bob has joined!").await?;

    // Several chunks, with an exact-multiple length for good measure.
    let text = "x".repeat(1024);
    alice.broadcast(&text).await?;

    let m = recv(&mut bob).await?;
    assert_eq!(m.kind, MessageKind::Broadcast);
    assert_eq!(m.body_text(), text);

    server.stop().await
}
