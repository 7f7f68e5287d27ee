//! Scripted fake-server harness running the whole client over the
//! in-process transport.

// Each integration binary compiles its own copy of this module and uses
// a different subset of it.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tern_rust::client::Client;
use tern_rust::config::ClientConfig;
use tern_rust::framing::{FrameDecoder, encode_frame};
use tern_rust::session::{LoginOutcome, SessionState};
use tern_rust::store::MemorySessionStore;
use tern_rust::transport::memory::{MemoryTransportFactory, ServerEnd};
use tern_rust::types::records::{FriendInfo, GroupInfo, LoginInfo};
use tern_rust::wire::{BincodeCodec, ClientFrame, Command, Push, Reply, ServerFrame};
use tokio::sync::mpsc;

pub const ACCOUNT: u64 = 10_000;

/// Config with auto-reconnect off; tests that exercise reconnection set
/// their own interval.
pub fn config() -> ClientConfig {
    ClientConfig {
        reconn_interval: 0,
        ..Default::default()
    }
}

pub struct TestServer {
    acceptor: mpsc::UnboundedReceiver<ServerEnd>,
}

impl TestServer {
    pub async fn accept(&mut self) -> TestConn {
        let end = self
            .acceptor
            .recv()
            .await
            .expect("client never connected");
        TestConn {
            end,
            decoder: FrameDecoder::new(),
            codec: BincodeCodec::new(),
        }
    }

    /// Asserts that no connection attempt happens within `dur`.
    pub async fn expect_no_connection(&mut self, dur: Duration) {
        if tokio::time::timeout(dur, self.acceptor.recv()).await.is_ok() {
            panic!("unexpected connection attempt");
        }
    }
}

/// Server half of one accepted connection.
pub struct TestConn {
    end: ServerEnd,
    decoder: FrameDecoder,
    codec: BincodeCodec,
}

impl TestConn {
    /// Next client frame. Heartbeats are acknowledged transparently so
    /// long-running tests never trip the keepalive.
    pub async fn recv_frame(&mut self) -> ClientFrame {
        loop {
            while let Some(payload) = self.decoder.decode_frame() {
                let frame = self
                    .codec
                    .decode_client(&payload)
                    .expect("client sent a malformed frame");
                if matches!(frame.command, Command::Heartbeat) {
                    self.reply(frame.seq, Reply::Ack).await;
                    continue;
                }
                return frame;
            }
            let bytes = self
                .end
                .from_client
                .recv()
                .await
                .expect("client closed the connection");
            self.decoder.feed(&bytes);
        }
    }

    /// Asserts that nothing except heartbeats arrives within `dur`.
    pub async fn expect_quiet(&mut self, dur: Duration) {
        let deadline = tokio::time::Instant::now() + dur;
        loop {
            while let Some(payload) = self.decoder.decode_frame() {
                let frame = self
                    .codec
                    .decode_client(&payload)
                    .expect("client sent a malformed frame");
                if matches!(frame.command, Command::Heartbeat) {
                    self.reply(frame.seq, Reply::Ack).await;
                    continue;
                }
                panic!("unexpected client frame: {}", frame.command.tag());
            }
            match tokio::time::timeout_at(deadline, self.end.from_client.recv()).await {
                Ok(Some(bytes)) => self.decoder.feed(&bytes),
                Ok(None) | Err(_) => return,
            }
        }
    }

    pub async fn send(&self, frame: ServerFrame) {
        let encoded = self.codec.encode_server(&frame).expect("encode");
        let framed = encode_frame(&encoded).expect("frame");
        assert!(self.end.send_raw(framed).await, "client read loop is gone");
    }

    pub async fn reply(&self, seq: u32, reply: Reply) {
        self.send(ServerFrame::Reply { seq, reply }).await;
    }

    pub async fn push(&self, push: Push) {
        self.send(ServerFrame::Push(push)).await;
    }

    pub async fn drop_connection(&self) {
        self.end.drop_connection().await;
    }
}

pub fn new_client(config: ClientConfig) -> (Arc<Client>, TestServer) {
    let (factory, acceptor) = MemoryTransportFactory::new();
    let client = Client::new(
        ACCOUNT,
        config,
        Arc::new(factory),
        Arc::new(MemorySessionStore::new()),
    );
    (client, TestServer { acceptor })
}

pub fn self_profile() -> LoginInfo {
    LoginInfo {
        user_id: ACCOUNT,
        nickname: "self".into(),
        ..Default::default()
    }
}

/// Services a full successful login handshake (auth, friend reload,
/// group reload) and returns the live connection.
pub async fn serve_login(
    conn: &mut TestConn,
    friends: Vec<FriendInfo>,
    groups: Vec<GroupInfo>,
) {
    let frame = conn.recv_frame().await;
    assert!(
        matches!(frame.command, Command::Auth { .. }),
        "expected auth, got {}",
        frame.command.tag()
    );
    conn.reply(
        frame.seq,
        Reply::LoginOk {
            profile: self_profile(),
            session_token: b"token".to_vec(),
        },
    )
    .await;

    let frame = conn.recv_frame().await;
    assert!(matches!(frame.command, Command::FetchFriendList));
    conn.reply(frame.seq, Reply::FriendList(friends)).await;

    let frame = conn.recv_frame().await;
    assert!(matches!(frame.command, Command::FetchGroupList));
    conn.reply(frame.seq, Reply::GroupList(groups)).await;
}

/// Drives `login` to `Online` with the given cache contents.
pub async fn login_ok(
    client: &Arc<Client>,
    server: &mut TestServer,
    friends: Vec<FriendInfo>,
    groups: Vec<GroupInfo>,
) -> TestConn {
    let task_client = client.clone();
    let login_task =
        tokio::spawn(async move { task_client.login("correct horse battery staple").await });

    let mut conn = server.accept().await;
    serve_login(&mut conn, friends, groups).await;

    let outcome = login_task
        .await
        .expect("login task panicked")
        .expect("login failed");
    assert!(matches!(outcome, LoginOutcome::Online(_)));
    assert_eq!(client.state(), SessionState::Online);
    conn
}

pub fn friend(user_id: u64) -> FriendInfo {
    FriendInfo {
        user_id,
        nickname: format!("friend-{user_id}"),
        ..Default::default()
    }
}

pub fn group(group_id: u64) -> GroupInfo {
    GroupInfo {
        group_id,
        group_name: format!("group-{group_id}"),
        member_count: 5,
        ..Default::default()
    }
}

pub fn stranger(user_id: u64) -> tern_rust::types::records::StrangerInfo {
    tern_rust::types::records::StrangerInfo {
        user_id,
        nickname: format!("stranger-{user_id}"),
        ..Default::default()
    }
}

pub fn member(group_id: u64, user_id: u64) -> tern_rust::types::records::MemberInfo {
    tern_rust::types::records::MemberInfo {
        group_id,
        user_id,
        nickname: format!("member-{user_id}"),
        ..Default::default()
    }
}

/// Polls `cond` until it holds or the deadline passes.
pub async fn wait_until(mut cond: impl FnMut() -> bool, dur: Duration) {
    let deadline = tokio::time::Instant::now() + dur;
    while !cond() {
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met in time");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Waits (bounded) until the state machine reaches `target`.
pub async fn wait_for_state(client: &Arc<Client>, target: SessionState) {
    let mut rx = client.subscribe_state();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == target))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {target:?}"))
        .expect("state channel closed");
}
