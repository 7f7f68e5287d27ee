mod common;

use common::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tern_rust::client::ClientError;
use tern_rust::session::{LoginOutcome, SessionState};
use tern_rust::types::events::{EventKind, SystemEvent};
use tern_rust::wire::{Command, Reply};

#[tokio::test]
async fn login_reaches_online_and_populates_caches() {
    let (client, mut server) = new_client(config());

    let online_seen = Arc::new(AtomicBool::new(false));
    let seen = online_seen.clone();
    client.on("system.online", move |_| {
        seen.store(true, Ordering::SeqCst);
        Ok(())
    });

    let _conn = login_ok(&client, &mut server, vec![friend(1)], vec![group(100)]).await;

    assert!(client.is_online());
    assert!(online_seen.load(Ordering::SeqCst));
    assert_eq!(client.get_friend_list().data.unwrap().len(), 1);
    assert_eq!(client.get_group_list().data.unwrap().len(), 1);

    let info = client.get_login_info().await;
    assert_eq!(info.data.unwrap().user_id, ACCOUNT);
}

#[tokio::test]
async fn captcha_challenge_parks_the_machine_then_completes() {
    let (client, mut server) = new_client(config());

    let captcha_events = Arc::new(AtomicU32::new(0));
    let counter = captcha_events.clone();
    client.on("system.login.captcha", move |event| {
        if let EventKind::System(SystemEvent::LoginCaptcha { image }) = &event.kind {
            assert_eq!(image, &vec![0xF0, 0x9F]);
        }
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let task_client = client.clone();
    let login_task = tokio::spawn(async move { task_client.login("pw").await });

    let mut conn = server.accept().await;
    let frame = conn.recv_frame().await;
    assert!(matches!(frame.command, Command::Auth { .. }));
    conn.reply(
        frame.seq,
        Reply::LoginCaptcha {
            token: "tok-1".into(),
            image: vec![0xF0, 0x9F],
        },
    )
    .await;

    let outcome = login_task.await.unwrap().unwrap();
    assert!(matches!(outcome, LoginOutcome::CaptchaRequired { .. }));
    assert_eq!(client.state(), SessionState::ChallengePending);
    assert_eq!(captcha_events.load(Ordering::SeqCst), 1);

    // An operation in ChallengePending fails fast.
    let res = client.send_private_msg(1, "hello").await;
    assert_eq!(res.retcode, tern_rust::retcode::OFFLINE);

    let task_client = client.clone();
    let captcha_task = tokio::spawn(async move { task_client.submit_captcha("abcd").await });

    let frame = conn.recv_frame().await;
    match &frame.command {
        Command::SubmitCaptcha { token, answer } => {
            assert_eq!(token, "tok-1");
            assert_eq!(answer, "abcd");
        }
        other => panic!("expected captcha submission, got {}", other.tag()),
    }
    conn.reply(
        frame.seq,
        Reply::LoginOk {
            profile: self_profile(),
            session_token: b"t2".to_vec(),
        },
    )
    .await;

    let frame = conn.recv_frame().await;
    assert!(matches!(frame.command, Command::FetchFriendList));
    conn.reply(frame.seq, Reply::FriendList(Vec::new())).await;
    let frame = conn.recv_frame().await;
    assert!(matches!(frame.command, Command::FetchGroupList));
    conn.reply(frame.seq, Reply::GroupList(Vec::new())).await;

    let outcome = captcha_task.await.unwrap().unwrap();
    assert!(matches!(outcome, LoginOutcome::Online(_)));
    assert!(client.is_online());
}

#[tokio::test]
async fn rejected_login_surfaces_code_and_disconnects() {
    let (client, mut server) = new_client(config());

    let error_seen = Arc::new(AtomicBool::new(false));
    let seen = error_seen.clone();
    client.on("system.login.error", move |_| {
        seen.store(true, Ordering::SeqCst);
        Ok(())
    });

    let task_client = client.clone();
    let login_task = tokio::spawn(async move { task_client.login("wrong").await });

    let mut conn = server.accept().await;
    let frame = conn.recv_frame().await;
    conn.reply(
        frame.seq,
        Reply::LoginRejected {
            code: 45,
            message: "bad credential".into(),
        },
    )
    .await;

    let outcome = login_task.await.unwrap().unwrap();
    match outcome {
        LoginOutcome::Rejected { code, message } => {
            assert_eq!(code, 45);
            assert_eq!(message, "bad credential");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(error_seen.load(Ordering::SeqCst));
}

#[tokio::test]
async fn initial_reload_failure_fails_the_login() {
    let (client, mut server) = new_client(config());

    let task_client = client.clone();
    let login_task = tokio::spawn(async move { task_client.login("pw").await });

    let mut conn = server.accept().await;
    let frame = conn.recv_frame().await;
    conn.reply(
        frame.seq,
        Reply::LoginOk {
            profile: self_profile(),
            session_token: Vec::new(),
        },
    )
    .await;

    let frame = conn.recv_frame().await;
    assert!(matches!(frame.command, Command::FetchFriendList));
    conn.reply(
        frame.seq,
        Reply::Error {
            code: 1,
            message: "listing unavailable".into(),
        },
    )
    .await;

    let err = login_task.await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::InitialSync(_)));
    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(!client.is_online());
}
