mod common;

use common::*;
use std::time::Duration;
use tern_rust::retcode;
use tern_rust::wire::{Command, Reply};

#[tokio::test]
async fn concurrent_cold_reads_issue_one_fetch() {
    let (client, mut server) = new_client(config());
    let mut conn = login_ok(&client, &mut server, vec![], vec![]).await;

    let c1 = client.clone();
    let t1 = tokio::spawn(async move { c1.get_stranger_info(55, false).await });
    let c2 = client.clone();
    let t2 = tokio::spawn(async move { c2.get_stranger_info(55, false).await });

    let frame = conn.recv_frame().await;
    assert!(matches!(frame.command, Command::GetStrangerInfo { user_id: 55 }));
    // The second caller queues on the in-flight fetch instead of issuing
    // its own.
    conn.expect_quiet(Duration::from_millis(100)).await;

    conn.reply(frame.seq, Reply::Stranger(Some(stranger(55)))).await;

    let r1 = t1.await.unwrap();
    let r2 = t2.await.unwrap();
    assert!(r1.is_ok() && r2.is_ok());
    assert_eq!(r1.data, r2.data);

    conn.expect_quiet(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn failed_bulk_reload_leaves_previous_mapping_untouched() {
    let (client, mut server) = new_client(config());
    let mut conn = login_ok(&client, &mut server, vec![friend(1), friend(2)], vec![]).await;

    let before = client.cache.friends_snapshot();
    assert_eq!(before.len(), 2);

    let task_client = client.clone();
    let task = tokio::spawn(async move { task_client.reload_friend_list().await });
    let frame = conn.recv_frame().await;
    assert!(matches!(frame.command, Command::FetchFriendList));
    conn.reply(
        frame.seq,
        Reply::Error {
            code: 7,
            message: "listing unavailable".into(),
        },
    )
    .await;

    let res = task.await.unwrap();
    assert_eq!(res.retcode, retcode::FAILED);
    assert_eq!(client.cache.friends_snapshot(), before);
}

#[tokio::test]
async fn successful_bulk_reload_replaces_the_mapping_atomically() {
    let (client, mut server) = new_client(config());
    let mut conn = login_ok(&client, &mut server, vec![friend(1), friend(2)], vec![]).await;

    let task_client = client.clone();
    let task = tokio::spawn(async move { task_client.reload_friend_list().await });
    let frame = conn.recv_frame().await;
    conn.reply(frame.seq, Reply::FriendList(vec![friend(3)])).await;

    assert!(task.await.unwrap().is_ok());
    let after = client.cache.friends_snapshot();
    assert_eq!(after.len(), 1);
    assert!(after.contains_key(&3));
}

#[tokio::test]
async fn reload_gate_defers_other_operations() {
    let (client, mut server) = new_client(config());
    let mut conn = login_ok(&client, &mut server, vec![], vec![]).await;

    let reload_client = client.clone();
    let reload_task = tokio::spawn(async move { reload_client.reload_friend_list().await });
    let reload_frame = conn.recv_frame().await;
    assert!(matches!(reload_frame.command, Command::FetchFriendList));

    // The gate is held: this operation must not reach the wire yet.
    let op_client = client.clone();
    let op_task = tokio::spawn(async move { op_client.get_group_info(100, true).await });
    conn.expect_quiet(Duration::from_millis(150)).await;

    conn.reply(reload_frame.seq, Reply::FriendList(vec![friend(9)]))
        .await;
    assert!(reload_task.await.unwrap().is_ok());

    let op_frame = conn.recv_frame().await;
    assert!(matches!(op_frame.command, Command::GetGroupInfo { group_id: 100 }));
    conn.reply(op_frame.seq, Reply::Group(Some(group(100)))).await;
    assert!(op_task.await.unwrap().is_ok());
}

#[tokio::test]
async fn not_found_fetch_evicts_stale_entry() {
    let (client, mut server) = new_client(config());
    let mut conn = login_ok(&client, &mut server, vec![], vec![]).await;

    let task_client = client.clone();
    let task = tokio::spawn(async move { task_client.get_stranger_info(55, false).await });
    let frame = conn.recv_frame().await;
    conn.reply(frame.seq, Reply::Stranger(Some(stranger(55)))).await;
    assert!(task.await.unwrap().is_ok());
    assert!(client.get_stranger_list().data.unwrap().contains_key(&55));

    // A forced refresh that comes back "not found" removes the stale
    // entry instead of leaving it.
    let task_client = client.clone();
    let task = tokio::spawn(async move { task_client.get_stranger_info(55, true).await });
    let frame = conn.recv_frame().await;
    conn.reply(frame.seq, Reply::Stranger(None)).await;

    let res = task.await.unwrap();
    assert_eq!(res.retcode, retcode::FAILED);
    assert!(client.get_stranger_list().data.unwrap().is_empty());
}

#[tokio::test]
async fn member_list_loaded_empty_is_distinct_from_absent() {
    let (client, mut server) = new_client(config());
    let mut conn = login_ok(&client, &mut server, vec![], vec![group(100)]).await;

    assert!(!client.cache.members_loaded(100));

    let task_client = client.clone();
    let task = tokio::spawn(async move { task_client.get_group_member_list(100, false).await });
    let frame = conn.recv_frame().await;
    assert!(matches!(frame.command, Command::FetchMemberList { group_id: 100 }));
    conn.reply(frame.seq, Reply::MemberList(Some(Vec::new()))).await;

    let res = task.await.unwrap();
    assert!(res.is_ok());
    assert!(res.data.unwrap().is_empty());
    assert!(client.cache.members_loaded(100));

    // Loaded-and-empty serves from cache; no second fetch.
    let res = client.get_group_member_list(100, false).await;
    assert!(res.is_ok());
    assert!(res.data.unwrap().is_empty());
    conn.expect_quiet(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn unknown_group_member_list_drops_the_group() {
    let (client, mut server) = new_client(config());
    let mut conn = login_ok(&client, &mut server, vec![], vec![group(200)]).await;

    let task_client = client.clone();
    let task = tokio::spawn(async move { task_client.get_group_member_list(200, true).await });
    let frame = conn.recv_frame().await;
    conn.reply(frame.seq, Reply::MemberList(None)).await;

    let res = task.await.unwrap();
    assert_eq!(res.retcode, retcode::FAILED);
    assert!(client.cache.group(200).is_none());
    assert!(!client.cache.members_loaded(200));
}
