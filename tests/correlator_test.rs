mod common;

use common::*;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tern_rust::retcode;
use tern_rust::wire::{Command, Reply};

#[tokio::test]
async fn replies_route_by_correlation_id_out_of_order() {
    let (client, mut server) = new_client(config());
    let mut conn = login_ok(&client, &mut server, vec![], vec![]).await;

    let c1 = client.clone();
    let t1 = tokio::spawn(async move { c1.get_stranger_info(1, false).await });
    let f1 = conn.recv_frame().await;
    let c2 = client.clone();
    let t2 = tokio::spawn(async move { c2.get_stranger_info(2, false).await });
    let f2 = conn.recv_frame().await;

    assert_ne!(f1.seq, f2.seq, "outstanding correlation ids must be unique");
    assert!(matches!(f1.command, Command::GetStrangerInfo { user_id: 1 }));
    assert!(matches!(f2.command, Command::GetStrangerInfo { user_id: 2 }));

    // Answer in reverse order; each caller still gets its own record.
    conn.reply(f2.seq, Reply::Stranger(Some(stranger(2)))).await;
    let r2 = t2.await.unwrap();
    assert_eq!(r2.data.unwrap().user_id, 2);

    conn.reply(f1.seq, Reply::Stranger(Some(stranger(1)))).await;
    let r1 = t1.await.unwrap();
    assert_eq!(r1.data.unwrap().user_id, 1);
}

#[tokio::test(start_paused = true)]
async fn deadline_expiry_retires_the_operation_and_discards_late_reply() {
    let (client, mut server) = new_client(config());
    let mut conn = login_ok(&client, &mut server, vec![], vec![]).await;

    let task_client = client.clone();
    let task = tokio::spawn(async move { task_client.get_stranger_info(55, false).await });
    let frame = conn.recv_frame().await;

    // No reply: the deadline resolves the operation exactly once.
    let res = task.await.unwrap();
    assert_eq!(res.retcode, retcode::TIMEOUT);
    assert_eq!(client.stats.lost_pkt_cnt.load(Ordering::Relaxed), 1);

    // The late reply for the retired id is discarded, not an error, and
    // must not populate the cache.
    conn.reply(frame.seq, Reply::Stranger(Some(stranger(55)))).await;

    let task_client = client.clone();
    let task = tokio::spawn(async move { task_client.get_stranger_info(56, false).await });
    let frame2 = conn.recv_frame().await;
    assert!(matches!(frame2.command, Command::GetStrangerInfo { user_id: 56 }));
    conn.reply(frame2.seq, Reply::Stranger(Some(stranger(56)))).await;
    assert!(task.await.unwrap().is_ok());

    let strangers = client.get_stranger_list().data.unwrap();
    assert!(!strangers.contains_key(&55));
    assert!(strangers.contains_key(&56));
}

#[tokio::test]
async fn connection_loss_fails_inflight_operations() {
    let (client, mut server) = new_client(config());
    let mut conn = login_ok(&client, &mut server, vec![], vec![]).await;

    let task_client = client.clone();
    let task = tokio::spawn(async move { task_client.get_stranger_info(55, false).await });
    let _frame = conn.recv_frame().await;

    conn.drop_connection().await;

    // The sweep resolves the pending operation well before its deadline.
    let res = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("sweep did not resolve the pending operation")
        .unwrap();
    assert_eq!(res.retcode, retcode::OFFLINE);
    assert_eq!(client.stats.lost_times.load(Ordering::Relaxed), 1);
}
