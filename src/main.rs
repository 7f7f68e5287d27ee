use clap::Parser;
use log::{error, info};
use std::sync::Arc;
use tern_rust::client::Client;
use tern_rust::config::ClientConfig;
use tern_rust::framing::{FrameDecoder, encode_frame};
use tern_rust::session::LoginOutcome;
use tern_rust::store::MemorySessionStore;
use tern_rust::transport::memory::{MemoryTransportFactory, ServerEnd};
use tern_rust::types::events::{EventKind, MessageEvent};
use tern_rust::types::records::{FriendInfo, LoginInfo};
use tern_rust::wire::{BincodeCodec, ClientFrame, Command, Push, Reply, ServerFrame};
use tokio::sync::mpsc;

// Demo of the engine running end-to-end against an in-process echo
// server: login, initial contact sync, a private message and its echoed
// push, then a graceful logout.

#[derive(Parser)]
#[command(name = "tern-demo", about = "Tern client demo against an in-process echo server")]
struct Args {
    /// Account identifier to log in with.
    #[arg(long, default_value_t = 10_001)]
    account: u64,
}

fn main() {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{:<5}] [{}] - {}",
                chrono::Utc::now().format("%H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime");

    rt.block_on(run(args));
}

async fn run(args: Args) {
    let (factory, acceptor) = MemoryTransportFactory::new();
    tokio::spawn(echo_server(acceptor));

    let config = ClientConfig {
        reconn_interval: 0,
        ..Default::default()
    };
    let client = Client::new(
        args.account,
        config,
        Arc::new(factory),
        Arc::new(MemorySessionStore::new()),
    );

    client.on("message.private", |event| {
        if let EventKind::Message(MessageEvent::Private {
            user_id, content, ..
        }) = &event.kind
        {
            info!(target: "Demo", "Echo from {user_id}: {}", content.raw_text());
        }
        Ok(())
    });

    match client.login("correct horse battery staple").await {
        Ok(LoginOutcome::Online(profile)) => {
            info!(target: "Demo", "Logged in as {} ({})", profile.nickname, profile.user_id);
        }
        Ok(outcome) => {
            error!(target: "Demo", "Unexpected login outcome: {outcome:?}");
            return;
        }
        Err(e) => {
            error!(target: "Demo", "Login failed: {e}");
            return;
        }
    }

    let friends = client.get_friend_list();
    info!(
        target: "Demo",
        "Friend list: {:?}",
        friends.data.map(|m| m.len()).unwrap_or(0)
    );

    let sent = client.send_private_msg(20_002, "ping").await;
    info!(
        target: "Demo",
        "send_private_msg -> retcode {} ({})",
        sent.retcode, sent.status
    );

    // Give the echoed push a moment to come back through the read loop.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    if let Some(status) = client.get_status().await.data {
        info!(
            target: "Demo",
            "Status: online={} sent_pkt={} recv_pkt={}",
            status.online, status.statistics.sent_pkt_cnt, status.statistics.recv_pkt_cnt
        );
    }

    client.logout().await;
    info!(target: "Demo", "Done");
}

async fn echo_server(mut acceptor: mpsc::UnboundedReceiver<ServerEnd>) {
    while let Some(mut conn) = acceptor.recv().await {
        tokio::spawn(async move {
            let codec = BincodeCodec::new();
            let mut decoder = FrameDecoder::new();
            while let Some(bytes) = conn.from_client.recv().await {
                decoder.feed(&bytes);
                while let Some(payload) = decoder.decode_frame() {
                    let frame = match codec.decode_client(&payload) {
                        Ok(frame) => frame,
                        Err(e) => {
                            error!(target: "Demo/Server", "Bad client frame: {e}");
                            continue;
                        }
                    };
                    for out in respond(frame) {
                        let Ok(encoded) = codec.encode_server(&out) else {
                            continue;
                        };
                        let Ok(framed) = encode_frame(&encoded) else {
                            continue;
                        };
                        if !conn.send_raw(framed).await {
                            return;
                        }
                    }
                }
            }
        });
    }
}

fn respond(frame: ClientFrame) -> Vec<ServerFrame> {
    let seq = frame.seq;
    match frame.command {
        Command::Auth { account_id, .. } => vec![ServerFrame::Reply {
            seq,
            reply: Reply::LoginOk {
                profile: LoginInfo {
                    user_id: account_id,
                    nickname: "demo".into(),
                    ..Default::default()
                },
                session_token: b"demo-token".to_vec(),
            },
        }],
        Command::FetchFriendList => vec![ServerFrame::Reply {
            seq,
            reply: Reply::FriendList(vec![FriendInfo {
                user_id: 20_002,
                nickname: "echo".into(),
                ..Default::default()
            }]),
        }],
        Command::FetchGroupList => vec![ServerFrame::Reply {
            seq,
            reply: Reply::GroupList(Vec::new()),
        }],
        Command::SendPrivateMsg {
            user_id, content, ..
        } => vec![
            ServerFrame::Reply {
                seq,
                reply: Reply::MessageReceipt {
                    message_id: format!("demo-{seq}"),
                },
            },
            ServerFrame::Push(Push::PrivateMessage {
                message_id: format!("echo-{seq}"),
                sender_id: user_id,
                sender_nickname: "echo".into(),
                from_friend: true,
                via_group: None,
                time: chrono::Utc::now().timestamp(),
                content,
                auto_reply: true,
            }),
        ],
        _ => vec![ServerFrame::Reply {
            seq,
            reply: Reply::Ack,
        }],
    }
}
