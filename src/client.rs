use crate::cache::CacheManager;
use crate::config::ClientConfig;
use crate::events::{EventHub, ListenerId};
use crate::framing::FrameDecoder;
use crate::request::{OpError, PendingOp};
use crate::session::SessionState;
use crate::store::{DeviceProfile, FsSessionStore, SessionStore};
use crate::transport::{TcpTransportFactory, Transport, TransportEvent, TransportFactory};
use crate::types::envelope::{CallResult, retcode};
use crate::types::events::{EventData, EventKind};
use crate::types::records::LoginInfo;
use crate::version::VersionInfo;
use crate::wire::{BincodeCodec, Command, FrameCodec, Reply, ServerFrame};
use dashmap::DashMap;
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, Notify, OwnedRwLockReadGuard, RwLock, mpsc, watch};

/// Default remote gateway, overridable through
/// [`ClientConfig::remote_addr`].
pub const DEFAULT_GATEWAY: &str = "gw.tern-im.net:8080";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client is not connected")]
    NotConnected,
    #[error("client is already online")]
    AlreadyConnected,
    #[error("a connection attempt is already in progress")]
    AlreadyConnecting,
    #[error("a verification challenge is pending; answer it with submit_captcha")]
    ChallengePending,
    #[error("no verification challenge is pending")]
    NoChallenge,
    #[error("no stored credential available for re-login")]
    NoCredential,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("initial contact sync failed: {0}")]
    InitialSync(String),
    #[error("unexpected reply to {0}")]
    UnexpectedReply(&'static str),
    #[error(transparent)]
    Op(#[from] OpError),
}

/// Cumulative connection counters. Reset only when the client is
/// constructed, never on reconnect.
#[derive(Debug)]
pub struct Statistics {
    pub start_time: i64,
    pub lost_times: AtomicU32,
    pub recv_pkt_cnt: AtomicU64,
    pub sent_pkt_cnt: AtomicU64,
    /// Packets whose reply never arrived before the deadline.
    pub lost_pkt_cnt: AtomicU64,
    pub recv_msg_cnt: AtomicU64,
    pub sent_msg_cnt: AtomicU64,
}

impl Statistics {
    fn new() -> Self {
        Self {
            start_time: chrono::Utc::now().timestamp(),
            lost_times: AtomicU32::new(0),
            recv_pkt_cnt: AtomicU64::new(0),
            sent_pkt_cnt: AtomicU64::new(0),
            lost_pkt_cnt: AtomicU64::new(0),
            recv_msg_cnt: AtomicU64::new(0),
            sent_msg_cnt: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            start_time: self.start_time,
            lost_times: self.lost_times.load(Ordering::Relaxed),
            recv_pkt_cnt: self.recv_pkt_cnt.load(Ordering::Relaxed),
            sent_pkt_cnt: self.sent_pkt_cnt.load(Ordering::Relaxed),
            lost_pkt_cnt: self.lost_pkt_cnt.load(Ordering::Relaxed),
            recv_msg_cnt: self.recv_msg_cnt.load(Ordering::Relaxed),
            sent_msg_cnt: self.sent_msg_cnt.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsSnapshot {
    pub start_time: i64,
    pub lost_times: u32,
    pub recv_pkt_cnt: u64,
    pub sent_pkt_cnt: u64,
    pub lost_pkt_cnt: u64,
    pub recv_msg_cnt: u64,
    pub sent_msg_cnt: u64,
}

/// Snapshot returned by `get_status`.
#[derive(Debug, Clone)]
pub struct Status {
    pub online: bool,
    /// Current online-status code (11 when freshly logged in).
    pub status: u8,
    pub remote_addr: Option<String>,
    /// Messages seen (sent or received) in the last minute.
    pub msg_cnt_per_min: u32,
    pub statistics: StatisticsSnapshot,
    pub config: ClientConfig,
}

/// One client instance bound to one account. Every client owns its own
/// state machine, correlator, caches and event hub; running several
/// accounts in one process is just constructing several clients.
pub struct Client {
    pub account_id: u64,
    pub config: ClientConfig,
    pub cache: CacheManager,
    pub stats: Statistics,

    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) transport_factory: Arc<dyn TransportFactory>,
    pub(crate) codec: Arc<dyn FrameCodec>,
    pub(crate) transport: Mutex<Option<Arc<dyn Transport>>>,

    pub(crate) state_tx: watch::Sender<SessionState>,
    pub(crate) login_info: RwLock<Option<LoginInfo>>,
    pub(crate) online_status: AtomicU8,
    pub(crate) credential: Mutex<Option<[u8; 16]>>,
    pub(crate) device: RwLock<Option<DeviceProfile>>,
    pub(crate) challenge_token: Mutex<Option<String>>,

    pub(crate) pending: DashMap<u32, PendingOp>,
    pub(crate) seq_counter: AtomicU32,

    pub(crate) events: EventHub,
    pub(crate) msg_times: Mutex<VecDeque<i64>>,

    pub(crate) reload_gate: Arc<RwLock<()>>,
    pub(crate) shutdown_notifier: Notify,
    pub(crate) is_connecting: AtomicBool,
    pub(crate) expected_disconnect: AtomicBool,
    pub(crate) connection_generation: AtomicU64,
}

/// The conventional way to build a client: TCP transport to the
/// configured (or default) gateway, filesystem session store under
/// `config.data_dir`, reference codec.
pub fn create_client(account_id: u64, mut config: ClientConfig) -> Arc<Client> {
    let addr = config
        .remote_addr
        .get_or_insert_with(|| DEFAULT_GATEWAY.to_string())
        .clone();
    let factory = Arc::new(TcpTransportFactory::new(addr));
    let store = Arc::new(FsSessionStore::new(config.data_dir.clone()));
    Client::new(account_id, config, factory, store)
}

impl Client {
    pub fn new(
        account_id: u64,
        config: ClientConfig,
        transport_factory: Arc<dyn TransportFactory>,
        store: Arc<dyn SessionStore>,
    ) -> Arc<Self> {
        Self::with_codec(
            account_id,
            config,
            transport_factory,
            store,
            Arc::new(BincodeCodec::new()),
        )
    }

    pub fn with_codec(
        account_id: u64,
        config: ClientConfig,
        transport_factory: Arc<dyn TransportFactory>,
        store: Arc<dyn SessionStore>,
        codec: Arc<dyn FrameCodec>,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        Arc::new(Self {
            account_id,
            config,
            cache: CacheManager::new(),
            stats: Statistics::new(),
            store,
            transport_factory,
            codec,
            transport: Mutex::new(None),
            state_tx,
            login_info: RwLock::new(None),
            online_status: AtomicU8::new(0),
            credential: Mutex::new(None),
            device: RwLock::new(None),
            challenge_token: Mutex::new(None),
            pending: DashMap::new(),
            seq_counter: AtomicU32::new(1),
            events: EventHub::new(),
            msg_times: Mutex::new(VecDeque::new()),
            reload_gate: Arc::new(RwLock::new(())),
            shutdown_notifier: Notify::new(),
            is_connecting: AtomicBool::new(false),
            expected_disconnect: AtomicBool::new(false),
            connection_generation: AtomicU64::new(0),
        })
    }

    // ---- connection plumbing ----

    pub(crate) fn open_transport(
        self: &Arc<Self>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<u64, ClientError>> + Send + '_>>
    {
        Box::pin(async move {
            let (transport, events) = self
                .transport_factory
                .create_transport()
                .await
                .map_err(|e| ClientError::Transport(e.to_string()))?;

            let generation = self.connection_generation.fetch_add(1, Ordering::SeqCst) + 1;
            self.expected_disconnect.store(false, Ordering::Relaxed);
            *self.transport.lock().await = Some(transport);

            let client = self.clone();
            tokio::spawn(async move { client.read_loop(events, generation).await });
            Ok(generation)
        })
    }

    /// The sequential inbound-processing path: every frame of one
    /// connection is decoded and handled in arrival order, so cache
    /// mutations and their event notifications stay causally consistent.
    async fn read_loop(
        self: Arc<Self>,
        mut events: mpsc::Receiver<TransportEvent>,
        generation: u64,
    ) {
        debug!(target: "Client", "Read loop started (generation {generation})");
        let mut decoder = FrameDecoder::new();
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_notifier.notified() => {
                    debug!(target: "Client", "Shutdown signaled, exiting read loop");
                    return;
                }
                event = events.recv() => match event {
                    Some(TransportEvent::Connected) => {
                        debug!(target: "Client", "Transport reports connected");
                    }
                    Some(TransportEvent::DataReceived(data)) => {
                        decoder.feed(&data);
                        while let Some(payload) = decoder.decode_frame() {
                            self.stats.recv_pkt_cnt.fetch_add(1, Ordering::Relaxed);
                            match self.codec.decode(&payload) {
                                Ok(ServerFrame::Reply { seq, reply }) => {
                                    self.complete_reply(seq, reply);
                                }
                                Ok(ServerFrame::Push(push)) => {
                                    self.handle_push(push).await;
                                }
                                Err(e) => {
                                    warn!(target: "Client", "Dropping malformed frame: {e}");
                                }
                            }
                        }
                    }
                    Some(TransportEvent::Disconnected) | None => {
                        self.on_connection_lost(generation).await;
                        return;
                    }
                }
            }
        }
    }

    pub(crate) async fn ensure_device(&self) -> Result<DeviceProfile, ClientError> {
        if let Some(device) = self.device.read().await.clone() {
            return Ok(device);
        }
        let loaded = self
            .store
            .load_device(self.account_id)
            .await
            .map_err(|e| ClientError::Storage(e.to_string()))?;
        let device = match loaded {
            Some(device) => device,
            None => {
                let device = DeviceProfile::generate();
                info!(
                    target: "Client",
                    "Generated device fingerprint {} for account {}",
                    device.fingerprint, self.account_id
                );
                self.store
                    .save_device(self.account_id, &device)
                    .await
                    .map_err(|e| ClientError::Storage(e.to_string()))?;
                device
            }
        };
        *self.device.write().await = Some(device.clone());
        Ok(device)
    }

    // ---- lifecycle ----

    /// Drops the connection immediately without telling the remote end.
    pub async fn terminate(&self) {
        info!(target: "Client", "Terminating");
        self.expected_disconnect.store(true, Ordering::Relaxed);
        self.set_state(SessionState::Terminated);
        self.shutdown_notifier.notify_waiters();
        if let Some(transport) = self.transport.lock().await.take() {
            transport.disconnect().await;
        }
        self.fail_all_pending();
    }

    /// Graceful shutdown: announce the logoff, then behave like
    /// [`Self::terminate`]. The logoff acknowledgement is awaited under a
    /// short deadline and its failure is not fatal.
    pub async fn logout(&self) {
        if self.is_online() {
            match self
                .send_command_with_timeout(Command::Logoff, Duration::from_secs(5))
                .await
            {
                Ok(_) => debug!(target: "Client", "Logoff acknowledged"),
                Err(e) => warn!(target: "Client", "Logoff not acknowledged: {e}"),
            }
        }
        self.terminate().await;
    }

    // ---- operation plumbing ----

    /// Admission control for facade operations: online, and not during a
    /// bulk reload. Queued operations hold the gate's read side for the
    /// duration of the call.
    pub(crate) async fn admission<T>(&self) -> Result<OwnedRwLockReadGuard<()>, CallResult<T>> {
        if !self.is_online() {
            return Err(CallResult::offline());
        }
        let gate = self.reload_gate.clone().read_owned().await;
        // The reload that held the gate may have ended in a teardown.
        if !self.is_online() {
            return Err(CallResult::offline());
        }
        Ok(gate)
    }

    pub(crate) fn op_failure<T>(e: OpError) -> CallResult<T> {
        match e {
            OpError::Timeout => CallResult::timeout(),
            OpError::NotConnected | OpError::ConnectionLost => CallResult::offline(),
            other => CallResult::error(other.to_string()),
        }
    }

    pub(crate) async fn dispatch_call(&self, command: Command) -> CallResult<Reply> {
        match self.send_command(command).await {
            Ok(Reply::Error { code, message }) => CallResult::failed(code, message),
            Ok(reply) => CallResult::ok(reply),
            Err(e) => Self::op_failure(e),
        }
    }

    /// Gate + submit + map to the uniform envelope.
    pub(crate) async fn call(&self, command: Command) -> CallResult<Reply> {
        let _gate = match self.admission().await {
            Ok(gate) => gate,
            Err(result) => return result,
        };
        self.dispatch_call(command).await
    }

    /// Carries a non-ok envelope across payload types.
    pub(crate) fn carry<T, U>(res: CallResult<T>) -> CallResult<U> {
        CallResult {
            retcode: res.retcode,
            status: res.status,
            data: None,
            error: res.error,
        }
    }

    /// Ack-or-accepted operations (most of the group administration and
    /// relationship surface).
    pub(crate) async fn call_ack(&self, command: Command) -> CallResult<()> {
        let res = self.call(command).await;
        if res.retcode != retcode::OK {
            return Self::carry(res);
        }
        match res.data {
            Some(Reply::Ack) => CallResult::ok(()),
            Some(Reply::Accepted) => CallResult::accepted(),
            _ => CallResult::error("unexpected reply payload"),
        }
    }

    // ---- bulk reloads ----

    /// Atomically replaces the friend mapping. While the reload is in
    /// flight the reload gate holds every other facade call out.
    pub async fn reload_friend_list(&self) -> CallResult<()> {
        if !self.is_online() {
            return CallResult::offline();
        }
        let _gate = self.reload_gate.clone().write_owned().await;
        self.reload_friends_inner().await
    }

    /// Atomically replaces the group mapping (member maps of vanished
    /// groups go with it).
    pub async fn reload_group_list(&self) -> CallResult<()> {
        if !self.is_online() {
            return CallResult::offline();
        }
        let _gate = self.reload_gate.clone().write_owned().await;
        self.reload_groups_inner().await
    }

    pub(crate) async fn reload_friends_inner(&self) -> CallResult<()> {
        match self.send_command(Command::FetchFriendList).await {
            Ok(Reply::FriendList(list)) => {
                info!(target: "Client/Cache", "Loaded {} friend(s)", list.len());
                self.cache.replace_friends(list);
                CallResult::ok(())
            }
            Ok(Reply::Error { code, message }) => CallResult::failed(code, message),
            Ok(other) => {
                warn!(target: "Client/Cache", "Unexpected friend list reply: {other:?}");
                CallResult::error("unexpected reply payload")
            }
            Err(e) => Self::op_failure(e),
        }
    }

    pub(crate) async fn reload_groups_inner(&self) -> CallResult<()> {
        match self.send_command(Command::FetchGroupList).await {
            Ok(Reply::GroupList(list)) => {
                info!(target: "Client/Cache", "Loaded {} group(s)", list.len());
                self.cache.replace_groups(list);
                CallResult::ok(())
            }
            Ok(Reply::Error { code, message }) => CallResult::failed(code, message),
            Ok(other) => {
                warn!(target: "Client/Cache", "Unexpected group list reply: {other:?}");
                CallResult::error("unexpected reply payload")
            }
            Err(e) => Self::op_failure(e),
        }
    }

    // ---- events ----

    /// Registers a persistent observer for a dotted event-name pattern
    /// (a category, a prefix, or an exact name).
    pub fn on(
        &self,
        pattern: &str,
        handler: impl Fn(&EventData) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> ListenerId {
        self.events.on(pattern, Arc::new(handler))
    }

    /// Registers an observer that fires for at most one matching event.
    pub fn once(
        &self,
        pattern: &str,
        handler: impl Fn(&EventData) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> ListenerId {
        self.events.once(pattern, Arc::new(handler))
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    pub(crate) fn dispatch_event(&self, kind: EventKind) {
        self.dispatch_event_at(chrono::Utc::now().timestamp(), kind);
    }

    pub(crate) fn dispatch_event_at(&self, time: i64, kind: EventKind) {
        let event = EventData::new(self.account_id, time, kind);
        self.events.dispatch(&event);
    }

    // ---- statistics ----

    pub(crate) async fn record_message_activity(&self, sent: bool) {
        if sent {
            self.stats.sent_msg_cnt.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.recv_msg_cnt.fetch_add(1, Ordering::Relaxed);
        }
        let now = chrono::Utc::now().timestamp();
        let mut times = self.msg_times.lock().await;
        times.push_back(now);
        while times.front().is_some_and(|t| now - *t >= 60) {
            times.pop_front();
        }
    }

    async fn msg_cnt_per_min(&self) -> u32 {
        let now = chrono::Utc::now().timestamp();
        let mut times = self.msg_times.lock().await;
        while times.front().is_some_and(|t| now - *t >= 60) {
            times.pop_front();
        }
        times.len() as u32
    }

    // ---- introspection ----

    pub async fn get_status(&self) -> CallResult<Status> {
        CallResult::ok(Status {
            online: self.is_online(),
            status: self.online_status.load(Ordering::Relaxed),
            remote_addr: self.config.remote_addr.clone(),
            msg_cnt_per_min: self.msg_cnt_per_min().await,
            statistics: self.stats.snapshot(),
            config: self.config.clone(),
        })
    }

    pub async fn get_login_info(&self) -> CallResult<LoginInfo> {
        match self.login_info.read().await.clone() {
            Some(info) => CallResult::ok(info),
            None => CallResult::offline(),
        }
    }

    pub fn get_version_info(&self) -> CallResult<VersionInfo> {
        CallResult::ok(crate::version::version_info())
    }

    pub fn can_send_image(&self) -> CallResult<bool> {
        CallResult::ok(true)
    }

    pub fn can_send_record(&self) -> CallResult<bool> {
        CallResult::ok(true)
    }
}
