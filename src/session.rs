use crate::client::{Client, ClientError};
use crate::types::events::{EventKind, SystemEvent};
use crate::types::records::LoginInfo;
use crate::wire::{Command, Reply};
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// Login negotiation gets a longer deadline than ordinary operations:
/// the server may be doing device verification on its side.
const LOGIN_TIMEOUT: Duration = Duration::from_secs(45);

/// Connection lifecycle states. `Online` is the only state in which
/// facade operations are admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticating,
    /// The server demanded a verification challenge; waiting on
    /// `submit_captcha`.
    ChallengePending,
    Online,
    /// Transport lost; automatic re-login may be pending.
    Reconnecting,
    Terminated,
}

/// Login credential: plaintext or a pre-computed 16-byte MD5 digest.
#[derive(Clone)]
pub enum Credential {
    Plain(String),
    Md5([u8; 16]),
}

impl Credential {
    pub(crate) fn digest(&self) -> [u8; 16] {
        match self {
            Credential::Plain(text) => md5::compute(text.as_bytes()).0,
            Credential::Md5(digest) => *digest,
        }
    }
}

impl From<&str> for Credential {
    fn from(text: &str) -> Self {
        Credential::Plain(text.to_string())
    }
}

impl From<String> for Credential {
    fn from(text: String) -> Self {
        Credential::Plain(text)
    }
}

impl From<[u8; 16]> for Credential {
    fn from(digest: [u8; 16]) -> Self {
        Credential::Md5(digest)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never render credential material.
        match self {
            Credential::Plain(_) => f.write_str("Credential::Plain(..)"),
            Credential::Md5(_) => f.write_str("Credential::Md5(..)"),
        }
    }
}

/// Result of a `login`/`submit_captcha` round.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Online(LoginInfo),
    /// The machine is parked in `ChallengePending`; answer with
    /// `submit_captcha`.
    CaptchaRequired { image: Vec<u8> },
    Rejected { code: i32, message: String },
}

impl Client {
    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.state() == SessionState::Online
    }

    /// Watch the state machine from outside (used heavily by the tests).
    pub fn subscribe_state(&self) -> tokio::sync::watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub(crate) fn set_state(&self, next: SessionState) {
        self.state_tx.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            debug!(target: "Client", "Session state {state:?} -> {next:?}");
            *state = next;
            true
        });
    }

    /// Submits credentials and drives the machine to `Online`,
    /// `ChallengePending` or a rejection. A challenge does not fail the
    /// call: it is surfaced in the outcome (and as
    /// `system.login.captcha`).
    pub async fn login(
        self: &Arc<Self>,
        credential: impl Into<Credential>,
    ) -> Result<LoginOutcome, ClientError> {
        match self.state() {
            SessionState::Online => return Err(ClientError::AlreadyConnected),
            SessionState::ChallengePending => return Err(ClientError::ChallengePending),
            SessionState::Connecting | SessionState::Authenticating => {
                return Err(ClientError::AlreadyConnecting);
            }
            _ => {}
        }

        let digest = credential.into().digest();
        *self.credential.lock().await = Some(digest);
        self.connect_and_authenticate(digest).await
    }

    /// Answers the pending verification challenge.
    pub async fn submit_captcha(self: &Arc<Self>, answer: &str) -> Result<LoginOutcome, ClientError> {
        if self.state() != SessionState::ChallengePending {
            return Err(ClientError::NoChallenge);
        }
        let token = self
            .challenge_token
            .lock()
            .await
            .take()
            .ok_or(ClientError::NoChallenge)?;

        self.set_state(SessionState::Authenticating);
        let reply = self
            .send_command_with_timeout(
                Command::SubmitCaptcha {
                    token,
                    answer: answer.to_string(),
                },
                LOGIN_TIMEOUT,
            )
            .await;
        match reply {
            Ok(reply) => self.finish_auth(reply).await,
            Err(e) => {
                self.teardown_connection(SessionState::Disconnected).await;
                Err(e.into())
            }
        }
    }

    /// Re-login with the stored credential (reconnect and counter-kick
    /// paths).
    pub(crate) async fn relogin(self: &Arc<Self>) -> Result<LoginOutcome, ClientError> {
        let digest = (*self.credential.lock().await).ok_or(ClientError::NoCredential)?;
        self.connect_and_authenticate(digest).await
    }

    pub(crate) async fn connect_and_authenticate(
        self: &Arc<Self>,
        digest: [u8; 16],
    ) -> Result<LoginOutcome, ClientError> {
        if self.is_connecting.swap(true, Ordering::SeqCst) {
            return Err(ClientError::AlreadyConnecting);
        }
        let _guard = scopeguard::guard((), |_| {
            self.is_connecting.store(false, Ordering::Relaxed);
        });

        if self.is_online() {
            return Err(ClientError::AlreadyConnected);
        }

        self.set_state(SessionState::Connecting);

        let device = match self.ensure_device().await {
            Ok(device) => device,
            Err(e) => {
                self.set_state(SessionState::Disconnected);
                return Err(e);
            }
        };
        let session_token = match self.store.load_session_token(self.account_id).await {
            Ok(token) => token,
            Err(e) => {
                warn!(target: "Client", "Could not read stored session token: {e:#}");
                None
            }
        };

        if let Err(e) = self.open_transport().await {
            self.set_state(SessionState::Disconnected);
            return Err(e);
        }

        self.set_state(SessionState::Authenticating);
        let reply = self
            .send_command_with_timeout(
                Command::Auth {
                    account_id: self.account_id,
                    credential_md5: digest,
                    device_fingerprint: device.fingerprint.clone(),
                    platform: self.config.platform,
                    session_token,
                },
                LOGIN_TIMEOUT,
            )
            .await;

        match reply {
            Ok(reply) => self.finish_auth(reply).await,
            Err(e) => {
                self.teardown_connection(SessionState::Disconnected).await;
                Err(e.into())
            }
        }
    }

    async fn finish_auth(self: &Arc<Self>, reply: Reply) -> Result<LoginOutcome, ClientError> {
        match reply {
            Reply::LoginOk {
                profile,
                session_token,
            } => match self.complete_login(profile.clone(), session_token).await {
                Ok(()) => Ok(LoginOutcome::Online(profile)),
                Err(e) => {
                    self.teardown_connection(SessionState::Disconnected).await;
                    Err(e)
                }
            },
            Reply::LoginCaptcha { token, image } => {
                info!(target: "Client", "Server demands a verification challenge");
                *self.challenge_token.lock().await = Some(token);
                self.set_state(SessionState::ChallengePending);
                self.dispatch_event(EventKind::System(SystemEvent::LoginCaptcha {
                    image: image.clone(),
                }));
                Ok(LoginOutcome::CaptchaRequired { image })
            }
            Reply::LoginRejected { code, message } => {
                warn!(target: "Client", "Login rejected ({code}): {message}");
                self.dispatch_event(EventKind::System(SystemEvent::LoginError {
                    code,
                    message: message.clone(),
                }));
                self.teardown_connection(SessionState::Disconnected).await;
                Ok(LoginOutcome::Rejected { code, message })
            }
            other => {
                warn!(target: "Client", "Unexpected auth reply: {other:?}");
                self.teardown_connection(SessionState::Disconnected).await;
                Err(ClientError::UnexpectedReply("auth"))
            }
        }
    }

    fn complete_login(
        self: &Arc<Self>,
        profile: LoginInfo,
        session_token: Vec<u8>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), ClientError>> + Send + '_>>
    {
        Box::pin(async move {
        if let Err(e) = self
            .store
            .save_session_token(self.account_id, &session_token)
            .await
        {
            warn!(target: "Client", "Failed to persist session token: {e:#}");
        }

        *self.login_info.write().await = Some(profile);
        self.online_status.store(11, Ordering::Relaxed);

        // Reload gate: the social graph must be in before anything else
        // is allowed through.
        {
            let _gate = self.reload_gate.clone().write_owned().await;
            let friends = self.reload_friends_inner().await;
            if !friends.is_ok() {
                return Err(ClientError::InitialSync(Self::failure_text(&friends)));
            }
            let groups = self.reload_groups_inner().await;
            if !groups.is_ok() {
                return Err(ClientError::InitialSync(Self::failure_text(&groups)));
            }
        }

        self.set_state(SessionState::Online);
        info!(target: "Client", "Account {} is online", self.account_id);
        self.dispatch_event(EventKind::System(SystemEvent::Online));

        let generation = self.connection_generation.load(Ordering::SeqCst);
        let client = self.clone();
        let keepalive_fut: std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> =
            Box::pin(async move { client.keepalive_loop(generation).await });
        tokio::spawn(keepalive_fut);
        Ok(())
        })
    }

    fn failure_text<T>(result: &crate::types::envelope::CallResult<T>) -> String {
        result
            .error
            .as_ref()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| result.status.clone())
    }

    /// Unexpected transport loss. Generation-guarded so a stale read
    /// loop or keepalive from a previous connection cannot disturb the
    /// current one.
    pub(crate) async fn on_connection_lost(self: &Arc<Self>, generation: u64) {
        if self.connection_generation.load(Ordering::SeqCst) != generation {
            debug!(target: "Client", "Ignoring connection loss from a stale connection");
            return;
        }
        if self.expected_disconnect.load(Ordering::Relaxed) {
            self.fail_all_pending();
            debug!(target: "Client", "Transport closed as expected");
            return;
        }
        let state = self.state();
        if matches!(
            state,
            SessionState::Terminated | SessionState::Disconnected | SessionState::Reconnecting
        ) {
            self.fail_all_pending();
            return;
        }

        warn!(target: "Client", "Transport lost unexpectedly while {state:?}");
        *self.transport.lock().await = None;
        self.fail_all_pending();
        self.stats.lost_times.fetch_add(1, Ordering::Relaxed);
        self.set_state(SessionState::Reconnecting);
        self.dispatch_event(EventKind::System(SystemEvent::OfflineNetwork {
            message: "connection lost".into(),
        }));

        if self.config.reconn_interval == 0 {
            info!(
                target: "Client",
                "Automatic reconnection disabled; waiting for an external login()"
            );
            return;
        }

        let client = self.clone();
        let reconnect_fut: std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> =
            Box::pin(async move { client.reconnect_loop().await });
        tokio::spawn(reconnect_fut);
    }

    async fn reconnect_loop(self: Arc<Self>) {
        let delay = Duration::from_secs(self.config.reconn_interval);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown_notifier.notified() => return,
            }
            if self.state() != SessionState::Reconnecting {
                return;
            }
            info!(target: "Client", "Attempting automatic re-login");
            match self.relogin().await {
                Ok(LoginOutcome::Online(_)) => return,
                Ok(LoginOutcome::CaptchaRequired { .. }) => {
                    warn!(
                        target: "Client",
                        "Re-login hit a verification challenge; waiting for submit_captcha"
                    );
                    return;
                }
                Ok(LoginOutcome::Rejected { code, message }) => {
                    warn!(
                        target: "Client",
                        "Re-login rejected ({code}): {message}; giving up"
                    );
                    return;
                }
                Err(e) => {
                    warn!(target: "Client", "Re-login failed: {e}");
                    // Keep the machine in Reconnecting for the next round.
                    if self.state() == SessionState::Disconnected {
                        self.set_state(SessionState::Reconnecting);
                    }
                }
            }
        }
    }

    /// A `Kickoff` push: the account logged in elsewhere. Either accept
    /// displacement (terminate) or, when configured, displace back after
    /// a short delay.
    pub(crate) async fn handle_kickoff(self: &Arc<Self>, message: String, time: i64) {
        warn!(target: "Client", "Displaced by a login elsewhere: {message}");
        self.expected_disconnect.store(true, Ordering::Relaxed);
        if let Some(transport) = self.transport.lock().await.take() {
            transport.disconnect().await;
        }
        self.fail_all_pending();

        let counter_kick = self.config.kickoff && self.credential.lock().await.is_some();
        self.set_state(if counter_kick {
            SessionState::Reconnecting
        } else {
            SessionState::Terminated
        });
        self.dispatch_event_at(time, EventKind::System(SystemEvent::OfflineKickoff { message }));

        if counter_kick {
            let delay = Duration::from_secs(self.config.counter_kick_delay_secs);
            let client = self.clone();
            let counter_kick_fut: std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> =
                Box::pin(async move {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = client.shutdown_notifier.notified() => return,
                    }
                    if client.state() != SessionState::Reconnecting {
                        return;
                    }
                    info!(target: "Client", "Counter-kick: re-submitting credentials");
                    if let Err(e) = client.relogin().await {
                        warn!(target: "Client", "Counter-kick login failed: {e}");
                    }
                });
            tokio::spawn(counter_kick_fut);
        }
    }

    /// Closes the connection and parks the machine in `next`. Pending
    /// operations are swept, the remote end is not notified beyond the
    /// socket close.
    pub(crate) async fn teardown_connection(&self, next: SessionState) {
        self.expected_disconnect.store(true, Ordering::Relaxed);
        if let Some(transport) = self.transport.lock().await.take() {
            transport.disconnect().await;
        }
        self.fail_all_pending();
        self.set_state(next);
    }
}
