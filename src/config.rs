use std::path::PathBuf;

/// Per-client configuration. The defaults are what almost every caller
/// wants; construct with `ClientConfig::default()` and override fields.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Log verbosity hint recorded in `get_status()`. Filtering itself is
    /// the log sink's business (`RUST_LOG` / `env_logger`).
    pub log_level: String,
    /// Platform profile sent during login negotiation.
    pub platform: u8,
    /// When displaced by a login elsewhere, try to displace it back.
    pub kickoff: bool,
    /// Drop group-message pushes sent by the logged-in account.
    pub ignore_self: bool,
    /// Retry a throttled message once with the fragmented encoding.
    pub resend: bool,
    /// Directory holding per-account session/device artifacts.
    pub data_dir: PathBuf,
    /// Seconds between automatic re-login attempts after a network loss.
    /// 0 disables automatic reconnection.
    pub reconn_interval: u64,
    /// Seconds to wait before the counter-kick re-login when `kickoff` is
    /// set.
    pub counter_kick_delay_secs: u64,
    /// Manual remote address override; the factory default is used when
    /// unset.
    pub remote_addr: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            platform: 2,
            kickoff: false,
            ignore_self: true,
            resend: true,
            data_dir: PathBuf::from("data"),
            reconn_interval: 5,
            counter_kick_delay_secs: 3,
            remote_addr: None,
        }
    }
}
