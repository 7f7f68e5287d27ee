//! Session/protocol engine for the Tern instant-messaging network.
//!
//! One [`Client`] per account: its own login state machine, request
//! correlator, social-graph cache and event hub. See `create_client` for
//! the conventional construction.

pub mod cache;
pub mod client;
pub mod config;
pub mod contact;
pub mod events;
pub mod framing;
pub mod groups;
pub mod handlers;
pub mod keepalive;
pub mod profile;
pub mod request;
pub mod send;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;
pub mod version;
pub mod wire;

pub use client::{
    Client, ClientError, DEFAULT_GATEWAY, Statistics, StatisticsSnapshot, Status, create_client,
};
pub use config::ClientConfig;
pub use events::{EventHub, ListenerId};
pub use request::{DEFAULT_OP_TIMEOUT, OpError};
pub use session::{Credential, LoginOutcome, SessionState};
pub use types::{CallResult, EventData, EventKind, MessageContent, RetError, retcode};
