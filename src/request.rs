use crate::client::Client;
use crate::framing::encode_frame;
use crate::wire::{ClientFrame, CodecError, Command, Reply};
use log::{debug, warn};
use std::sync::atomic::Ordering;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::timeout;

/// Default deadline for one submitted operation. Generous on purpose:
/// the server is allowed to be slow, the caller is not allowed to hang
/// forever.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(30);

/// Failure modes of a submitted operation.
#[derive(Debug, Error)]
pub enum OpError {
    #[error("client is not connected")]
    NotConnected,
    #[error("operation timed out")]
    Timeout,
    #[error("connection lost")]
    ConnectionLost,
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("internal channel closed unexpectedly")]
    ChannelClosed,
}

/// One outstanding operation, owned by the pending table until its first
/// completion (reply, timeout, or connection-loss sweep).
pub(crate) struct PendingOp {
    pub(crate) tag: &'static str,
    pub(crate) tx: oneshot::Sender<Result<Reply, OpError>>,
}

impl Client {
    /// Allocates a correlation sequence that is unique among the
    /// operations currently outstanding on this connection. Wrap-around
    /// reuse is fine once the previous holder retired.
    fn next_seq(&self) -> u32 {
        loop {
            let seq = self.seq_counter.fetch_add(1, Ordering::Relaxed);
            if !self.pending.contains_key(&seq) {
                return seq;
            }
        }
    }

    /// Stamps a sequence on the command, records the pending operation
    /// and writes the framed payload to the transport. The returned
    /// receiver resolves on reply, loss sweep, or never (the caller is
    /// expected to apply its own deadline — `send_command` does).
    pub(crate) async fn submit(
        &self,
        command: Command,
    ) -> Result<(u32, oneshot::Receiver<Result<Reply, OpError>>), OpError> {
        let transport = self
            .transport
            .lock()
            .await
            .clone()
            .ok_or(OpError::NotConnected)?;

        let tag = command.tag();
        let seq = self.next_seq();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(seq, PendingOp { tag, tx });

        let payload = match self.codec.encode(&ClientFrame { seq, command }) {
            Ok(payload) => payload,
            Err(e) => {
                self.pending.remove(&seq);
                return Err(e.into());
            }
        };
        let framed = match encode_frame(&payload) {
            Ok(framed) => framed,
            Err(e) => {
                self.pending.remove(&seq);
                return Err(OpError::Send(e.to_string()));
            }
        };

        if let Err(e) = transport.send(&framed).await {
            self.pending.remove(&seq);
            return Err(OpError::Send(e.to_string()));
        }

        self.stats.sent_pkt_cnt.fetch_add(1, Ordering::Relaxed);
        debug!(target: "Client/Correlator", "--> {tag} (seq {seq})");
        Ok((seq, rx))
    }

    pub(crate) async fn send_command(&self, command: Command) -> Result<Reply, OpError> {
        self.send_command_with_timeout(command, DEFAULT_OP_TIMEOUT)
            .await
    }

    /// Submits and awaits the reply under a deadline. Deadline expiry
    /// retires the sequence; a reply arriving later is discarded by
    /// `complete_reply` as a late reply.
    pub(crate) async fn send_command_with_timeout(
        &self,
        command: Command,
        deadline: Duration,
    ) -> Result<Reply, OpError> {
        let tag = command.tag();
        let (seq, rx) = self.submit(command).await?;

        match timeout(deadline, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(OpError::ChannelClosed),
            Err(_) => {
                if self.pending.remove(&seq).is_some() {
                    self.stats.lost_pkt_cnt.fetch_add(1, Ordering::Relaxed);
                    warn!(target: "Client/Correlator", "Operation {tag} (seq {seq}) timed out");
                }
                Err(OpError::Timeout)
            }
        }
    }

    /// Routes an inbound reply to its waiter. First completion wins: the
    /// pending entry is removed before the slot is filled, so a timeout
    /// racing this delivery can never complete the operation twice.
    pub(crate) fn complete_reply(&self, seq: u32, reply: Reply) {
        match self.pending.remove(&seq) {
            Some((_, op)) => {
                debug!(target: "Client/Correlator", "<-- {} (seq {seq})", op.tag);
                if op.tx.send(Ok(reply)).is_err() {
                    debug!(
                        target: "Client/Correlator",
                        "Waiter for seq {seq} is gone, dropping its reply"
                    );
                }
            }
            None => {
                debug!(
                    target: "Client/Correlator",
                    "Discarding late reply for retired seq {seq}"
                );
            }
        }
    }

    /// Connection-loss sweep: every still-pending operation on this
    /// connection fails with `ConnectionLost`.
    pub(crate) fn fail_all_pending(&self) {
        let seqs: Vec<u32> = self.pending.iter().map(|entry| *entry.key()).collect();
        if seqs.is_empty() {
            return;
        }
        warn!(
            target: "Client/Correlator",
            "Failing {} in-flight operation(s) after connection loss",
            seqs.len()
        );
        for seq in seqs {
            if let Some((_, op)) = self.pending.remove(&seq) {
                let _ = op.tx.send(Err(OpError::ConnectionLost));
            }
        }
    }
}
