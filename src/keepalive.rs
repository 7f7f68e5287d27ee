use crate::client::Client;
use crate::wire::{Command, Reply};
use log::{debug, info, warn};
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

const KEEP_ALIVE_INTERVAL_MIN: Duration = Duration::from_secs(20);
const KEEP_ALIVE_INTERVAL_MAX: Duration = Duration::from_secs(30);
const KEEP_ALIVE_MAX_FAIL_TIME: Duration = Duration::from_secs(180);
const KEEP_ALIVE_RESPONSE_DEADLINE: Duration = Duration::from_secs(20);

impl Client {
    /// Sends a single heartbeat and waits for the ack.
    /// Returns true on success, false on failure.
    async fn send_keepalive(&self) -> bool {
        if !self.is_online() {
            return false;
        }

        debug!(target: "Client/Keepalive", "Sending heartbeat");
        match self
            .send_command_with_timeout(Command::Heartbeat, KEEP_ALIVE_RESPONSE_DEADLINE)
            .await
        {
            Ok(Reply::Ack) => {
                debug!(target: "Client/Keepalive", "Heartbeat acknowledged");
                true
            }
            Ok(other) => {
                // The connection is alive even if the server answered oddly.
                warn!(target: "Client/Keepalive", "Unexpected heartbeat reply: {other:?}");
                true
            }
            Err(e) => {
                warn!(target: "Client/Keepalive", "Heartbeat failed: {e:?}");
                false
            }
        }
    }

    /// The main keepalive loop. Spawned per connection after login;
    /// exits when the connection it was started for is gone.
    pub(crate) async fn keepalive_loop(self: Arc<Self>, generation: u64) {
        let mut last_success = chrono::Utc::now();
        let mut error_count = 0u32;

        loop {
            let interval_ms = rand::rng().random_range(
                KEEP_ALIVE_INTERVAL_MIN.as_millis()..=KEEP_ALIVE_INTERVAL_MAX.as_millis(),
            );
            let interval = Duration::from_millis(interval_ms as u64);

            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if self.connection_generation.load(Ordering::SeqCst) != generation
                        || !self.is_online()
                    {
                        debug!(target: "Client/Keepalive", "Connection gone, exiting keepalive loop");
                        return;
                    }

                    if self.send_keepalive().await {
                        if error_count > 0 {
                            info!(target: "Client/Keepalive", "Heartbeat restored");
                        }
                        error_count = 0;
                        last_success = chrono::Utc::now();
                    } else {
                        error_count += 1;
                        warn!(target: "Client/Keepalive", "Heartbeat timeout, error count: {error_count}");

                        let failing_for = (chrono::Utc::now() - last_success).num_seconds();
                        if failing_for > KEEP_ALIVE_MAX_FAIL_TIME.as_secs() as i64 {
                            warn!(
                                target: "Client/Keepalive",
                                "No heartbeat ack for over {}s, forcing reconnect",
                                KEEP_ALIVE_MAX_FAIL_TIME.as_secs()
                            );
                            if let Some(transport) = self.transport.lock().await.take() {
                                transport.disconnect().await;
                            }
                            self.on_connection_lost(generation).await;
                            return;
                        }
                    }
                },
                _ = self.shutdown_notifier.notified() => {
                    debug!(target: "Client/Keepalive", "Shutdown signaled, exiting keepalive loop");
                    return;
                }
            }
        }
    }
}
