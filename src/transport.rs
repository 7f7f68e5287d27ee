//! Transport channel: one physical duplex connection to the remote
//! endpoint. The engine only ever sees [`TransportEvent`]s and the
//! [`Transport`] send/disconnect surface, so tests can run the whole
//! client against the in-process [`memory`] implementation.

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, warn};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc};

#[derive(Debug, Clone)]
pub enum TransportEvent {
    Connected,
    DataReceived(Bytes),
    Disconnected,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, data: &[u8]) -> Result<(), anyhow::Error>;
    async fn disconnect(&self);
}

#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create_transport(
        &self,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error>;
}

/// Plain TCP transport.
pub struct TcpTransport {
    writer: Mutex<tokio::net::tcp::OwnedWriteHalf>,
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, data: &[u8]) -> Result<(), anyhow::Error> {
        let mut writer = self.writer.lock().await;
        writer.write_all(data).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn disconnect(&self) {
        if let Err(e) = self.writer.lock().await.shutdown().await {
            debug!(target: "Transport", "Shutdown on close returned: {e}");
        }
    }
}

/// Connects [`TcpTransport`]s to a fixed remote address.
pub struct TcpTransportFactory {
    addr: String,
}

impl TcpTransportFactory {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl TransportFactory for TcpTransportFactory {
    async fn create_transport(
        &self,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error> {
        let stream = tokio::net::TcpStream::connect(&self.addr).await?;
        stream.set_nodelay(true)?;
        let (mut read_half, write_half) = stream.into_split();

        let (event_tx, event_rx) = mpsc::channel(64);
        let _ = event_tx.send(TransportEvent::Connected).await;

        tokio::spawn(async move {
            let mut buf = vec![0u8; 8192];
            loop {
                match read_half.read(&mut buf).await {
                    Ok(0) => {
                        let _ = event_tx.send(TransportEvent::Disconnected).await;
                        return;
                    }
                    Ok(n) => {
                        let data = Bytes::copy_from_slice(&buf[..n]);
                        if event_tx.send(TransportEvent::DataReceived(data)).await.is_err() {
                            // Receiver gone, the connection was abandoned.
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(target: "Transport", "Read failed: {e}");
                        let _ = event_tx.send(TransportEvent::Disconnected).await;
                        return;
                    }
                }
            }
        });

        Ok((Arc::new(TcpTransport {
            writer: Mutex::new(write_half),
        }), event_rx))
    }
}

/// In-process transport used by the test-suite and the demo binary.
///
/// Each `create_transport` call builds a fresh connection and hands its
/// server half to whoever holds the acceptor channel, so reconnect flows
/// behave exactly like they do over a real socket.
pub mod memory {
    use super::*;

    pub struct MemoryTransport {
        to_server: mpsc::UnboundedSender<Bytes>,
        events: mpsc::Sender<TransportEvent>,
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send(&self, data: &[u8]) -> Result<(), anyhow::Error> {
            self.to_server
                .send(Bytes::copy_from_slice(data))
                .map_err(|_| anyhow::anyhow!("peer closed"))
        }

        async fn disconnect(&self) {
            let _ = self.events.try_send(TransportEvent::Disconnected);
        }
    }

    /// Server half of one in-process connection.
    pub struct ServerEnd {
        pub from_client: mpsc::UnboundedReceiver<Bytes>,
        events: mpsc::Sender<TransportEvent>,
    }

    impl ServerEnd {
        /// Injects raw bytes into the client's read loop.
        pub async fn send_raw(&self, data: Vec<u8>) -> bool {
            self.events
                .send(TransportEvent::DataReceived(data.into()))
                .await
                .is_ok()
        }

        /// Simulates a transport-level connection loss.
        pub async fn drop_connection(&self) {
            let _ = self.events.send(TransportEvent::Disconnected).await;
        }
    }

    pub struct MemoryTransportFactory {
        accepts: mpsc::UnboundedSender<ServerEnd>,
    }

    impl MemoryTransportFactory {
        /// Returns the factory plus the acceptor stream yielding one
        /// [`ServerEnd`] per client connection attempt.
        pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerEnd>) {
            let (accepts, acceptor) = mpsc::unbounded_channel();
            (Self { accepts }, acceptor)
        }
    }

    #[async_trait]
    impl TransportFactory for MemoryTransportFactory {
        async fn create_transport(
            &self,
        ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error> {
            let (to_server, from_client) = mpsc::unbounded_channel();
            let (event_tx, event_rx) = mpsc::channel(64);

            let server = ServerEnd {
                from_client,
                events: event_tx.clone(),
            };
            self.accepts
                .send(server)
                .map_err(|_| anyhow::anyhow!("no acceptor listening"))?;

            let _ = event_tx.send(TransportEvent::Connected).await;

            Ok((Arc::new(MemoryTransport {
                to_server,
                events: event_tx,
            }), event_rx))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryTransportFactory;
    use super::*;

    #[tokio::test]
    async fn memory_pair_delivers_bytes_both_ways() {
        let (factory, mut acceptor) = MemoryTransportFactory::new();
        let (transport, mut events) = factory.create_transport().await.unwrap();
        let mut server = acceptor.recv().await.unwrap();

        // Skip the Connected event.
        assert!(matches!(events.recv().await, Some(TransportEvent::Connected)));

        transport.send(b"ping").await.unwrap();
        let got = server.from_client.recv().await.unwrap();
        assert_eq!(&got[..], b"ping");

        assert!(server.send_raw(b"pong".to_vec()).await);
        match events.recv().await {
            Some(TransportEvent::DataReceived(data)) => assert_eq!(&data[..], b"pong"),
            other => panic!("unexpected event: {other:?}"),
        }

        server.drop_connection().await;
        assert!(matches!(
            events.recv().await,
            Some(TransportEvent::Disconnected)
        ));
    }
}
