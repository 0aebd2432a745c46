//! TCP line server (feature `tcp`).
//!
//! Each accepted connection gets its own [`ProtocolSession`] over the shared
//! drive, so any number of clients can issue commands concurrently. A
//! `watch` channel carries the shutdown signal to the accept loop and every
//! connection task.
//!
//! ```rust,no_run
//! # async fn demo() -> std::io::Result<()> {
//! use std::sync::Arc;
//! use vfd_sim::services::{SharedDrive, TcpLineServer};
//! use vfd_sim::{DriveConfig, DriveEngine};
//!
//! let drive = Arc::new(SharedDrive::new(DriveEngine::new(DriveConfig::default()).unwrap()));
//! let server = TcpLineServer::bind("127.0.0.1:7070", drive).await?;
//! println!("listening on {}", server.local_addr());
//! server.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::protocol::ProtocolSession;
use crate::services::shared::SharedDrive;

/// Bytes read per socket read.
const READ_CHUNK: usize = 256;

/// Handle to a running TCP line server.
#[derive(Debug)]
pub struct TcpLineServer {
    address: SocketAddr,
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl TcpLineServer {
    /// Bind `addr` and start accepting connections.
    pub async fn bind(addr: impl ToSocketAddrs, drive: Arc<SharedDrive>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let address = listener.local_addr()?;
        tracing::info!(%address, "line server listening");

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(accept_loop(listener, drive, shutdown_rx));
        Ok(Self {
            address,
            task,
            shutdown,
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    /// Signal every task to stop and wait for the accept loop.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            tracing::error!(%err, "line server task failed");
        }
        tracing::info!(address = %self.address, "line server stopped");
    }
}

async fn accept_loop(
    listener: TcpListener,
    drive: Arc<SharedDrive>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut connections = Vec::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::info!(%peer, "client connected");
                    let session = ProtocolSession::new(Arc::clone(&drive));
                    connections.push(tokio::spawn(serve_connection(
                        stream,
                        peer,
                        session,
                        shutdown.clone(),
                    )));
                    connections.retain(|task: &JoinHandle<()>| !task.is_finished());
                }
                Err(err) => tracing::warn!(%err, "accept failed"),
            },
            _ = shutdown.changed() => break,
        }
    }
    for task in connections {
        let _ = task.await;
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    mut session: ProtocolSession<Arc<SharedDrive>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = [0u8; READ_CHUNK];
    loop {
        let n = tokio::select! {
            read = stream.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) => {
                    tracing::warn!(%peer, %err, "client read failed");
                    break;
                }
            },
            _ = shutdown.changed() => break,
        };

        let reply = session.feed(&buf[..n]);
        if reply.is_empty() {
            continue;
        }
        if let Err(err) = stream.write_all(reply.as_bytes()).await {
            tracing::warn!(%peer, %err, "client write failed");
            break;
        }
    }
    let _ = stream.shutdown().await;
    tracing::info!(%peer, lines = session.handled(), "client disconnected");
}
