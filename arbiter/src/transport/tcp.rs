//! Client transport: framed JSON over TCP.
//!
//! Each accepted connection becomes one client:
//! 1. Mint a [`ClientId`] and register an outbound queue
//! 2. Pump inbound requests into the arbiter, outbound responses to the socket
//! 3. On EOF, protocol error, write error, or shutdown: release everything the
//!    client holds (exactly once) and unregister it

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::codec::Framed;

use crate::bridge::codec::DuplexCodec;
use crate::bridge::protocol::{ClientId, ClientMessage, ServerMessage};
use crate::host::ArbiterHost;
use crate::service::{ArbiterHandle, ServiceError};

/// Accept clients until shutdown is signalled.
pub async fn serve_clients(
    listener: TcpListener,
    host: Arc<ArbiterHost>,
    max_frame_len: usize,
    mut shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "Accepting arbiter clients");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept client connection");
                        continue;
                    }
                };
                let host = Arc::clone(&host);
                let shutdown_rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    handle_connection(stream, peer, host, max_frame_len, shutdown_rx).await;
                });
            }
            _ = shutdown_requested(&mut shutdown_rx) => {
                tracing::info!("Client listener shutting down");
                break;
            }
        }
    }

    Ok(())
}

async fn shutdown_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    while !*shutdown_rx.borrow_and_update() {
        if shutdown_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    host: Arc<ArbiterHost>,
    max_frame_len: usize,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let handle = match host.get().await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(%peer, error = %e, "No arbiter available, dropping connection");
            return;
        }
    };

    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(%peer, error = %e, "Failed to set TCP_NODELAY");
    }

    let client = ClientId::new();
    let mut outbound = host.registry().register(client);
    let mut framed = Framed::new(
        stream,
        DuplexCodec::<ClientMessage, ServerMessage>::with_max_frame_len(max_frame_len),
    );
    tracing::debug!(%client, %peer, "Client connected");

    loop {
        tokio::select! {
            inbound = framed.next() => {
                match inbound {
                    Some(Ok(message)) => {
                        if let Err(e) = dispatch(&handle, client, message) {
                            tracing::warn!(%client, error = %e, "Arbiter unavailable, closing connection");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(%client, %peer, error = %e, "Client protocol error");
                        break;
                    }
                    None => {
                        tracing::debug!(%client, %peer, "Client disconnected");
                        break;
                    }
                }
            }
            Some(message) = outbound.recv() => {
                if let Err(e) = framed.send(message).await {
                    tracing::warn!(%client, %peer, error = %e, "Failed to write response");
                    break;
                }
            }
            _ = shutdown_requested(&mut shutdown_rx) => {
                tracing::debug!(%client, "Closing client connection for shutdown");
                break;
            }
        }
    }

    if let Err(e) = handle.release_all_for_client(client) {
        tracing::debug!(%client, error = %e, "Arbiter gone before client cleanup");
    }
    host.registry().unregister(client);
}

fn dispatch(handle: &ArbiterHandle, client: ClientId, message: ClientMessage) -> Result<(), ServiceError> {
    match message {
        ClientMessage::Acquire {
            id,
            resource_type,
            will_wait,
        } => handle.acquire(client, id, resource_type, will_wait),
        ClientMessage::Release { id, resource_type } => handle.release(client, id, resource_type),
    }
}
