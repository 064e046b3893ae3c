//! Response delivery from the arbiter to clients.
//!
//! Delivery is fire-and-forget: the arbiter hands a [`Response`] to a
//! [`Notifier`] and moves on. A failed send is logged here and never fed back
//! into arbiter state.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::bridge::protocol::{ClientId, Response, ServerMessage};

/// Capability to deliver a response to one client.
pub trait Notifier: Send + Sync {
    fn send_response(&self, client: ClientId, response: Response);
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn send_response(&self, client: ClientId, response: Response) {
        (**self).send_response(client, response)
    }
}

/// Per-connection outbound queues, keyed by [`ClientId`].
///
/// The transport registers a client on accept and drains the returned
/// receiver into the socket; the arbiter pushes through [`Notifier`].
#[derive(Default)]
pub struct ClientRegistry {
    clients: DashMap<ClientId, mpsc::UnboundedSender<ServerMessage>>,
}

impl ClientRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, client: ClientId) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.clients.insert(client, tx).is_some() {
            tracing::warn!(%client, "Client re-registered, previous outbound queue dropped");
        }
        rx
    }

    pub fn unregister(&self, client: ClientId) {
        self.clients.remove(&client);
    }

    pub fn is_registered(&self, client: ClientId) -> bool {
        self.clients.contains_key(&client)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl Notifier for ClientRegistry {
    fn send_response(&self, client: ClientId, response: Response) {
        let Some(tx) = self.clients.get(&client) else {
            tracing::debug!(%client, request_id = %response.request_id, "Response for unknown client dropped");
            return;
        };
        if tx.send(response.into_server_message()).is_err() {
            tracing::warn!(%client, request_id = %response.request_id, "Client outbound queue closed, response dropped");
        }
    }
}

/// Notifier that records every response, for tests.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    sent: std::sync::Mutex<Vec<(ClientId, Response)>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Drain everything recorded so far.
    pub(crate) fn take(&self) -> Vec<(ClientId, Response)> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn send_response(&self, client: ClientId, response: Response) {
        self.sent.lock().unwrap().push((client, response));
    }
}
