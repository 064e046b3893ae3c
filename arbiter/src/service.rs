//! ArbiterService: single-consumer actor around [`ResourceArbiter`].
//!
//! Every call from every connection becomes a [`Command`] on one unbounded
//! queue drained by one task. That task is the only code touching pool state,
//! so promotions for a pool happen in exactly the order releases arrived.
//!
//! Request traffic (`acquire`/`release`/`release_all_for_client`) is
//! fire-and-forget; host operations (`provision`/`snapshot`/`destroy`) wait
//! for the actor's reply.

use tokio::sync::{mpsc, oneshot};

use crate::arbiter::{ProvisionError, ResourceArbiter};
use crate::bridge::protocol::{ClientId, RequestId, ResourceTypeId};
use crate::health::ArbiterSnapshot;
use crate::notify::Notifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("arbiter service stopped")]
    Closed,
    #[error(transparent)]
    Provision(#[from] ProvisionError),
}

#[derive(Debug)]
enum Command {
    Acquire {
        client: ClientId,
        request_id: RequestId,
        resource_type: ResourceTypeId,
        will_wait: bool,
    },
    Release {
        client: ClientId,
        request_id: RequestId,
        resource_type: ResourceTypeId,
    },
    ReleaseAll {
        client: ClientId,
    },
    Provision {
        resource_type: ResourceTypeId,
        capacity: usize,
        reply: oneshot::Sender<Result<(), ProvisionError>>,
    },
    Snapshot {
        reply: oneshot::Sender<ArbiterSnapshot>,
    },
    Destroy {
        reply: oneshot::Sender<()>,
    },
}

pub struct ArbiterService;

impl ArbiterService {
    /// Move `arbiter` onto its own task and return a handle to it.
    ///
    /// The task ends once every handle is dropped.
    pub fn spawn<N>(arbiter: ResourceArbiter<N>) -> ArbiterHandle
    where
        N: Notifier + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(arbiter, rx));
        ArbiterHandle { tx }
    }
}

async fn run<N: Notifier>(mut arbiter: ResourceArbiter<N>, mut rx: mpsc::UnboundedReceiver<Command>) {
    tracing::debug!("Arbiter service started");

    while let Some(command) = rx.recv().await {
        match command {
            Command::Acquire {
                client,
                request_id,
                resource_type,
                will_wait,
            } => arbiter.acquire(client, request_id, resource_type, will_wait),
            Command::Release {
                client,
                request_id,
                resource_type,
            } => arbiter.release(client, request_id, resource_type),
            Command::ReleaseAll { client } => arbiter.release_all_for_client(client),
            Command::Provision {
                resource_type,
                capacity,
                reply,
            } => {
                let _ = reply.send(arbiter.provision(resource_type, capacity));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(arbiter.snapshot());
            }
            Command::Destroy { reply } => {
                arbiter.destroy();
                let _ = reply.send(());
            }
        }
    }

    tracing::debug!("Arbiter service exiting");
}

/// Cloneable handle to a running [`ArbiterService`].
#[derive(Debug, Clone)]
pub struct ArbiterHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl ArbiterHandle {
    fn send(&self, command: Command) -> Result<(), ServiceError> {
        self.tx.send(command).map_err(|_| ServiceError::Closed)
    }

    pub fn acquire(
        &self,
        client: ClientId,
        request_id: RequestId,
        resource_type: ResourceTypeId,
        will_wait: bool,
    ) -> Result<(), ServiceError> {
        self.send(Command::Acquire {
            client,
            request_id,
            resource_type,
            will_wait,
        })
    }

    pub fn release(
        &self,
        client: ClientId,
        request_id: RequestId,
        resource_type: ResourceTypeId,
    ) -> Result<(), ServiceError> {
        self.send(Command::Release {
            client,
            request_id,
            resource_type,
        })
    }

    pub fn release_all_for_client(&self, client: ClientId) -> Result<(), ServiceError> {
        self.send(Command::ReleaseAll { client })
    }

    pub async fn provision(
        &self,
        resource_type: ResourceTypeId,
        capacity: usize,
    ) -> Result<(), ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Provision {
            resource_type,
            capacity,
            reply,
        })?;
        rx.await.map_err(|_| ServiceError::Closed)??;
        Ok(())
    }

    pub async fn snapshot(&self) -> Result<ArbiterSnapshot, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply })?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    /// Stop admitting new requests. Resolves once the actor has applied it.
    pub async fn destroy(&self) -> Result<(), ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Destroy { reply })?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
