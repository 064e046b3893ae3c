//! Async client for the arbiter's TCP protocol.

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;

use crate::bridge::codec::DuplexCodec;
use crate::bridge::protocol::{ClientMessage, RequestId, ResourceTypeId, ServerMessage};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection closed by arbiter")]
    Closed,
}

/// One connection to the arbiter. Dropping it releases everything it holds.
pub struct ArbiterClient {
    framed: Framed<TcpStream, DuplexCodec<ServerMessage, ClientMessage>>,
}

impl ArbiterClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            framed: Framed::new(stream, DuplexCodec::new()),
        })
    }

    pub async fn acquire(
        &mut self,
        id: RequestId,
        resource_type: ResourceTypeId,
        will_wait: bool,
    ) -> Result<(), ClientError> {
        self.framed
            .send(ClientMessage::Acquire {
                id,
                resource_type,
                will_wait,
            })
            .await?;
        Ok(())
    }

    pub async fn release(
        &mut self,
        id: RequestId,
        resource_type: ResourceTypeId,
    ) -> Result<(), ClientError> {
        self.framed
            .send(ClientMessage::Release { id, resource_type })
            .await?;
        Ok(())
    }

    /// Next response in arrival order. Queued acquires answer here once
    /// promoted, interleaved with answers to newer requests.
    pub async fn next_response(&mut self) -> Result<ServerMessage, ClientError> {
        match self.framed.next().await {
            Some(Ok(msg)) => Ok(msg),
            Some(Err(e)) => Err(e.into()),
            None => Err(ClientError::Closed),
        }
    }
}
