//! Framed codec for client connections.
//!
//! Length-prefixed frames (`LengthDelimitedCodec`, 4-byte big-endian header)
//! carrying one serde_json document each. Works over any AsyncRead/AsyncWrite.
//!
//! The two ends of a connection speak different message types, so one codec
//! decodes `In` and encodes `Out`:
//! - server side: `DuplexCodec<ClientMessage, ServerMessage>`
//! - client side: `DuplexCodec<ServerMessage, ClientMessage>`

use std::io;
use std::marker::PhantomData;

use serde::{Serialize, de::DeserializeOwned};
use tokio_util::bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Largest frame accepted by default. Protocol messages are tiny; anything
/// bigger is a confused or hostile peer.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> io::Result<T> {
    serde_json::from_slice(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn encode_json<T: Serialize>(
    inner: &mut LengthDelimitedCodec,
    item: &T,
    dst: &mut BytesMut,
) -> io::Result<()> {
    let json = serde_json::to_vec(item).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    tracing::trace!(json_size_bytes = json.len(), "Encoding frame");
    inner.encode(Bytes::from(json), dst)
}

/// Codec decoding `In` and encoding `Out` on the same stream.
pub struct DuplexCodec<In, Out> {
    inner: LengthDelimitedCodec,
    _phantom: PhantomData<(In, Out)>,
}

impl<In, Out> Default for DuplexCodec<In, Out> {
    fn default() -> Self {
        Self::new()
    }
}

impl<In, Out> DuplexCodec<In, Out> {
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            inner: LengthDelimitedCodec::builder()
                .length_field_length(4)
                .max_frame_length(max_frame_len)
                .new_codec(),
            _phantom: PhantomData,
        }
    }
}

impl<In: DeserializeOwned, Out> Decoder for DuplexCodec<In, Out> {
    type Item = In;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.inner.decode(src)? {
            Some(bytes) => decode_json(&bytes).map(Some),
            None => Ok(None),
        }
    }
}

impl<In, Out: Serialize> Encoder<Out> for DuplexCodec<In, Out> {
    type Error = io::Error;

    fn encode(&mut self, item: Out, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_json(&mut self.inner, &item, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::protocol::{
        ClientMessage, RejectReason, RequestId, ResourceTypeId, Response, ServerMessage,
    };

    #[test]
    fn frame_has_big_endian_length_prefix() {
        let mut codec = DuplexCodec::<ServerMessage, ClientMessage>::new();
        let mut buf = BytesMut::new();

        codec
            .encode(
                ClientMessage::Release {
                    id: RequestId::new(1),
                    resource_type: ResourceTypeId::new(2),
                },
                &mut buf,
            )
            .unwrap();

        let body_len = buf.len() - 4;
        assert_eq!(&buf[..4], &(body_len as u32).to_be_bytes());
        let body: serde_json::Value = serde_json::from_slice(&buf[4..]).unwrap();
        assert_eq!(body["type"], "release");
    }

    #[test]
    fn partial_frame_waits_for_more_bytes() {
        let mut server_side = DuplexCodec::<ClientMessage, ServerMessage>::new();
        let mut codec = DuplexCodec::<ServerMessage, ClientMessage>::new();
        let mut full = BytesMut::new();
        server_side
            .encode(
                Response::rejected(RequestId::new(3), RejectReason::Unprovisioned)
                    .into_server_message(),
                &mut full,
            )
            .unwrap();

        let mut partial = full.split_to(full.len() - 1);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.unsplit(full);
        let decoded = codec.decode(&mut partial).unwrap().unwrap();
        assert_eq!(decoded.request_id(), RequestId::new(3));
        assert!(!decoded.is_success());
    }

    #[test]
    fn malformed_json_is_invalid_data() {
        let mut codec = DuplexCodec::<ClientMessage, ServerMessage>::new();
        let mut buf = BytesMut::new();
        let body = b"{\"type\":\"explode\"}";
        buf.extend_from_slice(&(body.len() as u32).to_be_bytes());
        buf.extend_from_slice(body);

        let err = codec.decode(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut codec = DuplexCodec::<ClientMessage, ServerMessage>::with_max_frame_len(16);
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&1024u32.to_be_bytes());
        buf.extend_from_slice(&[b' '; 32]);

        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn duplex_decodes_requests_and_encodes_responses() {
        let mut client_side = DuplexCodec::<ServerMessage, ClientMessage>::new();
        let mut server_side = DuplexCodec::<ClientMessage, ServerMessage>::new();
        let mut wire = BytesMut::new();

        client_side
            .encode(
                ClientMessage::Acquire {
                    id: RequestId::new(8),
                    resource_type: ResourceTypeId::new(1),
                    will_wait: false,
                },
                &mut wire,
            )
            .unwrap();
        let request = server_side.decode(&mut wire).unwrap().unwrap();
        assert!(matches!(request, ClientMessage::Acquire { will_wait: false, .. }));

        server_side
            .encode(Response::granted(RequestId::new(8)).into_server_message(), &mut wire)
            .unwrap();
        let response = client_side.decode(&mut wire).unwrap().unwrap();
        assert!(response.is_success());
    }
}
