//! Wire bridge between the arbiter and its clients.
//!
//! # Architecture
//!
//! - **protocol**: Identifiers and message types (ClientMessage/ServerMessage)
//! - **codec**: Length-prefixed JSON framing for AsyncRead/AsyncWrite

pub mod codec;
pub mod protocol;
