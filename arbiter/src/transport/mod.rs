//! Transports in front of the arbiter.
//!
//! - **tcp**: the client protocol (framed JSON, one connection per client)
//! - **http**: operator-facing admin API via axum

pub mod http;
pub mod tcp;

pub use http::{AdminState, serve_admin, shutdown_signal};
pub use tcp::serve_clients;
