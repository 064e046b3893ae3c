//! HTTP admin transport (health, pool inspection, provisioning, shutdown).

mod routes;
mod server;

pub use routes::{AdminState, HealthCheckResponse, ProvisionRequest, routes};
pub use server::{serve_admin, shutdown_signal};
