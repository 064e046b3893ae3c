//! Admin route handlers.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::arbiter::ProvisionError;
use crate::bridge::protocol::ResourceTypeId;
use crate::health::Health;
use crate::host::{ArbiterHost, InstanceInfo};
use crate::service::ServiceError;
use crate::version::VersionInfo;

/// Shared state behind the admin router.
pub struct AdminState {
    pub host: Arc<ArbiterHost>,
    pub shutdown_tx: watch::Sender<bool>,
    pub version: VersionInfo,
}

impl AdminState {
    pub fn new(host: Arc<ArbiterHost>, shutdown_tx: watch::Sender<bool>) -> Arc<Self> {
        Arc::new(Self {
            host,
            shutdown_tx,
            version: VersionInfo::new(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: Health,
    pub version: VersionInfo,
    pub generation: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<InstanceInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ProvisionRequest {
    pub capacity: usize,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

fn service_error_response(e: ServiceError) -> Response {
    match e {
        ServiceError::Provision(ProvisionError::BelowGranted { .. }) => {
            error_response(StatusCode::CONFLICT, e.to_string())
        }
        ServiceError::Provision(ProvisionError::Destroyed) | ServiceError::Closed => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

async fn health_check(State(state): State<Arc<AdminState>>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: state.host.health().await,
        version: state.version.clone(),
        generation: state.host.generation(),
        instance: state.host.instance_info().await,
    })
}

async fn list_pools(State(state): State<Arc<AdminState>>) -> Response {
    let Some(handle) = state.host.current().await else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "no arbiter instance");
    };
    match handle.snapshot().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => service_error_response(e),
    }
}

/// Changes apply to the live instance only; a re-initialised arbiter starts
/// again from the configured pools.
async fn provision_pool(
    State(state): State<Arc<AdminState>>,
    Path(resource_type): Path<u32>,
    Json(request): Json<ProvisionRequest>,
) -> Response {
    let Some(handle) = state.host.current().await else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "no arbiter instance");
    };
    let resource_type = ResourceTypeId::new(resource_type);

    match handle.provision(resource_type, request.capacity).await {
        Ok(()) => match handle.snapshot().await {
            Ok(snapshot) => match snapshot.pool(resource_type) {
                Some(pool) => Json(pool.clone()).into_response(),
                None => error_response(StatusCode::INTERNAL_SERVER_ERROR, "pool vanished"),
            },
            Err(e) => service_error_response(e),
        },
        Err(e) => {
            tracing::warn!(%resource_type, capacity = request.capacity, error = %e, "Provision rejected");
            service_error_response(e)
        }
    }
}

async fn shutdown(State(state): State<Arc<AdminState>>) -> impl IntoResponse {
    tracing::info!("Shutdown requested via admin endpoint");
    let _ = state.shutdown_tx.send(true);
    StatusCode::OK
}

pub fn routes(state: Arc<AdminState>) -> Router {
    Router::new()
        .route("/health-check", get(health_check))
        .route("/pools", get(list_pools))
        .route("/pools/{resource_type}", post(provision_pool))
        .route("/shutdown", post(shutdown))
        .with_state(state)
}
