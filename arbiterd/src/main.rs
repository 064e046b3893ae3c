//! arbiterd: resource arbitration daemon.
//!
//! Serves the client protocol on one port and the admin API on another,
//! provisioning pools from `--pool` flags and `ARBITER_*` variables.

use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use arbiter::config::{ADMIN_ADDR_ENV, CLIENT_ADDR_ENV};
use arbiter::transport::{AdminState, serve_admin, serve_clients, shutdown_signal};
use arbiter::{ARBITER_VERSION, ArbiterConfig, ArbiterHost, PoolConfig};

#[derive(Debug, Parser)]
#[command(name = "arbiterd", version, about = "Resource arbitration daemon")]
struct Args {
    /// Address for client connections
    #[arg(long, env = CLIENT_ADDR_ENV)]
    listen: Option<SocketAddr>,

    /// Address for the admin HTTP API
    #[arg(long, env = ADMIN_ADDR_ENV)]
    admin: Option<SocketAddr>,

    /// Pool to provision as <resource_type>=<capacity>; repeatable.
    /// Overrides entries for the same type from ARBITER_POOLS.
    #[arg(long = "pool", value_name = "TYPE=CAPACITY")]
    pools: Vec<PoolConfig>,

    /// Largest accepted client frame in bytes
    #[arg(long)]
    max_frame_len: Option<usize>,
}

impl Args {
    fn into_config(self, base: ArbiterConfig) -> ArbiterConfig {
        let mut config = base.with_pools(self.pools);
        if let Some(addr) = self.listen {
            config = config.with_client_addr(addr);
        }
        if let Some(addr) = self.admin {
            config = config.with_admin_addr(addr);
        }
        if let Some(len) = self.max_frame_len {
            config = config.with_max_frame_len(len);
        }
        config
    }
}

/// Filter directives for an `ARBITER_LOG` value.
fn log_directives(arbiter_log: Option<&str>) -> String {
    let level = match arbiter_log {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("warn") | Some("warning") => "warn",
        Some("error") => "error",
        _ => "info",
    };
    format!("arbiter={level},arbiterd={level}")
}

/// Initialize tracing with ARBITER_LOG and LOG_FORMAT support.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(log_directives(std::env::var("ARBITER_LOG").ok().as_deref()))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing();

    info!("arbiterd {}", ARBITER_VERSION);

    let config = args.into_config(ArbiterConfig::from_env()?);
    for pool in &config.pools {
        info!(resource_type = %pool.resource_type, capacity = pool.capacity, "Configured pool");
    }

    let host = ArbiterHost::new(config.pools.clone());
    host.init().await.context("failed to start arbiter")?;

    let client_listener = TcpListener::bind(config.client_addr)
        .await
        .with_context(|| format!("failed to bind client address {}", config.client_addr))?;
    let admin_listener = TcpListener::bind(config.admin_addr)
        .await
        .with_context(|| format!("failed to bind admin address {}", config.admin_addr))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let admin_state = AdminState::new(host.clone(), shutdown_tx.clone());

    let signal_rx = shutdown_rx.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_rx).await;
        let _ = shutdown_tx.send(true);
    });

    let clients = serve_clients(
        client_listener,
        host.clone(),
        config.max_frame_len,
        shutdown_rx.clone(),
    );
    let admin = serve_admin(admin_listener, admin_state, shutdown_rx);
    tokio::try_join!(clients, admin)?;

    host.shutdown().await;
    info!("arbiterd stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_pools_override_env_pools() {
        let args = Args::try_parse_from([
            "arbiterd",
            "--pool",
            "1=4",
            "--pool",
            "3=1",
            "--listen",
            "0.0.0.0:9100",
        ])
        .unwrap();
        let base = ArbiterConfig::new().with_pool(1, 2).with_pool(2, 2);

        let config = args.into_config(base);

        assert_eq!(
            config.pools,
            vec![
                PoolConfig::new(1, 4),
                PoolConfig::new(2, 2),
                PoolConfig::new(3, 1),
            ]
        );
        assert_eq!(config.client_addr, "0.0.0.0:9100".parse().unwrap());
        assert_eq!(config.admin_addr, ArbiterConfig::default().admin_addr);
    }

    #[test]
    fn addresses_fall_back_to_env_vars() {
        use clap::CommandFactory;

        let command = Args::command();
        let env_of = |id: &str| {
            command
                .get_arguments()
                .find(|arg| arg.get_id() == id)
                .and_then(|arg| arg.get_env())
                .map(|env| env.to_string_lossy().into_owned())
        };

        assert_eq!(env_of("listen").as_deref(), Some(CLIENT_ADDR_ENV));
        assert_eq!(env_of("admin").as_deref(), Some(ADMIN_ADDR_ENV));
    }

    #[test]
    fn log_directives_cover_both_crates() {
        assert_eq!(log_directives(None), "arbiter=info,arbiterd=info");
        assert_eq!(log_directives(Some("warning")), "arbiter=warn,arbiterd=warn");
        assert_eq!(log_directives(Some("bogus")), "arbiter=info,arbiterd=info");
    }

    #[test]
    fn bad_pool_flag_is_rejected() {
        let err = Args::try_parse_from(["arbiterd", "--pool", "gpu"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
