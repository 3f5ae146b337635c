// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Main entry point for Sentinel Identity

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use sentinel_identity::config::Config;
use sentinel_identity::core::context::RequestContext;
use sentinel_identity::service::IdentityService;
use sentinel_identity::telemetry::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "sentinel-identity")]
#[command(about = "Identity resolution service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Keep trust material fresh until interrupted
    Serve,

    /// Verify one bearer token and print the resolved claims
    Verify {
        /// Bearer token (without the `Bearer ` prefix)
        #[arg(long)]
        token: String,

        /// Tenant name to resolve into
        #[arg(long)]
        tenant: Option<String>,

        /// Seconds to wait for the first JWKS refresh
        #[arg(long, default_value_t = 10)]
        wait_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(&config).context("Failed to initialize tracing")?;

    info!(service = %config.service_name, "Starting Sentinel Identity");

    let service = IdentityService::connect(config)
        .await
        .context("Failed to initialize identity service")?;

    let shutdown = CancellationToken::new();
    let refresher = service.start_refresher(&shutdown)?;

    match cli.command {
        Commands::Serve => {
            if refresher.is_none() {
                info!("Nothing to refresh, exiting");
                return Ok(());
            }
            shutdown_signal().await;
        }
        Commands::Verify {
            token,
            tenant,
            wait_secs,
        } => {
            if refresher.is_some() {
                wait_for_keys(&service, Duration::from_secs(wait_secs)).await;
            }
            let ctx = RequestContext::new().with_timeout(Duration::from_secs(30));
            match service.resolver.verify(&ctx, token.trim(), tenant.as_deref()).await {
                Ok(claims) => println!("{}", serde_json::to_string_pretty(&claims)?),
                Err(e) => {
                    error!(error = %e, "Verification failed");
                    shutdown.cancel();
                    return Err(anyhow::anyhow!(e.user_message()));
                }
            }
        }
    }

    shutdown.cancel();
    if let Some(handle) = refresher {
        handle.shutdown().await;
    }
    info!("Shutdown complete");
    Ok(())
}

/// Wait until the first key snapshot is published or `limit` elapses.
async fn wait_for_keys(service: &IdentityService, limit: Duration) {
    let mut updates = service.trust.subscribe();
    if tokio::time::timeout(limit, updates.changed()).await.is_err() {
        info!(wait_secs = limit.as_secs(), "No JWKS snapshot yet, verifying with static keys only");
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            info!("SIGTERM received, starting graceful shutdown");
        },
    }
}
