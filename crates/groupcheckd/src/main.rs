mod authority;
mod cli;
mod config;
mod transport;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use cred_resolver::ProcSystem;
use decision_log::DecisionSink;
use policy_store::load_path;

use crate::authority::Authority;
use crate::cli::Cli;
use crate::transport::{BusListener, BusSystem, PeerDirectory};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args.
    let cli = Cli::parse();

    // 2. Load config, then merge CLI overrides.
    let mut cfg = config::load(&cli.config)?;

    if let Some(ref policy) = cli.policy {
        cfg.policy_path = Some(policy.clone());
    }
    if let Some(ref socket) = cli.socket {
        cfg.socket_path = socket.clone();
    }

    // 3. Init tracing-subscriber with JSON format.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    info!(
        config_file = %cli.config.display(),
        socket = %cfg.socket_path.display(),
        bus_name = authority::BUS_NAME,
        object_path = authority::OBJECT_PATH,
        "groupcheckd starting"
    );

    // 4. Locate and load the policy. No policy means the daemon cannot
    //    answer anything; refuse to start rather than deny everything
    //    silently.
    let policy_source = match cfg.policy_path.clone().or_else(config::find_policy_source) {
        Some(path) => path,
        None => bail!(
            "no policy found: pass --policy or create {} or {}",
            config::DYNAMIC_POLICY_PATH,
            config::DEFAULT_POLICY_PATH
        ),
    };

    let store = load_path(&policy_source)
        .with_context(|| format!("failed to load policy from {}", policy_source.display()))?;

    info!(
        source = %policy_source.display(),
        actions = store.len(),
        "policy loaded"
    );

    // 5. Start the decision logger.
    let (decisions, _log_handle) = DecisionSink::start(&cfg.logging.decision_log_path)
        .await
        .context("failed to start decision logger")?;

    // 6. Wire credential resolution through the peer directory so bus-name
    //    subjects resolve like process subjects.
    let peers = Arc::new(PeerDirectory::new());
    let system = BusSystem::new(ProcSystem::new(), Arc::clone(&peers));

    let authority = Arc::new(Authority::new(Arc::new(store), Arc::new(system), decisions));

    // 7. Set up shutdown signal (ctrl_c + SIGTERM).
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    let shutdown_tx_signal = shutdown_tx.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => {
                    info!("received SIGINT (ctrl-c)");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM");
                }
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            info!("received SIGINT (ctrl-c)");
        }

        let _ = shutdown_tx_signal.send(());
    });

    // 8. Serve until shutdown.
    let listener = BusListener::new(cfg.socket_path.clone(), authority, peers);
    listener.run(shutdown_tx.subscribe()).await?;

    info!("groupcheckd shutting down");

    Ok(())
}
