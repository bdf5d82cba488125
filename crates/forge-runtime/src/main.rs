use anyhow::{Context, Result};
use clap::Parser;
use forge_proto::ReportingChannelServer;
use forge_runtime::config::RuntimeConfig;
use forge_runtime::engine::Engine;
use forge_runtime::events::EventBus;
use forge_runtime::reporting::ReportingChannelHandler;
use forge_runtime::session::SessionManager;
use forge_runtime::store::Store;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let config = RuntimeConfig::parse();
    let paths = config.paths();

    if !paths.hidden_dir.exists() {
        anyhow::bail!(
            "project not initialized at {} (run init first)",
            paths.project_dir.display()
        );
    }

    let store = Store::open(&paths.db_path).context("opening orchestrator store")?;
    let session_manager = SessionManager::new(
        paths.project_dir.clone(),
        config.worker_cmd.clone(),
        config.worker_args.clone(),
    );
    let event_bus = EventBus::new();
    let engine = Engine::new(
        store,
        session_manager,
        event_bus,
        Default::default(),
        config.project_id.clone(),
        paths.briefs_dir.clone(),
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal");
            shutdown.cancel();
        }
    });

    let reporting_handler = ReportingChannelHandler::new(paths.db_path.clone(), Default::default());
    let socket_path = paths.reporting_socket.clone();
    let _ = std::fs::remove_file(&socket_path);
    let uds = tokio::net::UnixListener::bind(&socket_path).context("binding reporting channel socket")?;
    let uds_stream = tokio_stream::wrappers::UnixListenerStream::new(uds);

    let server_cancel = cancel.clone();
    let server = tokio::spawn(async move {
        let result = tonic::transport::Server::builder()
            .add_service(ReportingChannelServer::new(reporting_handler))
            .serve_with_incoming_shutdown(uds_stream, server_cancel.cancelled())
            .await;
        if let Err(err) = result {
            error!(error = %err, "reporting channel server exited with an error");
        }
    });

    let run_result = engine.run(cancel.clone()).await;
    cancel.cancel();
    let _ = server.await;

    run_result.map_err(|e| anyhow::anyhow!(e.to_string()))
}
