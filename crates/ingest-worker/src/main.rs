use anyhow::Context;
use ingest_core::Config;
use ingest_storage::create_storage;
use ingest_worker::broker::amqp::{AmqpBroker, AmqpSettings};
use ingest_worker::{telemetry, PipelineController, UploadTask};
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;
    telemetry::init_tracing(&config);

    tracing::info!(
        debug = config.debug,
        bucket = %config.bucket_name,
        bucket_folder_path = %config.bucket_folder_path,
        storage_backend = %config.storage_backend,
        amqp_url = %config.redacted_amqp_url(),
        listen_queue = %config.amqp_listen_key,
        response_queue = %config.amqp_response_key,
        ack_mode = ?config.amqp_ack_mode,
        "Configuration loaded"
    );

    let storage = create_storage(&config)
        .await
        .context("Failed to set up object storage")?;

    let broker = AmqpBroker::connect(AmqpSettings::from_config(&config))
        .await
        .context("Failed to connect to AMQP broker")?;
    let mut source = broker
        .consume()
        .await
        .context("Failed to start consuming")?;

    let controller = PipelineController::new(
        UploadTask::new(storage),
        Arc::new(broker.publisher()),
        config.bucket_folder_path.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_state = shutdown_rx.clone();

    let worker = tokio::spawn(async move { controller.run(&mut source, shutdown_rx).await });

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    tracing::info!("Waiting for messages. To exit press CTRL+C");

    let stats = worker.await.context("Consumer task failed")?;
    let requested = *shutdown_state.borrow();

    broker.close().await;

    if !requested {
        return Err(anyhow::anyhow!(
            "Inbound stream closed after {} messages; broker connection lost",
            stats.received
        ));
    }

    tracing::info!("Shut down gracefully");
    Ok(())
}

/// Resolves on Ctrl+C (SIGINT) or SIGTERM.
///
/// If a handler cannot be installed that signal is never observed; the error
/// is logged and the other signal still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
}
