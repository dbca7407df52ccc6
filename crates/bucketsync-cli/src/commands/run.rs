//! Run command - Reconcile, then mirror changes until interrupted
//!
//! Provides the `bucketsync run` CLI command which:
//! 1. Merges and validates the configuration
//! 2. Connects to the store and makes sure the bucket exists
//! 3. Uploads every local file (unless reconciliation is disabled)
//! 4. Watches the folder and mirrors each change until SIGINT/SIGTERM

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bucketsync_core::config::Config;
use bucketsync_core::domain::SyncRoot;
use bucketsync_store::{ensure_bucket, BucketStatus, S3RemoteStore};
use bucketsync_sync::{
    EventScheduler, FileWatcher, LoopSummary, Reconciler, SyncLoop, TransferExecutor,
};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::reconcile::print_report;
use super::{CommandContext, RemoteArgs};
use crate::output::{OutputFormat, OutputFormatter};

/// Arguments for the run subcommand
#[derive(Debug, Args)]
pub struct RunCommand {
    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Skip the startup reconciliation pass
    #[arg(long)]
    pub no_reconcile: bool,
}

impl RunCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let config = ctx.load_validated(&self.remote)?;
        let formatter = ctx.formatter();

        let (executor, root) = connect(&config, formatter.as_ref()).await?;

        if config.sync.reconcile_on_start && !self.no_reconcile {
            let report = Reconciler::new(executor.clone())
                .with_max_concurrent(config.transfer.max_concurrent as usize)
                .reconcile()
                .await
                .context("Reconciliation failed")?;
            print_report(&report, ctx.format, formatter.as_ref());
        } else {
            info!("Startup reconciliation skipped");
        }

        let shutdown = CancellationToken::new();
        tokio::spawn(shutdown_signal(shutdown.clone()));

        let (mut watcher, raw_rx) = FileWatcher::new().context("Failed to create file watcher")?;
        watcher
            .watch(root.as_path())
            .with_context(|| format!("Failed to watch {}", root))?;

        let (scheduler, settled_rx) = EventScheduler::new(
            raw_rx,
            Duration::from_millis(config.watch.debounce_ms),
            Duration::from_millis(config.watch.poll_interval_ms),
        );
        tokio::spawn(scheduler.run(shutdown.clone()));

        let sync_loop =
            SyncLoop::new(executor).with_delete_renamed_source(config.sync.delete_renamed_source);

        formatter.success(&format!(
            "Watching {} -> {}",
            root,
            config.remote.bucket
        ));
        formatter.info("Press Ctrl+C to stop");

        let summary = sync_loop.run(settled_rx, shutdown).await;
        drop(watcher);

        print_summary(&summary, ctx.format, formatter.as_ref());
        Ok(())
    }
}

/// Builds the store client, ensures the bucket, and resolves the sync root
///
/// Each step is a fatal startup condition.
pub(super) async fn connect(
    config: &Config,
    formatter: &dyn OutputFormatter,
) -> Result<(Arc<TransferExecutor>, SyncRoot)> {
    let store = Arc::new(
        S3RemoteStore::new(config).context("Failed to configure object store client")?,
    );

    let status = ensure_bucket(store.as_ref())
        .await
        .with_context(|| format!("Failed to prepare bucket '{}'", config.remote.bucket))?;
    match status {
        BucketStatus::Created => {
            formatter.success(&format!("Created bucket {}", config.remote.bucket))
        }
        BucketStatus::Existed => {
            formatter.info(&format!("Bucket {} already exists", config.remote.bucket))
        }
    }

    let root = SyncRoot::resolve(&config.sync.folder).with_context(|| {
        format!(
            "Cannot use {} as the sync folder",
            config.sync.folder.display()
        )
    })?;

    let executor = Arc::new(TransferExecutor::new(store, root.clone()));

    Ok((executor, root))
}

fn print_summary(summary: &LoopSummary, format: OutputFormat, formatter: &dyn OutputFormatter) {
    if format == OutputFormat::Json {
        formatter.print_json(&serde_json::json!({
            "events": summary.events,
            "uploaded": summary.uploaded,
            "deleted": summary.deleted,
            "failed": summary.failed,
            "watcher_errors": summary.watcher_errors,
            "ignored": summary.ignored,
        }));
        return;
    }

    formatter.success("Stopped watching");
    formatter.info(&format!("Events:   {}", summary.events));
    formatter.info(&format!("Uploaded: {}", summary.uploaded));
    formatter.info(&format!("Deleted:  {}", summary.deleted));
    if summary.failed > 0 {
        formatter.warn(&format!("{} transfer(s) failed", summary.failed));
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Installs the SIGTERM handler, then waits for SIGTERM or SIGINT and
/// cancels the token
///
/// The SIGTERM handler is in place once this returns, before the future is
/// first polled. A handler that cannot be installed never fires; the other
/// one still can.
fn shutdown_signal(token: CancellationToken) -> impl Future<Output = ()> + Send + 'static {
    #[cfg(unix)]
    let terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate());

    async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match terminate {
                Ok(mut signal) => {
                    signal.recv().await;
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
                info!("Received SIGINT (Ctrl+C)");
            }
            _ = terminate => {
                info!("Received SIGTERM");
            }
        }

        token.cancel();
    }
}
