//! Reconcile command - One-shot upload of the whole folder
//!
//! Runs the same startup pass as `bucketsync run` and exits. The exit
//! status is non-zero when any file failed to upload.

use anyhow::{Context, Result};
use bucketsync_sync::{ReconcileReport, Reconciler};
use clap::Args;

use super::run::connect;
use super::{CommandContext, RemoteArgs};
use crate::output::{OutputFormat, OutputFormatter};

/// Arguments for the reconcile subcommand
#[derive(Debug, Args)]
pub struct ReconcileCommand {
    #[command(flatten)]
    pub remote: RemoteArgs,
}

impl ReconcileCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let config = ctx.load_validated(&self.remote)?;
        let formatter = ctx.formatter();

        let (executor, _root) = connect(&config, formatter.as_ref()).await?;

        let report = Reconciler::new(executor)
            .with_max_concurrent(config.transfer.max_concurrent as usize)
            .reconcile()
            .await
            .context("Reconciliation failed")?;

        print_report(&report, ctx.format, formatter.as_ref());

        if !report.is_clean() {
            anyhow::bail!("{} of {} file(s) failed to upload", report.failed, report.outcomes.len());
        }
        Ok(())
    }
}

pub(super) fn print_report(
    report: &ReconcileReport,
    format: OutputFormat,
    formatter: &dyn OutputFormatter,
) {
    if format == OutputFormat::Json {
        let failures: Vec<serde_json::Value> = report
            .failures()
            .map(|f| {
                serde_json::json!({
                    "path": f.path.display().to_string(),
                    "reason": f.failure_reason().unwrap_or_default(),
                })
            })
            .collect();
        formatter.print_json(&serde_json::json!({
            "uploaded": report.uploaded,
            "failed": report.failed,
            "bytes": report.bytes,
            "duration_ms": report.duration_ms,
            "failures": failures,
        }));
        return;
    }

    formatter.success(&format!(
        "Reconciled {} file(s), {} in {} ms",
        report.uploaded,
        format_bytes(report.bytes),
        report.duration_ms
    ));
    for failure in report.failures() {
        formatter.warn(&format!(
            "{}: {}",
            failure.path.display(),
            failure.failure_reason().unwrap_or_default()
        ));
    }
}

/// Formats a byte count with a binary unit suffix
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
