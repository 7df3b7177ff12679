//! Rendering review reports for the terminal.

use std::io::{self, Write};

use capsim_core::{format_cpu, format_memory};
use capsim_simulator::{ReviewReport, WorkloadReviewResult, CATEGORY_FAILED};
use clap::ValueEnum;

/// Output format of the `run` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables.
    #[default]
    Text,
    /// The full report as pretty-printed JSON.
    Json,
}

/// Write `report` in the requested format.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn render(report: &ReviewReport, format: OutputFormat, out: &mut impl Write) -> io::Result<()> {
    match format {
        OutputFormat::Text => render_text(report, out),
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, report)?;
            writeln!(out)
        }
    }
}

fn header(out: &mut impl Write, title: &str) -> io::Result<()> {
    let rule = "=".repeat(33);
    writeln!(out, "{rule} {title} {rule}")
}

fn requirements(result: &WorkloadReviewResult) -> String {
    let resources = &result.resources;
    let mut text = format!(
        "CPU: {}, Memory: {}",
        format_cpu(resources.milli_cpu),
        format_memory(resources.memory)
    );
    if resources.gpu > 0 {
        text.push_str(&format!(", GPU: {}", resources.gpu));
    }
    for (name, amount) in &resources.scalar {
        text.push_str(&format!(", {name}: {amount}"));
    }
    text
}

fn table(out: &mut impl Write, workloads: &[WorkloadReviewResult]) -> io::Result<()> {
    let rows: Vec<(String, &str)> = workloads
        .iter()
        .map(|w| (requirements(w), w.host.as_deref().unwrap_or("-")))
        .collect();
    let width = rows
        .iter()
        .map(|(req, _)| req.len())
        .chain(std::iter::once("REQUIREMENTS".len()))
        .max()
        .unwrap_or_default();

    writeln!(out, "{:<width$}  HOST", "REQUIREMENTS")?;
    for (req, host) in rows {
        writeln!(out, "{req:<width$}  {host}")?;
    }
    Ok(())
}

/// Write the successful and failed workloads as tables, followed by the
/// reason the run stopped.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn render_text(report: &ReviewReport, out: &mut impl Write) -> io::Result<()> {
    header(out, "Successful Pods")?;
    table(out, report.successful())?;
    writeln!(out)?;

    header(out, "Failed Pods")?;
    if let Some(failed) = report.category(CATEGORY_FAILED) {
        writeln!(out, "Pods summary:")?;
        for (reason, workloads) in &failed.status.reason_summary {
            writeln!(out, "\t- {reason}: {}", workloads.len())?;
        }
    }
    table(out, report.failed())?;
    writeln!(out)?;

    writeln!(out, "Stop reason: {}", report.fail_reason.fail_message)
}
