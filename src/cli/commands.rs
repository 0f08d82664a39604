//! Subcommand implementations

use super::{Commands, RunArgs};
use anyhow::{Context, Result};
use qpsbench_core::{EngineConfig, LoadTest, PluginHost, Report, ReportAggregator, WorkloadLoader};
use qpsbench_transport::HttpTransport;
use std::path::Path;
use std::sync::Arc;

/// Run the selected subcommand
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run(args) => run(args).await,
        Commands::Report { input, output } => report(&input, output.as_deref()),
        Commands::Validate {
            workload,
            plugin,
            timeout,
        } => validate(&workload, plugin.as_deref(), timeout),
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let config = match (&args.config, &args.workload) {
        (Some(path), _) => read_config(path)?,
        (None, Some(workload)) => args.engine_config(workload.clone())?,
        (None, None) => anyhow::bail!("either --workload or --config is required"),
    };

    let transport = HttpTransport::with_defaults().context("failed to build HTTP client")?;
    let test = LoadTest::new(config, Arc::new(transport)).with_signal_handling();
    let output = test.run().await?;
    tracing::info!(
        state = %output.dispatch.state,
        submitted = output.dispatch.submitted,
        abandoned = output.dispatch.abandoned,
        peak_in_flight = output.dispatch.peak_in_flight,
        final_rate = output.dispatch.final_rate,
        "Run finished"
    );
    if let Some(path) = test.config().output_path.as_deref() {
        tracing::info!(path = %path.display(), records = output.exported, "Responses exported");
    }

    emit(&output.report, args.report.as_deref())
}

fn read_config(path: &Path) -> Result<EngineConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid config '{}'", path.display()))
}

fn report(input: &Path, output: Option<&Path>) -> Result<()> {
    let file = std::fs::File::open(input)
        .with_context(|| format!("failed to open export '{}'", input.display()))?;
    let report = ReportAggregator::from_export_reader(std::io::BufReader::new(file))?;
    emit(&report, output)
}

fn validate(workload: &Path, plugin: Option<&Path>, timeout: f64) -> Result<()> {
    let timeout = super::seconds("--timeout", timeout, false)?;
    let requests = WorkloadLoader::new(timeout).load_path(workload)?;
    let plugins = PluginHost::load_optional(plugin)?;

    println!(
        "{}: {} requests{}",
        workload.display(),
        requests.len(),
        if plugins.is_active() { ", plugin ok" } else { "" }
    );
    Ok(())
}

/// Print the report and optionally save it
fn emit(report: &Report, path: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    println!("{json}");
    if let Some(path) = path {
        std::fs::write(path, &json)
            .with_context(|| format!("failed to write report '{}'", path.display()))?;
        tracing::info!(path = %path.display(), "Report written");
    }
    Ok(())
}
