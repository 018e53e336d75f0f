use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use equipdash_core::{
    derive, DashboardConfig, DashboardController, DashboardState, HttpSummaryClient, ReportArchive,
    SummaryClient, UploadFile, UploadOutcome,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod viewer;

#[derive(Debug, Parser)]
#[command(name = "equipdash")]
#[command(about = "Chemical equipment dataset dashboard client")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, default_value = "http://127.0.0.1:8000/api")]
    base_url: String,

    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,

    #[arg(long, default_value_t = 5_000)]
    connect_timeout_ms: u64,

    #[arg(long, default_value = "./reports")]
    report_dir: PathBuf,

    #[arg(long, default_value_t = 30)]
    retention_days: u64,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the latest dataset summary.
    Summary {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    /// Upload a CSV file and print the refreshed summary.
    Upload {
        path: PathBuf,
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    /// List the most recent uploads.
    History {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    /// Download the PDF report of the latest dataset.
    Export,
    /// Interactive terminal dashboard.
    View,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let config = DashboardConfig {
        base_url: cli.base_url,
        request_timeout: Duration::from_millis(cli.timeout_ms),
        connect_timeout: Duration::from_millis(cli.connect_timeout_ms),
        report_dir: cli.report_dir,
        report_retention_days: cli.retention_days,
    };

    let client = Arc::new(HttpSummaryClient::new(&config)?);
    let archive = ReportArchive::new(config.report_dir.clone(), config.report_retention_days);
    let mut controller = DashboardController::new(Arc::clone(&client), archive.clone());

    match cli.command {
        Command::Summary { format } => {
            controller.mount().await;
            print_state(controller.state(), format)?;
            fail_on_error(controller.state())?;
        }
        Command::Upload { path, format } => {
            let file = UploadFile::read(&path).await?;
            info!(path = %path.display(), bytes = file.bytes.len(), "uploading");
            if controller.upload(Some(file)).await == UploadOutcome::Ignored {
                bail!("upload was not started");
            }
            print_state(controller.state(), format)?;
            fail_on_error(controller.state())?;
        }
        Command::History { format } => {
            let history = client.fetch_history().await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&history)?),
                OutputFormat::Human => {
                    if history.is_empty() {
                        println!("No uploads yet.");
                    }
                    for record in &history {
                        let when = record
                            .uploaded_at
                            .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
                            .unwrap_or_else(|| "-".repeat(16));
                        println!("{:>4}  {:<16}  {}", record.id, when, record.file_name);
                    }
                }
            }
        }
        Command::Export => {
            let document = client.export_report().await?;
            let path = archive.store(&document, SystemTime::now())?;
            println!("{}", path.display());
        }
        Command::View => {
            viewer::run_viewer(controller).await?;
        }
    }

    Ok(())
}

fn fail_on_error(state: &DashboardState) -> Result<()> {
    match &state.error {
        Some(message) => bail!("{message}"),
        None => Ok(()),
    }
}

fn print_state(state: &DashboardState, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "state": state,
                "view": state.payload.as_ref().map(derive),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Human => {
            let Some(payload) = &state.payload else {
                println!("Please upload a CSV file.");
                return Ok(());
            };
            let view = derive(payload);

            println!("=== Dashboard Overview ===");
            match payload.uploaded_at {
                Some(ts) => println!("Latest Data: {} ({})", payload.filename, ts.to_rfc3339()),
                None => println!("Latest Data: {}", payload.filename),
            }
            for kpi in &view.kpis {
                println!("  {:<14} {} {}", kpi.title, kpi.value, kpi.unit);
            }

            println!("Equipment Distribution:");
            for (label, count) in view.chart.pairs() {
                println!("  {label:<16} {count}");
            }

            println!("Recent Records:");
            println!("  {:<20} {:<16} {:>8}", "Name", "Type", "Flow");
            for row in &view.preview_rows {
                println!(
                    "  {:<20} {:<16} {:>8}",
                    row.equipment_name, row.equipment_type, row.flowrate
                );
            }
        }
    }

    Ok(())
}
