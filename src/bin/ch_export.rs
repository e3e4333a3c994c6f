//! Command-line export of Companies House records to CSV.
//!
//! Usage:
//!   ch-export search "Swaravow"
//!   ch-export company 07496944 --data-dir ./out
//!
//! The credential is read from `CH_API_KEY` or the credential file, as for the server.
//! Ctrl-C stops a keyword run: companies not yet started are reported as cancelled.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::sync::watch;

use rust_ch_retrieval::config::Config;
use rust_ch_retrieval::registry_client::RegistryClient;
use rust_ch_retrieval::retrieval::{CompanyRetriever, RetrievalOptions};
use rust_ch_retrieval::search::{BatchSummary, CompanyOutcome, SearchOrchestrator, SearchParams};
use rust_ch_retrieval::sink::CsvSink;

#[derive(Parser, Debug)]
#[command(name = "ch-export")]
#[command(about = "Export Companies House records to CSV tables")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output directory (overrides DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Skip fetching each officer's appointment history
    #[arg(long, global = true)]
    no_appointments: bool,

    /// Skip fetching charges
    #[arg(long, global = true)]
    no_charges: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search by keyword and export every matching company
    Search {
        keyword: String,

        #[arg(long, default_value_t = 25)]
        items_per_page: u32,

        #[arg(long, default_value_t = 0)]
        start_index: u32,
    },
    /// Export a single company by number
    Company { number: String },
}

fn print_summary(summary: &BatchSummary) {
    for outcome in &summary.companies {
        match outcome {
            CompanyOutcome::Succeeded { report } => {
                println!(
                    "  ✓ {} {} ({} officers, {} PSCs, {} charges{})",
                    report.company_number,
                    report.company_name,
                    report.rows.officers,
                    report.rows.significant_control_persons,
                    report.rows.charges,
                    if report.is_complete() {
                        String::new()
                    } else {
                        format!(", {} partial failures", report.failures.len())
                    }
                );
            }
            CompanyOutcome::Failed {
                company_number,
                error,
            } => println!("  ✗ {}: {}", company_number, error),
            CompanyOutcome::Cancelled { company_number } => {
                println!("  - {}: cancelled", company_number)
            }
        }
    }
    println!(
        "Run {}_{}: {} succeeded, {} failed, {} cancelled",
        summary.run.prefix, summary.run.timestamp, summary.succeeded, summary.failed, summary.cancelled
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }

    let client = RegistryClient::from_config(&config)?;
    let retriever = CompanyRetriever::with_options(
        client,
        RetrievalOptions {
            include_appointments: !args.no_appointments,
            include_charges: !args.no_charges,
        },
    );
    let orchestrator = SearchOrchestrator::new(retriever, config.max_concurrent_companies);
    let data_dir = config.data_dir.clone();

    let summary = match args.command {
        Command::Search {
            keyword,
            items_per_page,
            start_index,
        } => {
            let (cancel_tx, cancel_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, cancelling remaining companies");
                    let _ = cancel_tx.send(true);
                }
            });

            let (summary, _sink) = orchestrator
                .run_search(
                    &keyword,
                    SearchParams {
                        items_per_page,
                        start_index,
                    },
                    |run| CsvSink::create(&data_dir, run.clone()),
                    cancel_rx,
                )
                .await?;
            summary
        }
        Command::Company { number } => {
            let (summary, _sink) = orchestrator
                .run_company(&number, |run| CsvSink::create(&data_dir, run.clone()))
                .await?;
            summary
        }
    };

    println!("Output written to {}", data_dir.display());
    print_summary(&summary);

    if summary.succeeded == 0 && summary.failed > 0 {
        anyhow::bail!("No company could be retrieved");
    }
    Ok(())
}
