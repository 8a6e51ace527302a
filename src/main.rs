use anyhow::Context;
use billogram_import::app::run_import;
use billogram_import::config::Config;
use billogram_import::error::ImportError;
use billogram_import::logging;
use billogram_import::pipeline::BatchReport;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "billogram_import")]
#[command(about = "Create and send Billogram invoices from CSV files")]
#[command(version = "0.1.0")]
struct Cli {
    /// Skip creating customer data entries
    #[arg(long)]
    skip_customers: bool,

    /// Filename(s) of csv file with invoice data to process
    #[arg(value_name = "FILE", required = true, num_args = 1..)]
    files: Vec<PathBuf>,
}

fn print_summary(report: &BatchReport) {
    println!("\n📊 Import results:");
    for file in &report.files {
        println!(
            "   {}: {} sent, {} failed",
            file.path.display(),
            file.sent(),
            file.failed()
        );
    }
    for failure in &report.failed_files {
        println!("   {}: not processed ({})", failure.path.display(), failure.error);
    }
    println!(
        "   Total: {} invoices, {} sent, {} failed",
        report.total_invoices(),
        report.sent(),
        report.failed()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();

    let config_path = Config::default_path();
    let config = Config::load_or_init(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    match run_import(&config, &cli.files, !cli.skip_customers).await {
        Ok(report) => {
            print_summary(&report);
            Ok(())
        }
        Err(e @ ImportError::MissingCredentials { .. }) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
        Err(e) => Err(anyhow::Error::from(e).context("Import failed")),
    }
}
