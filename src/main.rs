use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use zipfinder::config::Config;
use zipfinder::export;
use zipfinder::logging;
use zipfinder::pipeline;
use zipfinder::server::{run_server, AppState};

#[derive(Parser)]
#[command(name = "zipfinder")]
#[command(about = "Real-estate ZIP code screener and investment ranker")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scoring pipeline and write the ranked ZIP table
    Run {
        /// Re-parse the raw tax CSV even when a cache artifact exists
        #[arg(long)]
        force: bool,
    },
    /// Serve the ranked table over the HTTP API
    Serve {
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    logging::init_logging();

    let cli = Cli::parse();
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration rejected: {}", e);
            eprintln!("❌ Configuration rejected: {e}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Run { force } => {
            println!("🔄 Running scoring pipeline...");
            let outcome = pipeline::run_pipeline(&config, force)?;

            let output_path = export::target_zips_path(Path::new(&config.data.output_dir));
            export::write_scored_csv(&output_path, &outcome.records)?;

            let summary = &outcome.summary;
            println!("\n📊 Pipeline Results (run {}):", summary.run_id);
            println!("   Counties loaded: {}", summary.counties_in);
            println!("   Tax rows skipped: {}", summary.tax_skips);
            println!(
                "   Baseline rows: {} ({} skipped)",
                summary.base_rows_in, summary.base_skips
            );
            println!(
                "   Dropped: {} invalid, {} out of state, {} duplicates",
                summary.invalid_records, summary.out_of_state, summary.duplicates
            );
            println!("   Fused: {}", summary.fused);
            println!("   Target ZIPs: {}", summary.scored);
            println!("   Output file: {}", output_path.display());
            println!(
                "✅ Analysis complete in {} ms! Found {} target ZIP codes.",
                summary.duration_ms, summary.scored
            );
        }
        Commands::Serve { port } => {
            let table_path = export::target_zips_path(Path::new(&config.data.output_dir));
            if !table_path.exists() {
                error!(path = %table_path.display(), "scored table not found");
                eprintln!(
                    "❌ Scored table not found at {}. Run `zipfinder run` first.",
                    table_path.display()
                );
                std::process::exit(1);
            }

            let records = export::read_scored_csv(&table_path)?;
            info!(rows = records.len(), "scored table loaded");
            println!("🚀 Serving {} ranked ZIP codes...", records.len());

            let state = Arc::new(AppState { config, records });
            run_server(state, port).await?;
        }
    }
    Ok(())
}
