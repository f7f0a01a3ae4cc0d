use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use host_dedup::config::Config;
use host_dedup::logging;
use host_dedup::normalize::FieldRole;
use host_dedup::output;
use host_dedup::pipeline::{DuplicateReport, Metrics, Pipeline};

#[derive(Parser)]
#[command(name = "host_dedup")]
#[command(about = "Keep the latest record per host in an inventory export")]
#[command(version = "0.1.0")]
struct Cli {
    /// Config file (defaults to $HOST_DEDUP_CONFIG, then host_dedup.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Entity key column; repeat for a composite key
    #[arg(long = "key", global = true)]
    keys: Vec<String>,

    /// Recency (last seen) column
    #[arg(long, global = true)]
    recency: Option<String>,

    /// Identity column reported for duplicates only; repeatable
    #[arg(long = "identity", global = true)]
    identity: Vec<String>,

    /// Count-like column for the data-loss report; repeatable
    #[arg(long = "additive", global = true)]
    additive: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write every row with the is_latest flag column added
    Flag {
        input: PathBuf,
        /// Output CSV path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write only the rows flagged latest
    Clean {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print row counts, discard rate and data-loss exposure
    Summary {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print values that occur more than once
    Duplicates {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    fn resolve_config(&self) -> anyhow::Result<Config> {
        let mut config = Config::load_or_default(self.config.as_deref())
            .context("Failed to load configuration")?;
        let roles = &mut config.roles;
        if !self.keys.is_empty() {
            roles.entity_key_fields = self.keys.clone();
        }
        if let Some(recency) = &self.recency {
            roles.recency_field = recency.clone();
        }
        if !self.identity.is_empty() {
            roles.identity_fields = self.identity.clone();
        }
        if !self.additive.is_empty() {
            roles.additive_fields = self.additive.clone();
        }
        Ok(config)
    }
}

fn run_pipeline(pipeline: &Pipeline, input: &Path) -> anyhow::Result<host_dedup::PipelineResult> {
    pipeline
        .run_path(input)
        .with_context(|| format!("Failed to process {}", input.display()))
}

fn print_summary(metrics: &Metrics) {
    println!("\n📊 Summary Statistics");
    println!("   Total raw entries: {}", metrics.total_rows);
    println!("   Cleaned hosts:     {}", metrics.canonical_rows);
    println!("   Discarded:         {}", metrics.discarded_rows);
    println!("   Discard rate:      {:.1}%", metrics.discard_rate_pct);

    for exposure in &metrics.exposure {
        println!("\n⚠️  {}", exposure.column);
        println!(
            "   Total {} | kept {} | dropped {} | shortfall {}",
            exposure.total, exposure.kept, exposure.dropped, exposure.shortfall
        );
        if exposure.unparsed_cells > 0 {
            println!("   {} non-numeric cells ignored", exposure.unparsed_cells);
        }
        for group in exposure.groups.iter().filter(|g| g.dropped != 0.0) {
            println!(
                "   - {}: {} rows, total {}, kept {}, dropped {}",
                format_key(&group.key),
                group.rows,
                group.total,
                group.kept,
                group.dropped
            );
        }
    }
}

fn print_duplicates(report: &DuplicateReport) {
    let hostnames = report.duplicate_count(FieldRole::EntityKey);
    let serials = report.duplicate_count(FieldRole::Identity);
    let mut line = format!("🔍 Found {} key values", hostnames);
    if serials > 0 {
        line.push_str(&format!(" and {} identity values", serials));
    }
    line.push_str(" with duplicates");
    println!("{}", line);

    for field in &report.fields {
        for value in &field.values {
            println!("   {} = {} ({}x)", field.field, value.value, value.count);
        }
    }
}

fn format_key(key: &[Option<String>]) -> String {
    key.iter()
        .map(|part| part.as_deref().unwrap_or("<null>"))
        .collect::<Vec<_>>()
        .join(" / ")
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let pipeline = Pipeline::new(cli.resolve_config()?);
    debug!(roles = ?pipeline.config().roles, "Resolved column roles");

    let outcome = match &cli.command {
        Commands::Flag { input, output: out_path } => run_pipeline(&pipeline, input).and_then(|result| {
            output::write_csv_to(result.flagged.dataset(), out_path.as_deref())?;
            Ok(())
        }),
        Commands::Clean { input, output: out_path } => run_pipeline(&pipeline, input).and_then(|result| {
            output::write_csv_to(&result.canonical, out_path.as_deref())?;
            Ok(())
        }),
        Commands::Summary { input, json } => run_pipeline(&pipeline, input).and_then(|result| {
            if *json {
                output::write_json(&result.report(), std::io::stdout().lock())?;
            } else {
                print_summary(&result.metrics);
            }
            Ok(())
        }),
        Commands::Duplicates { input, json } => pipeline
            .load_path(input)
            .with_context(|| format!("Failed to load {}", input.display()))
            .and_then(|loaded| {
                if *json {
                    output::write_json(&loaded.duplicates, std::io::stdout().lock())?;
                } else {
                    print_duplicates(&loaded.duplicates);
                }
                Ok(())
            }),
    };

    match &outcome {
        Ok(()) => info!("Done"),
        Err(e) => error!("❌ {:#}", e),
    }
    outcome
}
