//! `graphport`: migrate a Neo4j graph into FalkorDB and verify the result.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use graphport_common::Config;
use graphport_graph::{FalkorStore, Neo4jStore, Stores};
use graphport_migrate::{
    default_comparisons, prompt_connection_settings, standard_pipeline, AlwaysContinue,
    DecisionSource, PipelineOutcome, Reconciler, ResetService, StageOptions, DESTRUCTIVE_PROMPT,
};

mod prompt;
use prompt::TerminalDecisions;

#[derive(Parser, Debug)]
#[command(name = "graphport")]
#[command(about = "Migrate a Neo4j graph into FalkorDB and verify the result")]
#[command(version)]
struct Cli {
    /// Answer yes to every prompt
    #[arg(short, long, global = true)]
    yes: bool,

    /// Override the local export directory
    #[arg(long, global = true, env = "EXPORT_DIR")]
    export_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the staged migration end to end
    Run {
        /// Reset both graphs and seed the source with the sample dataset first
        #[arg(long)]
        seed: bool,

        /// Fail (and roll back) when any comparison mismatches
        #[arg(long)]
        strict: bool,

        /// Prompt for Neo4j connection settings and the export directory
        #[arg(long)]
        prompt_config: bool,
    },

    /// Wipe both graphs, their constraints and the exported CSVs
    Reset,

    /// Compare the two graphs without migrating
    Compare {
        /// Exit non-zero when any comparison mismatches
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.log_json) {
        eprintln!("Error: {e:#}");
        return ExitCode::from(1);
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "graphport failed");
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("graphport=info".parse()?);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let decisions: Box<dyn DecisionSource> = if cli.yes {
        Box::new(AlwaysContinue)
    } else {
        Box::new(TerminalDecisions)
    };

    let mut config = Config::from_env()?;
    if let Some(dir) = cli.export_dir {
        config.export_dir = dir;
    }
    if let Commands::Run {
        prompt_config: true,
        ..
    } = cli.command
    {
        prompt_connection_settings(&mut config, decisions.as_ref());
    }
    config.validate()?;
    config.log_redacted();
    let config = Arc::new(config);

    match cli.command {
        Commands::Run { seed, strict, .. } => {
            let stores = connect(&config).await?;
            let options = StageOptions {
                seed_source: seed,
                strict_compare: strict,
            };
            let report = standard_pipeline(config, stores, options)
                .run(decisions.as_ref())
                .await;
            print_outcome(&report.outcome);
            Ok(ExitCode::from(report.outcome.exit_code()))
        }
        Commands::Reset => {
            if !decisions.confirm(DESTRUCTIVE_PROMPT) {
                println!("Aborting before reset.");
                return Ok(ExitCode::from(2));
            }
            let stores = connect(&config).await?;
            let summary = ResetService::new(stores, config.export_dir.clone())
                .reset()
                .await?;
            println!(
                "Environment reset: {} files removed, {} Neo4j and {} FalkorDB constraints dropped",
                summary.files_removed,
                summary.source_constraints_dropped,
                summary.target_constraints_dropped
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Compare { strict } => {
            let stores = connect(&config).await?;
            let report = Reconciler::new(&stores, default_comparisons()).run().await?;
            print!("{report}");
            Ok(ExitCode::from(compare_exit_code(strict, report.all_matched())))
        }
    }
}

async fn connect(config: &Config) -> Result<Stores> {
    let source =
        Neo4jStore::connect(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password).await?;
    let target = FalkorStore::connect(&config.falkor_url(), &config.falkor_graph).await?;
    info!(graph = config.falkor_graph.as_str(), "Connected to Neo4j and FalkorDB");
    Ok(Stores::new(Arc::new(source), Arc::new(target)))
}

fn print_outcome(outcome: &PipelineOutcome) {
    match outcome {
        PipelineOutcome::Completed { .. } => {
            println!("\n✅✅ Migration pipeline completed successfully");
        }
        PipelineOutcome::UserAborted { stage: Some(stage) } => {
            println!("Aborting pipeline after '{stage}'.");
        }
        PipelineOutcome::UserAborted { stage: None } => {
            println!("Aborting pipeline before reset.");
        }
        PipelineOutcome::Aborted {
            stage,
            error,
            reset_error,
        } => {
            eprintln!("❌ Error during stage '{stage}': {error}");
            match reset_error {
                None => eprintln!("Environment reset. Exiting."),
                Some(reset_error) => {
                    eprintln!("⚠️  Environment reset also failed: {reset_error}");
                    eprintln!("Manual cleanup of both graphs and the export directory is required.");
                }
            }
        }
    }
}

fn compare_exit_code(strict: bool, all_matched: bool) -> u8 {
    if strict && !all_matched {
        1
    } else {
        0
    }
}
