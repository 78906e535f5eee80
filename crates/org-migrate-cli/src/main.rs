//! org-migrate CLI - migrate organizational assets between platform instances.

use clap::{ArgAction, Parser, Subcommand};
use org_migrate::{Config, MigrateError, Orchestrator, ResourceKind};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "org-migrate")]
#[command(about = "Migrate organizational assets between source-control platform instances")]
#[command(version)]
struct Cli {
    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Verbose (debug-level) logging
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate one resource type from the source org to the target org
    Migrate {
        /// Component to migrate: variables, teams, secrets, packages, lfs
        component: String,

        /// Override the source organization from the environment
        #[arg(long)]
        source_org: Option<String>,

        /// Override the target organization from the environment
        #[arg(long)]
        target_org: Option<String>,

        /// Dry run: discovery only, zero mutating calls
        #[arg(long, default_value_t = true, action = ArgAction::Set,
              num_args = 0..=1, default_missing_value = "true")]
        dry_run: bool,

        /// Package ecosystem (packages component only)
        #[arg(long, value_parser = ["npm", "container", "maven", "nuget", "rubygems"])]
        package_type: Option<String>,

        /// Download/upload batch concurrency
        #[arg(long, default_value_t = 5)]
        concurrency: usize,

        /// Username mapping CSV (sourceUsername,targetUsername)
        #[arg(long)]
        mapping_file: Option<PathBuf>,

        /// Secrets CSV (type,name,repo,value)
        #[arg(long)]
        secrets_file: Option<PathBuf>,

        /// Local staging directory for package binaries
        #[arg(long, default_value = "packages")]
        staging_dir: PathBuf,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

#[tokio::main]
async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    match cli.command {
        Commands::Migrate {
            component,
            source_org,
            target_org,
            dry_run,
            package_type,
            concurrency,
            mapping_file,
            secrets_file,
            staging_dir,
        } => {
            let kind = ResourceKind::parse(&component)?;

            // Missing credentials are a fatal startup error, before any API call.
            let mut config = Config::from_env()?;

            if let Some(org) = source_org {
                config.source.org = org;
            }
            if let Some(org) = target_org {
                config.target.org = org;
            }
            config.migration.dry_run = dry_run;
            config.migration.concurrency = concurrency;
            config.migration.package_type = package_type;
            config.migration.mapping_file = mapping_file;
            config.migration.secrets_file = secrets_file;
            config.migration.staging_dir = staging_dir;
            config.validate()?;

            if dry_run {
                info!("dry-run mode: no changes will be made to the target");
            }

            let orchestrator = Orchestrator::new(config)?;
            let report = orchestrator.run(kind).await?;

            // The structured summary is always printed, even when every item
            // failed; partial per-item errors do not change the exit code.
            println!("{}", report.to_json()?);

            if !report.errors.is_empty() {
                eprintln!(
                    "\n{} completed with {} item error(s); see the report above",
                    kind.as_str(),
                    report.errors.len()
                );
            }
        }
    }

    Ok(())
}

fn setup_logging(verbose: bool, format: &str) -> Result<(), String> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
