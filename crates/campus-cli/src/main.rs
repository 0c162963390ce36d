use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use campus_migrate::{MigrationConfig, MigrationPipeline};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "campus-cli")]
#[command(about = "Migrate legacy campus content into the new content tree")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the migration, skipping collections that already have a checkpoint.
    Migrate(MigrateArgs),
    /// Show checkpoint state per collection.
    Status(DirArgs),
}

#[derive(Debug, Default, Args)]
struct DirArgs {
    #[arg(long)]
    source_dir: Option<PathBuf>,
    #[arg(long)]
    content_dir: Option<PathBuf>,
    #[arg(long)]
    public_dir: Option<PathBuf>,
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Args)]
struct MigrateArgs {
    /// Reprocess collections even when a checkpoint exists.
    #[arg(long)]
    force: bool,
    #[command(flatten)]
    dirs: DirArgs,
}

impl DirArgs {
    fn apply(self, config: &mut MigrationConfig) {
        if let Some(dir) = self.source_dir {
            config.source_dir = dir;
        }
        if let Some(dir) = self.content_dir {
            config.content_dir = dir;
        }
        if let Some(dir) = self.public_dir {
            config.public_dir = dir;
        }
        if let Some(dir) = self.checkpoint_dir {
            config.checkpoint_dir = dir;
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_migrate=info,campus_cli=info".into()),
        )
        .init();
}

async fn migrate(args: MigrateArgs) -> Result<()> {
    let mut config = MigrationConfig::from_env();
    config.force |= args.force;
    args.dirs.apply(&mut config);

    let summary = MigrationPipeline::new(config)?.run().await?;
    for report in &summary.collections {
        info!(
            collection = %report.collection,
            skipped = report.skipped,
            entries = report.entries,
            assets = report.assets,
            "collection finished"
        );
    }
    info!(
        run_id = %summary.run_id,
        migrated = summary.migrated_entries(),
        assets = summary.relocated_assets(),
        "Successfully migrated content."
    );
    Ok(())
}

async fn status(args: DirArgs) -> Result<()> {
    let mut config = MigrationConfig::from_env();
    args.apply(&mut config);

    for entry in campus_migrate::status(&config).await? {
        let state = if entry.checkpoint { "migrated" } else { "pending" };
        println!("{:<10} {:<9} {}", entry.collection.as_str(), state, entry.mappings);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command.unwrap_or(Commands::Migrate(MigrateArgs::default())) {
        Commands::Migrate(args) => migrate(args).await.inspect_err(|err| {
            error!(error = %format!("{err:#}"), "Failed to migrate content.");
        }),
        Commands::Status(args) => status(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
