//! Mediashelf CLI: publishes the configuration template and the schema migration.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mediashelf_cli::{
    confirm_overwrite, init_tracing, migration_settings, migration_target, publish_file,
    PublishOutcome, CONFIG_TEMPLATE,
};
use mediashelf_db::render_migration;

#[derive(Parser)]
#[command(name = "mediashelf", about = "Media shelf tooling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write configuration or schema files into the project
    Publish {
        #[command(subcommand)]
        target: PublishTarget,
    },
}

#[derive(Subcommand)]
enum PublishTarget {
    /// Write the default .env template
    Config {
        /// Destination file
        #[arg(long, default_value = ".env")]
        path: PathBuf,
        /// Overwrite without asking
        #[arg(long)]
        force: bool,
    },
    /// Write a timestamped SQL migration for the media tables, reusing one already published
    Migration {
        /// Migrations directory
        #[arg(long, default_value = "migrations")]
        dir: PathBuf,
        /// Overwrite without asking
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let (path, outcome) = match cli.command {
        Commands::Publish { target } => match target {
            PublishTarget::Config { path, force } => {
                let outcome = publish_file(&path, CONFIG_TEMPLATE, force, confirm_overwrite)?;
                (path, outcome)
            }
            PublishTarget::Migration { dir, force } => {
                let (tables, default_collection) = migration_settings();
                let sql = render_migration(&tables, &default_collection);
                let path = migration_target(&dir, chrono::Utc::now())?;
                let outcome = publish_file(&path, &sql, force, confirm_overwrite)?;
                (path, outcome)
            }
        },
    };

    match outcome {
        PublishOutcome::Written => println!("Published {}", path.display()),
        PublishOutcome::Declined => println!("Left {} untouched", path.display()),
    }
    Ok(())
}
