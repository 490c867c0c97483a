use anyhow::Context;
use clap::{Parser, Subcommand};
use configuration::Settings;
use database::{MigrationOutcome, migrator};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Entry point of the simplebank schema migration tool.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let settings = configuration::load_config().context("Failed to load configuration")?;
    let dir = cli.dir.unwrap_or_else(|| settings.migration_dir.clone());

    let step = match cli.command {
        Commands::Create { name } => {
            let (up, down) = migrator::create(&dir, &name)
                .with_context(|| format!("Failed to create migration '{name}'"))?;
            println!("Migration files created:\n- {}\n- {}", up.display(), down.display());
            return Ok(());
        }
        Commands::Up => Step::Up,
        Commands::Down => Step::Down,
        Commands::Up1 => Step::Up1,
        Commands::Down1 => Step::Down1,
    };
    run_step(step, &dir, &settings).await
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Applies, rolls back and creates versioned SQL migrations for the simplebank database.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the NNNNNN_<name>.{up,down}.sql files.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Apply every pending migration.
    Up,
    /// Roll back every applied migration.
    Down,
    /// Apply the next pending migration only.
    Up1,
    /// Roll back the most recent migration only.
    Down1,
    /// Create an empty up/down migration pair with the next sequence number.
    Create {
        /// Migration name, e.g. "add_users".
        #[arg(long)]
        name: String,
    },
}

// ==============================================================================
// Migration Actions
// ==============================================================================

/// The actions that apply or revert migrations against the database.
#[derive(Debug, Clone, Copy)]
enum Step {
    Up,
    Down,
    Up1,
    Down1,
}

impl Step {
    fn failure(self) -> &'static str {
        match self {
            Step::Up => "Failed to run migrations",
            Step::Down => "Failed to rollback migrations",
            Step::Up1 => "Failed to apply one migration step",
            Step::Down1 => "Failed to rollback one migration step",
        }
    }

    fn success(self) -> &'static str {
        match self {
            Step::Up => "Migrations applied successfully.",
            Step::Down => "Migrations rolled back successfully.",
            Step::Up1 => "One migration step applied successfully.",
            Step::Down1 => "One migration step rolled back successfully.",
        }
    }
}

/// Connects to `DB_URL` and runs one migration step against it.
async fn run_step(step: Step, dir: &Path, settings: &Settings) -> anyhow::Result<()> {
    let pool = database::connect(settings)
        .await
        .context("Failed to initialize migrate instance")?;
    let loaded = migrator::load(dir)
        .await
        .with_context(|| format!("Failed to read migrations from {}", dir.display()))?;

    let result = match step {
        Step::Up => migrator::up(&loaded, &pool).await,
        Step::Down => migrator::down(&loaded, &pool).await,
        Step::Up1 => migrator::up1(&loaded, &pool).await,
        Step::Down1 => migrator::down1(&loaded, &pool).await,
    };
    pool.close().await;

    match result.context(step.failure())? {
        MigrationOutcome::Changed(versions) => {
            tracing::info!(?step, ?versions, "Migration step finished");
            println!("{}", step.success());
        }
        MigrationOutcome::NoChange => println!("No change."),
    }
    Ok(())
}
