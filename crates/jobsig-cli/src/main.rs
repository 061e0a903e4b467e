mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Exit codes: 0 success, 2 invalid invocation (clap), 3 transient
/// store/collaborator failure (safe to retry), 4 permanent failure.
const EXIT_TRANSIENT: i32 = 3;
const EXIT_PERMANENT: i32 = 4;

#[derive(Debug, Parser)]
#[command(name = "jobsig")]
#[command(about = "Job application signal engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Per-archetype queue counts and top-score averages
    Queue,
    /// Open, fill, and close application batches under the profile invariant
    Batch {
        #[command(subcommand)]
        command: BatchCommands,
    },
    /// Funnel metrics across applications
    Status,
    /// Latest centroid shifts and variant staleness distances
    Drift,
    /// Classify ad-hoc listing text from a file
    Classify {
        /// Path to a text file holding the listing body
        file: std::path::PathBuf,

        /// Listing title used for metadata extraction
        #[arg(short, long, default_value = "")]
        title: String,
    },
    /// Record a phone-call outcome
    LogCall {
        /// Hiring entity the call was about
        #[arg(long)]
        entity: String,

        /// Listing title the call was about
        #[arg(long)]
        title: String,

        /// Outcome (screening_call, interview, rejection, offer, other)
        #[arg(long)]
        outcome: String,

        /// Caller phone number
        #[arg(long)]
        phone: Option<String>,

        /// Free-form notes
        #[arg(long, default_value = "")]
        notes: String,

        /// Call date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<chrono::NaiveDate>,
    },
    /// Flush the local write spool into the store
    Sync,
    /// Per-variant per-version funnel metrics
    Versions,
    /// Unacknowledged drift alerts
    Alerts {
        #[command(subcommand)]
        command: Option<AlertCommands>,
    },
    /// Manual-review queue for ambiguous message matches
    Review {
        #[command(subcommand)]
        command: Option<ReviewCommands>,
    },
    /// Database management commands
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum BatchCommands {
    /// Open a batch; you assert the external profile state matches
    Open {
        /// Archetype of the batch (builder, fixer, operator, translator)
        archetype: String,

        /// The profile state currently advertised externally
        #[arg(long)]
        profile_state: String,
    },
    /// Emit queued listings of the open batch's archetype
    Emit {
        /// Maximum number of applications to emit
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Close the open batch
    Close,
}

#[derive(Debug, Subcommand)]
enum AlertCommands {
    /// Acknowledge one alert by id
    Ack { id: i64 },
}

#[derive(Debug, Subcommand)]
enum ReviewCommands {
    /// Confirm a message-to-application match
    Resolve { message_id: i64, application_id: i64 },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Test the database connection
    Ping,
    /// Run pending migrations
    Migrate,
    /// Write a point-in-time snapshot of every table
    Snapshot,
}

#[tokio::main]
async fn main() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("JOBSIG_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());
        EnvFilter::new(level)
    });
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(exit_code(&e));
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Queue => commands::queue::run().await,
        Commands::Batch { command } => match command {
            BatchCommands::Open {
                archetype,
                profile_state,
            } => commands::batch::open(&archetype, &profile_state).await,
            BatchCommands::Emit { limit } => commands::batch::emit(limit).await,
            BatchCommands::Close => commands::batch::close().await,
        },
        Commands::Status => commands::status::run().await,
        Commands::Drift => commands::drift::run().await,
        Commands::Classify { file, title } => commands::classify::run(&file, &title).await,
        Commands::LogCall {
            entity,
            title,
            outcome,
            phone,
            notes,
            date,
        } => {
            commands::intake::run(commands::intake::CallArgs {
                entity,
                title,
                outcome,
                phone,
                notes,
                date,
            })
            .await
        }
        Commands::Sync => commands::sync::run().await,
        Commands::Versions => commands::versions::run().await,
        Commands::Alerts { command } => match command {
            None => commands::alerts::list().await,
            Some(AlertCommands::Ack { id }) => commands::alerts::ack(id).await,
        },
        Commands::Review { command } => match command {
            None => commands::review::list().await,
            Some(ReviewCommands::Resolve {
                message_id,
                application_id,
            }) => commands::review::resolve(message_id, application_id).await,
        },
        Commands::Db { command } => match command {
            DbCommands::Ping => commands::db::ping().await,
            DbCommands::Migrate => commands::db::migrate().await,
            DbCommands::Snapshot => commands::db::snapshot().await,
        },
    }
}

/// Distinguish retryable failures from permanent ones for scripts
/// wrapping the CLI.
fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(db) = cause.downcast_ref::<jobsig_db::DbError>() {
            return if db.is_transient() {
                EXIT_TRANSIENT
            } else {
                EXIT_PERMANENT
            };
        }
        if let Some(analyzer) = cause.downcast_ref::<jobsig_analyzer::AnalyzerError>() {
            return if analyzer.is_transient() {
                EXIT_TRANSIENT
            } else {
                EXIT_PERMANENT
            };
        }
        if cause.downcast_ref::<reqwest::Error>().is_some() {
            return EXIT_TRANSIENT;
        }
    }
    EXIT_PERMANENT
}
