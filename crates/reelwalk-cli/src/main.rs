mod query;
mod traverse;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "reelwalk-cli")]
#[command(about = "Story carousel traversal and engagement")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Traverse the story carousel of one account
    Traverse {
        /// Username of the signed-in account
        #[arg(long)]
        account: String,
        /// Stories to visit (clamped to 1..=50; defaults to REELWALK_STORY_LIMIT)
        #[arg(long)]
        limit: Option<i64>,
        /// Only reply to profiles that opted in to auto-replies
        #[arg(long)]
        auto_reply_only: bool,
    },
    /// Traverse the carousels of every active account
    TraverseAll {
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        auto_reply_only: bool,
    },
    /// Show recorded events for a profile
    Events {
        /// Account the profile belongs to
        #[arg(long)]
        account: String,
        /// Profile username
        #[arg(long)]
        profile: String,
        /// Filter by event kind (e.g. story_reply_sent)
        #[arg(long)]
        kind: Option<String>,
        #[arg(long, default_value = "20")]
        limit: i64,
    },
    /// Show recent traversal runs
    Runs {
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("reelwalk-cli: no command given; try --help");
        return Ok(());
    };

    let config = reelwalk_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = reelwalk_db::PoolConfig::from_app_config(&config);
    let pool = reelwalk_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Migrate => {
            let applied = reelwalk_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::Traverse {
            account,
            limit,
            auto_reply_only,
        } => {
            let outcome =
                traverse::run_account(&pool, &config, &account, limit, auto_reply_only).await?;
            traverse::print_outcome(&account, &outcome);
        }
        Commands::TraverseAll {
            limit,
            auto_reply_only,
        } => traverse::run_all(&pool, &config, limit, auto_reply_only).await?,
        Commands::Events {
            account,
            profile,
            kind,
            limit,
        } => query::run_events(&pool, &account, &profile, kind.as_deref(), limit).await?,
        Commands::Runs { limit } => query::run_runs(&pool, limit).await?,
    }

    Ok(())
}
