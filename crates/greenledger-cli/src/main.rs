mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{actor::ActorSubcommand, config::ConfigSubcommand, reward::RewardSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "greenledger",
    about = "Reward sustainable actions with tokens backed by an append-only ledger",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .greenledger/)
    #[arg(long, global = true, env = "GREENLEDGER_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Show audit records and other INFO logs on stderr
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize greenledger in the current project
    Init,

    /// Manage actors
    Actor {
        #[command(subcommand)]
        subcommand: ActorSubcommand,
    },

    /// Register a sustainable action and award its tokens
    Register {
        actor: String,
        /// Action type, e.g. recycling, public_transport, tree_planting
        action_type: String,
        #[arg(required = true, num_args = 1..)]
        description: Vec<String>,
        /// Reported impact (kg, km, ...) used by impact-scaled strategies
        #[arg(long)]
        impact: Option<f64>,
        /// Amount the caller expects; the strategy table decides
        #[arg(long)]
        requested_tokens: Option<i64>,
        /// Caller-supplied idempotency key, replaces description-based dedup
        #[arg(long)]
        idempotency_key: Option<String>,
    },

    /// Show an actor's ledger balance
    Balance { actor: String },

    /// Show an actor's ledger entries
    History { actor: String },

    /// Replay ledger history and check balances (all actors if omitted)
    Verify { actor: Option<String> },

    /// Manage the reward catalog
    Reward {
        #[command(subcommand)]
        subcommand: RewardSubcommand,
    },

    /// Spend tokens on a catalog reward
    Redeem { actor: String, reward_id: String },

    /// Record a signed administrative correction
    Adjust {
        actor: String,
        #[arg(allow_negative_numbers = true)]
        amount: i64,
        #[arg(required = true, num_args = 1..)]
        description: Vec<String>,
    },

    /// List the effective reward strategy table
    Strategies,

    /// Validate the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Rewrite every actor's cached total from the ledger
    Reproject,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::Actor { subcommand } => cmd::actor::run(&root, subcommand, cli.json),
        Commands::Register {
            actor,
            action_type,
            description,
            impact,
            requested_tokens,
            idempotency_key,
        } => cmd::register::run(
            &root,
            cmd::register::RegisterArgs {
                actor,
                action_type,
                description: description.join(" "),
                impact,
                requested_tokens,
                idempotency_key,
            },
            cli.json,
        ),
        Commands::Balance { actor } => cmd::ledger::balance(&root, &actor, cli.json),
        Commands::History { actor } => cmd::ledger::history(&root, &actor, cli.json),
        Commands::Verify { actor } => cmd::ledger::verify(&root, actor.as_deref(), cli.json),
        Commands::Reward { subcommand } => cmd::reward::run(&root, subcommand, cli.json),
        Commands::Redeem { actor, reward_id } => {
            cmd::ledger::redeem(&root, &actor, &reward_id, cli.json)
        }
        Commands::Adjust {
            actor,
            amount,
            description,
        } => cmd::ledger::adjust(&root, &actor, amount, &description.join(" "), cli.json),
        Commands::Strategies => cmd::strategies::run(&root, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Reproject => cmd::ledger::reproject(&root, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
