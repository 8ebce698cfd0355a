mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::Overrides;
use pmac_core::tracker::ApiMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pmac",
    about = "Project management as code: validate a backlog and sync it to GitHub issues and project boards",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .pmac/ or .git/)
    #[arg(long, global = true, env = "PMAC_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Data directory holding the JSON files (overrides config)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Target repository as owner/name (overrides config)
    #[arg(long, global = true, env = "GITHUB_REPOSITORY")]
    repo: Option<String>,

    /// Tracker backend: cli (gh) or rest (overrides config)
    #[arg(long, global = true)]
    mode: Option<ApiMode>,

    /// GitHub token; required for rest mode, passed to gh otherwise
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write .pmac/config.yaml and create the data directory
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Check the data files and their cross references
    Validate,

    /// Preview the issues and labels a sync would produce (offline)
    Plan,

    /// Check authentication and show the target repository
    Status,

    /// Reconcile stories, labels and the board with GitHub
    Sync {
        /// Read everything, change nothing
        #[arg(long)]
        dry_run: bool,

        /// Sync even when validation fails
        #[arg(long)]
        force: bool,

        /// Skip the project board pass
        #[arg(long)]
        no_board: bool,

        /// Also provision the standard project fields
        #[arg(long)]
        fields: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Sync { .. } | Commands::Status => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let overrides = Overrides {
        data_dir: cli.data_dir,
        repo: cli.repo,
        mode: cli.mode,
    };
    let token = cli.token;

    let result = match cli.command {
        Commands::Init { force } => cmd::init::run(&root, &overrides, force, cli.json),
        Commands::Validate => cmd::validate::run(&root, &overrides, cli.json),
        Commands::Plan => cmd::plan::run(&root, &overrides, cli.json),
        Commands::Status => cmd::status::run(&root, &overrides, token, cli.json),
        Commands::Sync {
            dry_run,
            force,
            no_board,
            fields,
        } => cmd::sync::run(
            &root,
            &overrides,
            token,
            cmd::sync::SyncArgs {
                dry_run,
                force,
                no_board,
                fields,
            },
            cli.json,
        ),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
