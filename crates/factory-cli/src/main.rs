mod cmd;
mod output;
mod root;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use factory_core::settings::GithubIdentity;

#[derive(Parser)]
#[command(
    name = "projects-factory",
    about = "Keep local clones, new project folders and GitHub repositories in one place",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from settings.yaml or .git/)
    #[arg(long, global = true, env = "FACTORY_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// GitHub account that owns the catalog
    #[arg(long, global = true, env = "GITHUB_USERNAME")]
    github_username: Option<String>,

    /// GitHub token for API calls
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the web UI
    Serve {
        /// Address to bind (default: server.host from settings.yaml)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (default: server.port from settings.yaml)
        #[arg(long)]
        port: Option<u16>,

        /// Don't open the browser automatically
        #[arg(long)]
        no_open: bool,
    },

    /// Show the merged catalog with push eligibility
    Repos,

    /// Show the state of every scanned working copy
    States,

    /// Rebuild repositories.yaml from the GitHub API
    Refresh,

    /// Clone repositories into MY_REPOS
    Install {
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Delete local folders from MY_REPOS or NEW_PROJECTS
    Delete {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Create a new project folder in NEW_PROJECTS
    New { name: Option<String> },

    /// Append the next version line to VERSION.md
    Version {
        /// Project folder, or a project name
        path: String,

        /// Use this summary instead of one inferred from the diff
        #[arg(long, short = 'm')]
        message: Option<String>,

        /// Print the line without writing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Commit all changes and push to origin
    Push {
        /// Project folder, or a project name
        path: String,

        /// Generate a new version line instead of reusing the last one
        #[arg(long)]
        generate: bool,

        /// Commit message used when no version line can be generated
        #[arg(long, short = 'm')]
        message: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let identity = GithubIdentity::new(cli.github_username, cli.github_token);

    let result = cmd::Ctx::load(root, identity, cli.json).and_then(|ctx| match cli.command {
        Commands::Serve {
            host,
            port,
            no_open,
        } => cmd::serve::run(ctx, host, port, no_open),
        Commands::Repos => cmd::repos::run(&ctx),
        Commands::States => cmd::states::run(&ctx),
        Commands::Refresh => cmd::refresh::run(&ctx),
        Commands::Install { urls } => cmd::install::run(&ctx, &urls),
        Commands::Delete { names } => cmd::delete::run(&ctx, &names),
        Commands::New { name } => cmd::new::run(&ctx, name.as_deref()),
        Commands::Version {
            path,
            message,
            dry_run,
        } => cmd::version::run(&ctx, &path, message.as_deref(), dry_run),
        Commands::Push {
            path,
            generate,
            message,
        } => cmd::push::run(&ctx, &path, generate, message.as_deref()),
    });

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
