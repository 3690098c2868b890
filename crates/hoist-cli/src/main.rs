mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, infra::InfraSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "hoist",
    about = "Automation harness for terraform and kubernetes: plan/apply with gated destroys and rollout waits",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .hoist/ or .git/)
    #[arg(long, global = true, env = "HOIST_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize hoist in the current project
    Init {
        /// Project name (default: the root directory name)
        #[arg(long)]
        project: Option<String>,

        /// Rewrite the default environment config even if it exists
        #[arg(long)]
        force: bool,
    },

    /// Manage environment configurations
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Check the required tools and their versions
    Doctor,

    /// Apply, destroy, and inspect terraform-managed infrastructure
    Infra {
        #[command(subcommand)]
        subcommand: InfraSubcommand,
    },

    /// Apply the deploy manifests and wait for the service to come up
    Deploy {
        /// Workload to wait on, e.g. ds/my-api (default: ds/<project>)
        object: Option<String>,

        /// Manifest file or directory to apply, repeatable (default: deploy/)
        #[arg(long = "manifest", value_name = "PATH")]
        manifests: Vec<PathBuf>,

        /// Service whose load balancer to wait on (default: the project name)
        #[arg(long)]
        service: Option<String>,

        /// Port the published endpoint listens on
        #[arg(long, default_value = "3000")]
        port: u16,

        /// Skip confirmation prompts
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let root_path = cli.root.as_deref();
    let root = root::resolve_root(root_path);

    let result = match cli.command {
        Commands::Init { project, force } => cmd::init::run(&root, project.as_deref(), force),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Doctor => cmd::doctor::run(cli.json),
        Commands::Infra { subcommand } => cmd::infra::run(&root, subcommand, cli.json),
        Commands::Deploy {
            object,
            manifests,
            service,
            port,
            force,
        } => cmd::deploy::run(
            &root,
            object.as_deref(),
            &manifests,
            service.as_deref(),
            port,
            force,
            cli.json,
        ),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
