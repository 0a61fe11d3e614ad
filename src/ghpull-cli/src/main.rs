//! ghpull - resolve, check and install GitHub releases from the command line.

mod host;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ghpull_update::{ArtifactKind, InstalledArtifact, RepositoryRef, UpdateOrchestrator, UpdaterConfig};

use crate::host::DirectoryHost;

/// Self-update plugins and themes from GitHub releases
#[derive(Parser)]
#[command(name = "ghpull")]
#[command(version)]
struct Cli {
    /// Configuration file path (default: ~/.ghpull/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, global = true)]
    json_logs: bool,

    /// GitHub access token for repositories that don't carry one
    #[arg(long, global = true, env = "GITHUB_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the latest release of a repository as JSON
    Resolve {
        /// `owner/name` or a GitHub URL
        repo: String,
    },

    /// Check whether an installed version can be updated
    Check {
        /// `owner/name` or a GitHub URL
        repo: String,

        /// Installed version
        #[arg(long)]
        installed: String,

        /// Slug of the installed artifact (default: repository name)
        #[arg(long)]
        slug: Option<String>,

        #[arg(long, default_value = "plugin")]
        kind: ArtifactKind,
    },

    /// Download the latest release archive into a directory
    Install {
        /// `owner/name` or a GitHub URL
        repo: String,

        /// Directory the archive is installed into
        #[arg(long)]
        dest: PathBuf,

        #[arg(long, default_value = "plugin")]
        kind: ArtifactKind,
    },

    /// Print the information card of an artifact as JSON
    Details {
        /// `owner/name` or a GitHub URL
        repo: String,

        /// Directory the artifact is installed in
        #[arg(long)]
        dest: PathBuf,

        /// Slug of the artifact (default: repository name)
        #[arg(long)]
        slug: Option<String>,

        #[arg(long, default_value = "plugin")]
        kind: ArtifactKind,
    },
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // stdout carries command output
    if json {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> Result<UpdaterConfig> {
    let config = match &cli.config {
        Some(path) => UpdaterConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => UpdaterConfig::load(),
    };

    let mut config = config.apply_env();
    if let Some(token) = cli.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        config.default_token = Some(token.to_string());
    }
    config.validate()?;
    Ok(config)
}

fn orchestrator(host: DirectoryHost, config: UpdaterConfig) -> Result<UpdateOrchestrator<DirectoryHost>> {
    UpdateOrchestrator::from_config(host, config).context("Failed to create HTTP client")
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Command::Resolve { repo } => {
            let repo = RepositoryRef::parse(&repo)?;
            let host = DirectoryHost::new(ArtifactKind::Plugin, config.staging_dir());
            let release = orchestrator(host, config)?.resolve_latest(&repo).await?;
            println!("{}", serde_json::to_string_pretty(&release)?);
        }

        Command::Check {
            repo,
            installed,
            slug,
            kind,
        } => {
            let repo = RepositoryRef::parse(&repo)?;
            let slug = slug.unwrap_or_else(|| repo.name().to_string());
            let host = DirectoryHost::new(kind, config.staging_dir()).with_installed(
                InstalledArtifact {
                    slug: slug.clone(),
                    name: repo.name().to_string(),
                    version: installed,
                },
            );

            match orchestrator(host, config)?.check_slug(&repo, &slug).await? {
                Some(decision) => println!("{}", serde_json::to_string_pretty(&decision)?),
                None => println!("{} {} is up to date", kind.label(), slug),
            }
        }

        Command::Install { repo, dest, kind } => {
            let repo = RepositoryRef::parse(&repo)?;
            let host = DirectoryHost::new(kind, &dest);
            orchestrator(host, config)?
                .acquire_and_install(&repo)
                .await
                .with_context(|| format!("Failed to install {repo}"))?;
            println!("Installed {} into {}", repo, dest.display());
        }

        Command::Details {
            repo,
            dest,
            slug,
            kind,
        } => {
            let repo = RepositoryRef::parse(&repo)?;
            let slug = slug.unwrap_or_else(|| repo.name().to_string());
            let host = DirectoryHost::new(kind, dest);
            let details = orchestrator(host, config)?.details(&repo, &slug).await?;
            println!("{}", serde_json::to_string_pretty(&details)?);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(&cli.log_level, cli.json_logs);

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
