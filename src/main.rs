use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use skillkit::App;
use skillkit::Config;
use skillkit::SkillKitError;
use skillkit::commands::init::cmd_init;
use skillkit::ops::git::GitOps as _;
use skillkit::ops::git::RealGit;
use skillkit::ops::github::RealGithub;
use skillkit::ops::github::RepoName;
use skillkit::plugin::PluginEntry;
use skillkit::registry::RegistryRepo;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "skillkit")]
#[command(about = "Contribute locally developed skills to the skills registry", long_about = None)]
pub struct Cli {
    /// Local clone of the registry (defaults to skillkit.registryPath)
    #[arg(long, global = true)]
    pub registry: Option<PathBuf>,

    /// Registry on GitHub as owner/name (defaults to the clone's origin)
    #[arg(long, global = true)]
    pub registry_repo: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configure the registry location and GitHub token
    Init,
    /// Open or update a PR moving the registry to the skill's latest upstream commit
    Upgrade {
        /// Folder of the skill to upgrade
        skill_folder: PathBuf,
    },
    /// Open a PR adding a new skill to the registry
    Add {
        /// Folder of the skill to add
        skill_folder: PathBuf,
    },
}

fn setup_logging() -> Result<()> {
    let timer = tracing_subscriber::fmt::time::ChronoLocal::new("%H:%M:%S%.3f".into());
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env()?;
    tracing_subscriber::fmt()
        .with_timer(timer)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Sync the registry clone and wire up the real clients.
async fn open_app(
    registry: Option<PathBuf>,
    registry_repo: Option<String>,
) -> Result<App<RealGit, RealGithub>> {
    let config = Config::load()?;
    let registry_path = registry
        .or_else(|| config.registry_path.clone())
        .context("No registry clone configured. Run 'skillkit init' or pass --registry.")?;
    let registry_git = RealGit::new(registry_path.clone());
    let full_name = match registry_repo.or_else(|| config.registry_repo.clone()) {
        Some(full_name) => full_name,
        None => RepoName::parse(&registry_git.remote_url("origin").await?)?.full_name(),
    };

    let registry = RegistryRepo::open(registry_git, registry_path, full_name).await?;
    let gh = RealGithub::new(config.github_token.clone());
    Ok(App::new(config, registry, gh))
}

async fn discover(app: &App<RealGit, RealGithub>, skill_folder: &Path) -> Result<PluginEntry> {
    PluginEntry::discover(
        &RealGit::new(skill_folder.to_path_buf()),
        skill_folder,
        &app.registry.index,
    )
    .await
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => cmd_init(&mut std::io::stdout()).await?,
        Commands::Upgrade { skill_folder } => {
            let app = open_app(cli.registry, cli.registry_repo).await?;
            let plugin = discover(&app, &skill_folder).await?;
            match app
                .cmd_upgrade(&plugin, RealGit::new, &mut std::io::stdout())
                .await
            {
                // Nothing to do is not a failure
                Err(err) if SkillKitError::is_already_updated(&err) => println!("{}", err),
                result => {
                    result?;
                }
            }
        }
        Commands::Add { skill_folder } => {
            let app = open_app(cli.registry, cli.registry_repo).await?;
            let plugin = discover(&app, &skill_folder).await?;
            app.cmd_add(&plugin, &mut std::io::stdout()).await?;
        }
    }

    Ok(())
}
