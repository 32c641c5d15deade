use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use initpkg::commands;
use initpkg::install::{Config, Installer};
use initpkg::state::PersistentState;

/// initpkg - package manager for the INIT scripting language
///
/// Installs packages from a remote repository into ~/.initlang/packages,
/// resolves their declared dependencies, and keeps a local record of what is
/// installed.
///
/// Examples:
///   initpkg install http       # Install 'http' and its dependencies
///   initpkg search json        # Find packages mentioning 'json'
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Application directory (defaults to ~/.initlang; also via INITPKG_ROOT)
    #[arg(
        long = "root",
        short = 'r',
        env = "INITPKG_ROOT",
        value_name = "PATH",
        global = true
    )]
    root: Option<PathBuf>,

    /// Use (and record) a different package repository URL
    #[arg(long = "repository", value_name = "URL", global = true)]
    repository: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Install packages from the repository
    Install {
        #[arg(value_name = "NAME", required = true)]
        names: Vec<String>,
    },

    /// Uninstall packages
    Uninstall {
        #[arg(value_name = "NAME", required = true)]
        names: Vec<String>,
    },

    /// Create a new package skeleton
    Create {
        name: String,

        /// Initial version recorded in package.json
        #[arg(long, default_value = "1.0.0")]
        version: String,
    },

    /// Install a package from a local directory
    #[command(name = "install-local")]
    InstallLocal {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// List installed packages
    List,

    /// List every package the repository advertises
    Available,

    /// Search packages by name, description or keyword
    Search { query: String },

    /// Show details for one package
    Info { name: String },

    /// Refresh the package index and report available updates
    Update,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let config = Config::new(cli.root)?;
    let mut state = PersistentState::load(&config.runtime, &config.env);
    if let Some(repository) = cli.repository {
        state.repository = repository;
    }

    match cli.command {
        Commands::Install { names } => {
            let installer = Installer::new(config.runtime, config.source, config.env);
            installer.install(&names, &mut state).await?;
        }
        Commands::Uninstall { names } => {
            let installer = Installer::new(config.runtime, config.source, config.env);
            installer.uninstall(&names, &mut state)?;
        }
        Commands::InstallLocal { path } => {
            let installer = Installer::new(config.runtime, config.source, config.env);
            installer.install_local(&path, &mut state)?;
        }
        Commands::Update => {
            let installer = Installer::new(config.runtime, config.source, config.env);
            installer.update(&state).await?;
        }
        Commands::List => commands::list(&state),
        Commands::Available => {
            commands::available(&config.runtime, &config.source, &config.env, &state).await?;
        }
        Commands::Search { query } => {
            commands::search(&config.runtime, &config.source, &config.env, &state, &query).await?;
        }
        Commands::Info { name } => {
            commands::info(&config.runtime, &config.source, &config.env, &state, &name).await?;
        }
        Commands::Create { name, version } => {
            commands::create(&config.runtime, &config.env, &name, &version)?;
        }
    }
    Ok(())
}
