//! # quire CLI
//!
//! Command-line interface for the quire static blog generator.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quire")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the site configuration; its directory is the site source
    #[arg(long, global = true, default_value = "_config.yml", env = "QUIRE_CONFIG")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold a new site
    Init {
        /// Target directory (defaults to current directory)
        path: Option<PathBuf>,
    },

    /// Create a new post or draft
    New {
        /// Post title
        title: String,

        /// Create the file in _drafts/ without a date
        #[arg(long)]
        draft: bool,

        /// Layout written into the front matter
        #[arg(long, default_value = "post")]
        layout: String,

        /// Tags (comma separated)
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },

    /// Build the static site
    Build {
        /// Also render drafts
        #[arg(long)]
        drafts: bool,
    },

    /// Check content and manifest for problems
    Lint {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,

        /// Fail on warnings as well as errors
        #[arg(long)]
        deny_warnings: bool,
    },

    /// List the manifest's dependencies
    Deps {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,

        /// Include entries whose platform guard excludes this machine
        #[arg(long)]
        all: bool,

        /// Evaluate guards for another platform (e.g. x64-mingw-ucrt)
        #[arg(long)]
        platform: Option<String>,
    },

    /// Build, serve the site locally and rebuild on changes
    Serve {
        /// Server port
        #[arg(long, default_value_t = 4000)]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Also render drafts
        #[arg(long)]
        drafts: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Init { path } => commands::init_site(path.as_deref()),
        Commands::New {
            title,
            draft,
            layout,
            tags,
        } => {
            let opts = commands::NewPostOptions {
                draft,
                layout,
                tags,
            };
            commands::new_post(&cli.config, &title, &opts).map(|_| ())
        }
        Commands::Build { drafts } => commands::build_site(&cli.config, drafts),
        Commands::Lint {
            json,
            deny_warnings,
        } => commands::lint(&cli.config, json, deny_warnings),
        Commands::Deps {
            json,
            all,
            platform,
        } => commands::list_deps(&cli.config, json, all, platform.as_deref()),
        Commands::Serve { port, host, drafts } => {
            commands::serve(&cli.config, &host, port, drafts).await
        }
    }
}
