use clap::{Parser, Subcommand};
use reqwest::Client;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod error;
mod render;
mod system;
#[cfg(test)]
mod test_support;
mod update;

use config::Config;
use update::{UpdateManager, UpdateOutcome};

const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "motd")]
#[command(about = "Display Message of the Day (MOTD) with system and media service statistics.")]
struct Cli {
    /// Show version information
    #[arg(short = 'v', long = "version")]
    show_version: bool,

    /// Show optional dependency warnings
    #[arg(short = 'V', long, global = true)]
    verbose: bool,

    /// Enable debug mode
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Update motd to the latest release
    SelfUpdate {
        /// Skip the confirmation prompt and reinstall even when up to date
        #[arg(short, long)]
        force: bool,
    },
}

/// Shared per-process context: configuration and the one HTTP client.
pub struct AppState {
    pub config: Config,
    pub client: Client,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.show_version {
        println!("MOTD Script v{}", update::CURRENT_VERSION);
        return Ok(());
    }
    init_logging(cli.debug);

    let config = Config::load();
    let client = Client::builder()
        .user_agent(concat!("motd/", env!("CARGO_PKG_VERSION")))
        .timeout(HTTP_TIMEOUT)
        .build()?;
    let state = AppState { config, client };

    match cli.command {
        Some(Commands::SelfUpdate { force }) => self_update(&state, force).await,
        None => {
            if cli.verbose {
                system::warn_missing_tools();
            }
            show_banner(&state).await;
            Ok(())
        }
    }
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "motd=debug" } else { "motd=warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn show_banner(state: &AppState) {
    render::print_header().await;

    render::print_section("System Information");
    render::print_lines(&system::system_information().await);

    render::print_section("Services & Resources");
    render::print_lines(&system::services_and_resources(&state.config.tank_mount).await);

    if state.config.has_media_services() {
        render::print_section("Media Services");
        render::print_lines(&api::media_lines(state).await);
    }

    println!();
}

async fn self_update(state: &AppState, force: bool) -> anyhow::Result<()> {
    let manager = UpdateManager::new(state)?;
    let mut stdin = std::io::stdin().lock();
    match manager.run(force, &mut stdin).await? {
        UpdateOutcome::UpToDate { version } => println!("motd v{} is up to date.", version),
        UpdateOutcome::Declined => println!("Update cancelled."),
        UpdateOutcome::Updated { version } => println!("Updated motd to v{}.", version),
        UpdateOutcome::Pending { version } => {
            println!("Update to v{} will finish once motd exits.", version);
            // The deferred script waits on this pid.
            std::process::exit(0);
        }
    }
    Ok(())
}
