use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc::{self, UnboundedReceiver};

use actions_board::backend::BackendClient;
use actions_board::config::loader;
use actions_board::config::types::AppConfig;
use actions_board::engine::{CoordinatorSettings, Event, RefreshCoordinator};
use actions_board::registry::Registry;
use actions_board::storage::JsonFileStore;
use actions_board::types::TrackedRepository;
use actions_board::view::{self, BoardView};

#[derive(Parser)]
#[command(
    name = "actions-board",
    version,
    about = "GitHub Actions workflow status board"
)]
struct Cli {
    /// Path to config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging to debug.log.
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List tracked repositories.
    List,
    /// Track a repository and show its workflows.
    Add {
        /// Repository as owner/name.
        repo: String,
    },
    /// Stop tracking a repository.
    Remove {
        /// Repository as owner/name.
        repo: String,
    },
    /// Search your repositories.
    Search {
        query: Option<String>,
        /// Skip the response cache.
        #[arg(long)]
        force: bool,
    },
    /// Refresh every tracked repository once and print the board.
    Status {
        /// Skip the response cache.
        #[arg(long)]
        force: bool,
    },
    /// Keep the board up to date until interrupted.
    Watch {
        /// Seconds between refreshes (defaults to `refresh.interval_secs`).
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Turn auto-refresh on or off for bare `actions-board` runs.
    AutoRefresh { state: Toggle },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

type Coordinator = RefreshCoordinator<BackendClient>;

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.debug {
        let file = std::fs::File::create("debug.log")?;
        tracing_subscriber::fmt()
            .with_writer(file)
            .with_ansi(false)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .init();
    }

    let config = loader::load_config(cli.config.as_deref())?;
    let color = config.display.color && std::io::stdout().is_terminal();
    tracing::info!("actions-board starting");

    let rt = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    rt.block_on(run(cli.command, config, color))
}

async fn run(command: Option<Commands>, config: AppConfig, color: bool) -> Result<()> {
    let state_path = loader::state_path(&config);
    tracing::debug!("state file: {}", state_path.display());
    let registry = Registry::new(JsonFileStore::new(state_path));
    let client = BackendClient::new(&config.backend)?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut coordinator = RefreshCoordinator::new(
        client,
        registry,
        tx,
        CoordinatorSettings::from_config(&config),
    );

    let command = match command {
        Some(command) => command,
        None if coordinator.auto_refresh_enabled()? => Commands::Watch { interval: None },
        None => Commands::Status { force: false },
    };

    match command {
        Commands::List => {
            print!("{}", view::render_repo_list(&coordinator.repositories()?));
        }
        Commands::Add { repo } => {
            let (owner, name) = parse_repo_arg(&repo)?;
            let added = coordinator
                .add_repository(&owner, &name)
                .await
                .with_context(|| format!("adding {repo}"))?;
            let board = drain(&mut rx, BoardView::new());
            println!("Added {}\n", added.full_name);
            print!("{}", board.render(color));
        }
        Commands::Remove { repo } => {
            let (owner, name) = parse_repo_arg(&repo)?;
            match coordinator.remove_repository(&owner, &name)? {
                Some(removed) => println!("Removed {}", removed.full_name),
                None => println!("{repo} is not tracked"),
            }
        }
        Commands::Search { query, force } => {
            let results = coordinator
                .source()
                .search_repos(query.as_deref(), force)
                .await
                .context("searching repositories")?;
            let tracked = coordinator.repositories()?;
            print!("{}", view::render_search_results(&results, &tracked, color));
        }
        Commands::Status { force } => {
            coordinator.refresh_all(force, false).await?;
            let board = drain(&mut rx, BoardView::new());
            print!("{}", board.render(color));
        }
        Commands::Watch { interval } => {
            let interval = interval.map_or_else(|| config.refresh.interval(), Duration::from_secs);
            watch(&mut coordinator, &mut rx, interval, color).await?;
        }
        Commands::AutoRefresh { state } => {
            let enabled = matches!(state, Toggle::On);
            coordinator.set_auto_refresh(enabled)?;
            println!("Auto-refresh {}", if enabled { "enabled" } else { "disabled" });
        }
    }
    Ok(())
}

async fn watch(
    coordinator: &mut Coordinator,
    rx: &mut UnboundedReceiver<Event>,
    interval: Duration,
    color: bool,
) -> Result<()> {
    let mut board = BoardView::new();
    coordinator.start(interval);

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("listening for Ctrl-C")?;
                break;
            }
            event = rx.recv() => {
                let Some(event) = event else { break };
                board.apply(&event);
                match event {
                    Event::RefreshCompleted { .. } | Event::PollingRestarted { .. } => {
                        if color {
                            // Clear screen and home the cursor.
                            print!("\x1b[2J\x1b[H");
                        }
                        print!("{}", board.render(color));
                        println!(
                            "\nRefreshing every {}s. Press Ctrl-C to stop.",
                            interval.as_secs()
                        );
                    }
                    Event::PollingStopped { reason } => {
                        coordinator.stop();
                        bail!("auto-refresh stopped: {reason}");
                    }
                    _ => {}
                }
            }
        }
    }

    coordinator.stop();
    Ok(())
}

/// Fold every event already queued into `board`.
fn drain(rx: &mut UnboundedReceiver<Event>, mut board: BoardView) -> BoardView {
    while let Ok(event) = rx.try_recv() {
        board.apply(&event);
    }
    board
}

fn parse_repo_arg(input: &str) -> Result<(String, String)> {
    let Some(repo) = TrackedRepository::from_full_name(input) else {
        bail!("invalid repository {input:?}: expected owner/name");
    };
    Ok((repo.owner, repo.name))
}
