use std::path::{Path, PathBuf};

use aegis_replay::{
    feed::{FeedSender, RoundFeed},
    snapshot::RoundPayload,
    world_file::{self, WorldFileLoader},
    ClientConfig, Simulation,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about = "Aegis round log replayer")]
struct Cli {
    /// Path to the client configuration YAML file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replay a JSON-lines round log and print the resulting statistics.
    Replay {
        /// One round payload per line
        log: PathBuf,

        /// World file to use as the round 0 draft
        #[arg(long)]
        world: Option<PathBuf>,

        /// Round to report on (defaults to the last one ingested)
        #[arg(long, allow_negative_numbers = true)]
        round: Option<i64>,
    },
    /// Validate a world file for export.
    Check {
        /// Path to the `.world` file
        world: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Replay { log, world, round } => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to build the tokio runtime")?;
            runtime.block_on(replay(config, log, world, round))
        }
        Command::Check { world } => check(&world),
    }
}

async fn replay(
    config: ClientConfig,
    log: PathBuf,
    world: Option<PathBuf>,
    round: Option<i64>,
) -> Result<()> {
    let mut simulation = match world {
        Some(path) => {
            let draft = WorldFileLoader::new(".").load(&path)?.to_world()?;
            Simulation::with_world(config.clone(), draft)
        }
        None => Simulation::new(config.clone()),
    };

    let feed = RoundFeed::new(config.playback.feed_capacity);
    let reader = tokio::spawn(read_log(log, feed.sender()));

    let report = tokio::select! {
        report = feed.run(&mut simulation) => Some(report),
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, reporting rounds ingested so far");
            None
        }
    };
    if report.is_some() {
        let lines = reader.await??;
        info!(lines, "round log consumed");
    } else {
        reader.abort();
    }

    if let Some(round) = round {
        simulation.set_current_round(round);
    }
    let summary = json!({
        "game": simulation.current_game(),
        "games": simulation.games().len(),
        "state": simulation.state(),
        "stats": simulation.stats(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Some(report) = report {
        if !report.is_clean() {
            for error in &report.rejected {
                warn!(%error, "rejected payload");
            }
            bail!("{} round payloads were rejected", report.rejected.len());
        }
    }
    Ok(())
}

async fn read_log(path: PathBuf, sender: FeedSender) -> Result<usize> {
    let file = tokio::fs::File::open(&path)
        .await
        .with_context(|| format!("Failed to open round log {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();
    let mut count = 0;
    while let Some(line) = lines.next_line().await? {
        count += 1;
        if line.trim().is_empty() {
            continue;
        }
        let payload = RoundPayload::from_json(&line)
            .with_context(|| format!("{}:{count}: malformed round payload", path.display()))?;
        if sender.send(payload).await.is_err() {
            break;
        }
    }
    Ok(count)
}

fn check(path: &Path) -> Result<()> {
    let file = WorldFileLoader::new(".").load(path)?;
    let world = file
        .to_world()
        .with_context(|| format!("{} does not describe a valid grid", path.display()))?;
    world_file::validate(&world).with_context(|| format!("{} cannot be exported", path.display()))?;

    let counts = world.counts();
    let (min_cost, max_cost) = world.move_cost_range().unwrap_or((1, 1));
    println!(
        "{}: {}x{} grid, {} spawn zones, {} survivors, move cost {}..={}",
        path.display(),
        world.width(),
        world.height(),
        world.spawn_zones().count(),
        counts.total_survivors(),
        min_cost,
        max_cost
    );
    Ok(())
}
