use anyhow::Context;
use clap::{Parser, Subcommand};
use rollback_combat::CombatState;
use rollback_combat::scenario::{self, ALDRIC, BRUTE};
use rollback_common::SnapshotIndex;
use rollback_kernel::{ManagerConfig, StateManager};
use rollback_logger::diff_values;
use rollback_snapshot::{Payload, SnapshotArchive};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rollback-cli", about = "CLI tool for rollback operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// State manager configuration (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and the effective configuration
    Info,
    /// Play a scripted skirmish, undo part of it and redo it again
    Replay {
        /// Number of rounds to play
        #[arg(short, long, default_value = "3")]
        rounds: u32,
        /// Number of commands to undo and redo
        #[arg(short, long, default_value = "5")]
        undo: usize,
        /// Print the state journal afterwards
        #[arg(long)]
        journal: bool,
    },
    /// Demonstrate snapshot and rollback
    Snapshot {
        /// Rounds played after the checkpoint
        #[arg(short, long, default_value = "2")]
        rounds: u32,
    },
    /// Structural diff of two JSON documents
    Diff {
        old: PathBuf,
        new: PathBuf,
        /// Recursion bound
        #[arg(long, default_value = "64")]
        max_depth: usize,
    },
    /// Play a skirmish with a snapshot per round and write the archive
    Export {
        /// Output archive path
        #[arg(short, long)]
        out: PathBuf,
        #[arg(short, long, default_value = "3")]
        rounds: u32,
    },
    /// List the snapshots in an archive, or print one as JSON
    Inspect {
        archive: PathBuf,
        /// Snapshot index to print
        #[arg(short, long)]
        index: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = match &cli.config {
        Some(path) => ManagerConfig::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ManagerConfig::default(),
    };
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Info => {
            println!("rollback-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("archive schema: v{}", rollback_snapshot::ARCHIVE_SCHEMA_VERSION);
            print!("{}", config.to_yaml_string()?);
        }
        Commands::Replay {
            rounds,
            undo,
            journal,
        } => replay(config, rounds, undo, journal).await?,
        Commands::Snapshot { rounds } => snapshot_demo(config, rounds).await?,
        Commands::Diff {
            old,
            new,
            max_depth,
        } => {
            let old = read_json(&old)?;
            let new = read_json(&new)?;
            let diff = diff_values(&old, &new, max_depth);
            println!("{}", serde_json::to_string_pretty(&diff)?);
        }
        Commands::Export { out, rounds } => export(config, &out, rounds).await?,
        Commands::Inspect { archive, index } => inspect(config, &archive, index).await?,
    }

    Ok(())
}

async fn replay(config: ManagerConfig, rounds: u32, undo: usize, journal: bool) -> anyhow::Result<()> {
    let mut manager = StateManager::with_config(scenario::skirmish_roster(), config);
    for command in scenario::skirmish(rounds) {
        manager.apply_command(command).await?;
    }
    let played = manager.get_state().await;
    println!(
        "Played {} commands: round={}, brute hp={}",
        manager.command_manager().len(),
        played.round(),
        hp(&played, BRUTE)
    );

    let mut undone = 0;
    while undone < undo && manager.undo().await?.is_some() {
        undone += 1;
    }
    let rewound = manager.get_state().await;
    println!(
        "Undid {undone}: round={}, brute hp={}",
        rewound.round(),
        hp(&rewound, BRUTE)
    );

    for _ in 0..undone {
        manager.redo().await?;
    }
    let replayed = manager.get_state().await;
    let expected = Payload::encode(&played)?.digest();
    let actual = Payload::encode(&replayed)?.digest();
    println!("Digest: {actual}");
    println!(
        "Match: {}",
        if actual == expected { "OK" } else { "MISMATCH" }
    );

    if journal {
        for entry in manager.logger().entries() {
            println!("{}", serde_json::to_string(entry)?);
        }
    }
    Ok(())
}

async fn snapshot_demo(config: ManagerConfig, rounds: u32) -> anyhow::Result<()> {
    let mut manager = StateManager::with_config(scenario::skirmish_roster(), config);
    let view = manager.view();
    for command in scenario::skirmish(1) {
        manager.apply_command(command).await?;
    }
    let checkpoint = manager.take_snapshot().await?;
    println!(
        "Snapshot {checkpoint}: aldric hp={}, brute hp={}",
        hp(&*view.read().await, ALDRIC),
        hp(&*view.read().await, BRUTE)
    );

    for command in scenario::skirmish(rounds).into_iter().skip(2) {
        manager.apply_command(command).await?;
    }
    println!(
        "After {rounds} more round(s): aldric hp={}, brute hp={}",
        hp(&*view.read().await, ALDRIC),
        hp(&*view.read().await, BRUTE)
    );

    manager.restore_snapshot(checkpoint).await?;
    println!(
        "After rollback: aldric hp={}, brute hp={}, history={}",
        hp(&*view.read().await, ALDRIC),
        hp(&*view.read().await, BRUTE),
        manager.command_manager().len()
    );
    Ok(())
}

async fn export(config: ManagerConfig, out: &Path, rounds: u32) -> anyhow::Result<()> {
    let mut manager = StateManager::with_config(scenario::skirmish_roster(), config);
    manager.take_snapshot().await?;
    // Opening commands first, then one snapshot per round.
    let mut script = scenario::skirmish(rounds).into_iter();
    for command in script.by_ref().take(2) {
        manager.apply_command(command).await?;
    }
    for (step, command) in script.enumerate() {
        manager.apply_command(command).await?;
        if (step + 1) % 6 == 0 {
            manager.take_snapshot().await?;
        }
    }

    let archive = manager.export_archive();
    let bytes = archive.to_bytes()?;
    std::fs::write(out, &bytes).with_context(|| format!("writing {}", out.display()))?;
    tracing::info!(path = %out.display(), snapshots = archive.len(), "archive written");
    println!(
        "Exported {} snapshot(s), {} bytes -> {}",
        archive.len(),
        bytes.len(),
        out.display()
    );
    Ok(())
}

async fn inspect(config: ManagerConfig, path: &Path, index: Option<u64>) -> anyhow::Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let archive = SnapshotArchive::from_bytes(&bytes)?;
    let manager = StateManager::<CombatState>::from_archive(archive, config)?;

    match index {
        Some(index) => {
            let index = SnapshotIndex(index);
            let entry = manager
                .snapshots()
                .get(index)
                .with_context(|| format!("snapshot {index} not in archive"))?;
            entry.verify()?;
            let state: CombatState = entry.payload.decode()?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        None => {
            for entry in manager.snapshots().iter() {
                entry.verify()?;
                println!(
                    "{}  t={}ms  {} bytes  sha256={}",
                    entry.index,
                    entry.timestamp.as_millis(),
                    entry.payload.len(),
                    entry.digest
                );
            }
            let latest = manager.get_state().await;
            println!(
                "Latest: phase={:?}, round={}, standing={:?}",
                latest.phase(),
                latest.round(),
                latest.standing_factions()
            );
        }
    }
    Ok(())
}

fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn hp(state: &CombatState, id: rollback_combat::CombatantId) -> i32 {
    state.get(id).map_or(0, |c| c.current_hp)
}
