//! Match Simulator CLI Tool
//!
//! In-process simulation that drives the queue store and match engine
//! with randomized participants, for eyeballing matching behavior and
//! bucket distribution without a running server.
//!
//! Usage:
//!   cargo run --bin match-sim -- --participants 200
//!   cargo run --bin match-sim -- --participants 50 --any-ratio 0.3

use anyhow::Result;
use clap::Parser;
use cloak_room::matching::MatchEngine;
use cloak_room::queue::{MemoryQueueStore, QueueStore};
use cloak_room::session::SessionRegistry;
use cloak_room::types::{Gender, Preference, QueueEntry};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "match-sim")]
#[command(about = "Randomized in-process matchmaking simulation")]
struct Cli {
    /// Number of simulated participants
    #[arg(short, long, default_value = "100")]
    participants: usize,

    /// Fraction of participants with an "any" preference
    #[arg(long, default_value = "0.5")]
    any_ratio: f64,

    /// Fraction of participants with no usable gender label
    #[arg(long, default_value = "0.05")]
    unlabeled_ratio: f64,
}

fn random_participant(index: usize, cli: &Cli) -> QueueEntry {
    let mut rng = rand::thread_rng();

    let gender = if rng.gen_bool(cli.unlabeled_ratio) {
        None
    } else if rng.gen_bool(0.5) {
        Some(Gender::Male)
    } else {
        Some(Gender::Female)
    };

    let looking_for = if rng.gen_bool(cli.any_ratio) {
        Preference::Any
    } else if rng.gen_bool(0.5) {
        Preference::Male
    } else {
        Preference::Female
    };

    QueueEntry::new(format!("sim-{:04}", index), gender, looking_for)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    println!(
        "Simulating {} participants (any ratio: {:.0}%, unlabeled: {:.0}%)",
        cli.participants,
        cli.any_ratio * 100.0,
        cli.unlabeled_ratio * 100.0
    );

    let store: Arc<dyn QueueStore> = Arc::new(MemoryQueueStore::new());
    let registry = Arc::new(SessionRegistry::new(Duration::ZERO));
    let engine = MatchEngine::new(Arc::clone(&store), Arc::clone(&registry));

    let mut matched = 0usize;
    for index in 0..cli.participants {
        let entry = random_participant(index, &cli);
        store.enqueue(entry.clone()).await?;

        if let Some(partner) = engine.find_match(&entry).await? {
            matched += 2;
            println!(
                "  match: {} ({:?}, wants {}) <-> {} ({:?}, wants {})",
                entry.device_id,
                entry.gender,
                entry.looking_for,
                partner.device_id,
                partner.gender,
                partner.looking_for
            );
            // Pairing bookkeeping is not part of the simulation
            registry.clear_pair(&entry.device_id)?;
        }
    }

    let stats = store.stats().await?;
    println!("────────────────────────────────────────");
    println!("Matched:    {} participants", matched);
    println!("Unmatched:  {} participants", stats.total());
    println!(
        "Leftover queue depth: male={} female={} other={}",
        stats.male, stats.female, stats.other
    );

    Ok(())
}
