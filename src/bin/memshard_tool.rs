use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use memshard::{Hashing, ShardedClient, TopologyConfig};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "memshard-tool")]
#[command(about = "Inspect key placement for a memshard topology")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the tag and owning shard of each key
    Route {
        #[arg(long)]
        topology: PathBuf,
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Route random keys and print each shard's share
    Distribution {
        #[arg(long)]
        topology: PathBuf,
        #[arg(long, default_value_t = 100_000)]
        keys: usize,
        /// Override the topology's hash algorithm
        #[arg(long)]
        hashing: Option<Hashing>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Route { topology, keys } => route(&topology, &keys),
        Command::Distribution {
            topology,
            keys,
            hashing,
        } => distribution(&topology, keys, hashing),
    }
}

fn load(path: &Path) -> Result<TopologyConfig> {
    TopologyConfig::from_file(path)
        .with_context(|| format!("Failed to load topology '{}'", path.display()))
}

fn shard_label(client: &ShardedClient, index: usize) -> String {
    let shard = &client.router().shards()[index];
    match &shard.name {
        Some(name) => format!("{} ({})", name, shard.address()),
        None => shard.address(),
    }
}

fn route(path: &Path, keys: &[String]) -> Result<()> {
    let client = ShardedClient::from_topology(&load(path)?)?;

    for key in keys {
        let index = client.router().shard_index(key)?;
        println!(
            "{}\ttag={}\tshard={}",
            key,
            client.key_tag(key),
            shard_label(&client, index)
        );
    }
    Ok(())
}

fn distribution(path: &Path, keys: usize, hashing: Option<Hashing>) -> Result<()> {
    if keys == 0 {
        return Err(anyhow!("--keys must be greater than 0"));
    }

    let mut topology = load(path)?;
    if let Some(hashing) = hashing {
        topology.hashing = hashing;
    }
    let client = ShardedClient::from_topology(&topology)?;

    let mut counts = vec![0usize; client.router().shard_count()];
    for _ in 0..keys {
        let key = Uuid::new_v4().to_string();
        counts[client.router().shard_index(&key)?] += 1;
    }

    let total_weight: u32 = topology.shards.iter().map(|s| s.weight).sum();
    println!(
        "{} keys over {} shards ({} hashing, {} virtual nodes)",
        keys,
        counts.len(),
        topology.hashing,
        client.router().virtual_node_count()
    );
    for (index, count) in counts.iter().enumerate() {
        let expected = topology.shards[index].weight as f64 / total_weight as f64;
        println!(
            "{:<32} {:>8} {:>7.2}% (expected {:.2}%)",
            shard_label(&client, index),
            count,
            *count as f64 * 100.0 / keys as f64,
            expected * 100.0
        );
    }
    Ok(())
}
