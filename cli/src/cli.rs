use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use corelib::{EntityId, IngestBatch, Interval, RawBatch};
use serde::Deserialize;
use serde::de::DeserializeOwned;

#[derive(Debug, Parser)]
#[clap(name = "token-graph", version)]
pub struct Cli {
    /// Catalog JSON (pairs, tokens, base currency); falls back to CATALOG_PATH
    #[clap(long)]
    pub catalog: Option<PathBuf>,

    /// Pair tick batch files to ingest before querying
    #[clap(long = "ticks", value_delimiter = ',')]
    pub tick_files: Vec<PathBuf>,

    /// Token daily record batch files to ingest before querying
    #[clap(long = "days", value_delimiter = ',')]
    pub day_files: Vec<PathBuf>,

    /// Base currency symbol; defaults to the catalog's
    #[clap(long)]
    pub base: Option<String>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Snapshots of every listed token, by market cap
    List,

    /// Snapshot of one token
    Snapshot { symbol: String },

    /// Hourly chart data for one token
    History {
        symbol: String,

        #[clap(long, default_value = "168")]
        period_hours: i64,
    },

    /// Pairs and window to fetch upstream for one token
    Plan { symbol: String },
}

/// Upstream batch as stored on disk: the raw nanosecond batch plus what it covers.
#[derive(Debug, Deserialize)]
pub struct BatchFile<T> {
    #[serde(default)]
    pub interval: Interval,

    #[serde(default)]
    pub ids: Vec<EntityId>,

    #[serde(flatten)]
    pub raw: RawBatch<T>,
}

impl<T> BatchFile<T> {
    pub fn into_batch(self) -> IngestBatch<T> {
        self.raw.into_batch(self.interval, self.ids)
    }
}

pub async fn read_batch<T: DeserializeOwned>(path: &Path) -> anyhow::Result<IngestBatch<T>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading batch {}", path.display()))?;
    let file: BatchFile<T> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing batch {}", path.display()))?;
    Ok(file.into_batch())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands() {
        let cli = Cli::parse_from([
            "token-graph",
            "--catalog",
            "cat.json",
            "--ticks",
            "a.json,b.json",
            "history",
            "CHAT",
            "--period-hours",
            "24",
        ]);
        assert_eq!(cli.tick_files.len(), 2);
        assert!(matches!(
            cli.command,
            Command::History { ref symbol, period_hours: 24 } if symbol == "CHAT"
        ));
    }

    #[test]
    fn batch_file_defaults_to_hourly() {
        let file: BatchFile<corelib::Tick> = serde_json::from_str(
            r#"{ "ids": [4], "first": 3600000000000, "last": 3600000000000,
                 "data": [[{ "price": 1.5, "volume24h": 0, "depthBid": 1, "depthAsk": 2 }]] }"#,
        )
        .unwrap();
        let batch = file.into_batch();
        assert_eq!(batch.interval, Interval::T1h);
        assert_eq!(batch.start, 3_600);
        assert_eq!(batch.ids, vec![4]);
    }
}
