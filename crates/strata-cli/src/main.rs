//! `strata`, the command-line client for the strata server.
//!
//! # Usage
//!
//! ```text
//! strata --url http://127.0.0.1:3000 upload --table boat_data uploads/
//! strata query boat_data --where speed=12
//! strata --config ~/.config/strata/config.toml sources boat_data
//! ```

mod batch;
mod client;

use std::{io::Write as _, path::PathBuf, time::Duration};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "strata", about = "Command-line client for the strata CSV server")]
struct Args {
  /// Path to a TOML config file (url).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the strata server (default: http://127.0.0.1:3000).
  #[arg(long, env = "STRATA_URL")]
  url: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List registered tables.
  Tables,

  /// Show the live column list of a table.
  Schema { table: String },

  /// List the sources loaded into a table.
  Sources { table: String },

  /// Upload CSV files; directories contribute their `*.csv` files.
  Upload {
    #[arg(short, long)]
    table: String,

    /// Pause between files, in milliseconds.
    #[arg(long, default_value_t = 500)]
    delay_ms: u64,

    #[arg(required = true)]
    paths: Vec<PathBuf>,
  },

  /// Print rows as JSON, optionally filtered by `column=value` pairs.
  Query {
    table: String,

    /// Equality filter; repeatable, combined with AND.
    #[arg(short = 'w', long = "where", value_name = "COLUMN=VALUE", value_parser = parse_filter)]
    filters: Vec<(String, String)>,

    /// Fetch a single row by id instead.
    #[arg(long, conflicts_with = "filters")]
    id: Option<i64>,
  },

  /// Download a source as CSV.
  Download {
    table: String,
    file: String,

    /// Write to this path instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
  },

  /// Delete a source's rows and stored file.
  Delete { table: String, file: String },
}

fn parse_filter(s: &str) -> Result<(String, String), String> {
  s.split_once('=')
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .ok_or_else(|| format!("expected COLUMN=VALUE, got {s:?}"))
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url: String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  // Load config file if provided.
  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: args
      .url
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://127.0.0.1:3000".to_string()),
  };
  let client = ApiClient::new(api_config)?;

  match args.command {
    Command::Tables => {
      for table in client.list_tables().await? {
        println!("{table}");
      }
    }
    Command::Schema { table } => {
      for column in client.schema(&table).await?.columns {
        println!("{column}");
      }
    }
    Command::Sources { table } => {
      for source in client.list_sources(&table).await? {
        println!("{source}");
      }
    }
    Command::Upload { table, delay_ms, paths } => {
      let files = batch::collect_files(&paths)?;
      if files.is_empty() {
        return Err(anyhow!("no CSV files found"));
      }
      println!("found {} file(s) to upload to {table}", files.len());

      let summary =
        batch::upload_all(&client, &table, &files, Duration::from_millis(delay_ms)).await;
      println!("\n{summary}");
      if summary.failed > 0 {
        std::process::exit(1);
      }
    }
    Command::Query { table, filters, id } => {
      let value = match id {
        Some(id) => client.get_row(&table, id).await?,
        None => serde_json::Value::Array(client.query(&table, &filters).await?),
      };
      println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Command::Download { table, file, output } => {
      let bytes = client.download(&table, &file).await?;
      match output {
        Some(path) => std::fs::write(&path, &bytes)
          .with_context(|| format!("writing {}", path.display()))?,
        None => std::io::stdout()
          .write_all(&bytes)
          .context("writing to stdout")?,
      }
    }
    Command::Delete { table, file } => {
      let receipt = client.delete(&table, &file).await?;
      println!(
        "deleted {} row(s){}",
        receipt.rows_deleted,
        if receipt.file_deleted { " and the stored file" } else { "" }
      );
    }
  }

  Ok(())
}
