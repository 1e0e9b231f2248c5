//! Command-line front end.
//!
//! Every command resolves the configuration, opens the port database for the
//! duration of one query and prints the result.

use std::path::PathBuf;
use anyhow::Result;
use clap::{Parser, Subcommand};
use shared::types::{PortRecord, StoreStatus};
use crate::config::Config;
use crate::store::db::PortDb;
use crate::{import, query, server};

#[derive(Debug, Parser)]
#[command(name = "whatport", version, about = "Look up well-known ports and the services behind them")]
pub struct Cli {
    /// Config file (defaults to the per-user config.toml when it exists)
    #[arg(long, global = true, env = "WHATPORT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port database, overrides `store.db_path`
    #[arg(long, global = true, env = "WHATPORT_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Find services by port number or name
    Lookup {
        /// Port number (digits only) or service name
        key: String,

        /// Match the key anywhere in the port or name
        #[arg(long)]
        like: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the description registered for a protocol
    Describe {
        protocol: String,
    },

    /// Replace the database contents with a JSON dataset
    Import {
        file: PathBuf,
    },

    /// Show how many records are loaded and where they came from
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Serve lookups over HTTP
    Serve {
        /// Listen address, overrides `api.listen`
        #[arg(long)]
        listen: Option<String>,
    },
}

impl Command {
    pub fn is_long_running(&self) -> bool {
        matches!(self, Command::Serve { .. })
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::resolve(cli.config.as_deref())?;
    if let Some(db_path) = cli.db {
        config.store.db_path = db_path;
    }
    tracing::debug!("Using port database {}", config.store.db_path.display());

    match cli.command {
        Command::Lookup { key, like, json } => {
            let db = PortDb::open_existing(&config.store.db_path)?;
            let records = query::lookup(&db, &key, like)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No ports found for '{}'", key);
            } else {
                print!("{}", render_table(&records));
            }
        }
        Command::Describe { protocol } => {
            let db = PortDb::open_existing(&config.store.db_path)?;
            println!("{}", query::describe(&db, &protocol)?);
        }
        Command::Import { file } => {
            let mut db = PortDb::open(&config.store.db_path)?;
            let written = import::import_file(&mut db, &file)?;
            println!(
                "Imported {} records into {}",
                written,
                config.store.db_path.display()
            );
        }
        Command::Status { json } => {
            let db = PortDb::open_existing(&config.store.db_path)?;
            let status = db.status()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print!("{}", render_status(&status));
            }
        }
        Command::Serve { listen } => {
            if let Some(listen) = listen {
                config.api.listen = listen;
            }
            server::run(config).await?;
        }
    }

    Ok(())
}

/// Aligned NAME/PORT/PROTOCOL/DESCRIPTION table, one line per record
pub fn render_table(records: &[PortRecord]) -> String {
    let header = ["NAME", "PORT", "PROTOCOL", "DESCRIPTION"].map(String::from);
    let rows: Vec<[String; 4]> = records
        .iter()
        .map(|r| {
            [
                r.name.clone(),
                r.port.to_string(),
                r.protocol.clone(),
                r.description.clone(),
            ]
        })
        .collect();

    let mut widths = [0usize; 4];
    for row in std::iter::once(&header).chain(&rows) {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for row in std::iter::once(&header).chain(&rows) {
        let line = format!(
            "{:<w0$}  {:<w1$}  {:<w2$}  {}",
            row[0],
            row[1],
            row[2],
            row[3],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
        );
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

fn render_status(status: &StoreStatus) -> String {
    let imported_at = status
        .imported_at
        .map(|ts| ts.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    let source = status
        .source
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "-".to_string());

    format!(
        "records:  {}\nimported: {}\nsource:   {}\n",
        status.records, imported_at, source
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_table_aligns_columns() {
        let table = render_table(&[
            PortRecord::new("http", 80, "tcp, udp", "World Wide Web HTTP"),
            PortRecord::new("http-alt", 8080, "tcp", ""),
        ]);

        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(
            lines,
            vec![
                "NAME      PORT  PROTOCOL  DESCRIPTION",
                "http      80    tcp, udp  World Wide Web HTTP",
                "http-alt  8080  tcp",
            ]
        );
    }

    #[test]
    fn test_render_status_without_import() {
        let text = render_status(&StoreStatus {
            records: 0,
            imported_at: None,
            source: None,
        });

        assert_eq!(text, "records:  0\nimported: never\nsource:   -\n");
    }

    #[test]
    fn test_parse_lookup_args() {
        let cli = Cli::parse_from(["whatport", "--db", "/tmp/p.db", "lookup", "http", "--like"]);

        assert_eq!(cli.db, Some(PathBuf::from("/tmp/p.db")));
        match cli.command {
            Command::Lookup { key, like, json } => {
                assert_eq!(key, "http");
                assert!(like);
                assert!(!json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lookup_against_missing_store_fails() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("ports.db");
        let absent = dir.path().join("absent.toml");
        let cli = Cli::parse_from(["whatport", "--config", absent.to_str().unwrap(), "lookup", "80"]);

        // An explicit config path that does not exist is itself an error
        assert!(run(cli).await.is_err());

        let config_path = dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            format!("[store]\ndb_path = {:?}\n", db_path.display().to_string()),
        )
        .unwrap();
        let cli = Cli::parse_from(["whatport", "--config", config_path.to_str().unwrap(), "lookup", "80"]);

        let err = run(cli).await.unwrap_err();
        let store_err = err.downcast_ref::<crate::error::StoreError>().unwrap();
        assert!(store_err.is_missing());
        assert!(!db_path.exists());
    }
}
