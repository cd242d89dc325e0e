//! aiondb command line - interactive SQL shell over the in-process transport

use aiondb::{ChannelEndpoint, DriverConn, Engine, EngineConfig, Reply};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "aiondb", version, about = "Embeddable in-memory SQL engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive SQL shell
    Shell {
        /// JSON engine configuration
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the version
    Version,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("AIONDB_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    match Cli::parse().command {
        Command::Shell { config } => shell(config),
        Command::Version => {
            println!("aiondb v{}", VERSION);
            Ok(())
        }
    }
}

fn shell(config_path: Option<PathBuf>) -> Result<()> {
    let config = match &config_path {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let endpoint = Arc::new(ChannelEndpoint::new(config.channel_capacity));
    let engine = Engine::new(config)?;
    engine.listen(endpoint.clone())?;
    let driver = endpoint.connect()?;

    println!("aiondb v{}", VERSION);
    println!("Type '.help' for help, '.exit' to quit\n");

    let stdin = io::stdin();
    let mut line = String::new();
    let mut pending = String::new();

    loop {
        print!("{}", if pending.is_empty() { "aiondb> " } else { "     -> " });
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();

        if pending.is_empty() && input.starts_with('.') {
            match input {
                ".exit" | ".quit" => break,
                ".help" => print_help(),
                ".tables" => {
                    for name in engine.catalog().names() {
                        println!("{}", name);
                    }
                }
                other => eprintln!("unknown command: {}", other),
            }
            continue;
        }

        pending.push_str(&line);
        if !input.ends_with(';') {
            continue;
        }
        run(&driver, &pending)?;
        pending.clear();
    }

    drop(driver);
    engine.stop();
    Ok(())
}

fn run(driver: &DriverConn, sql: &str) -> Result<()> {
    for reply in driver.query_batch(sql)? {
        match reply {
            Reply::Result {
                last_id,
                rows_affected,
            } => println!("ok: last id {}, {} row(s) affected", last_id, rows_affected),
            Reply::Rows { header, rows } => {
                println!("{}", header.join("\t"));
                for row in &rows {
                    println!("{}", row.join("\t"));
                }
                println!("({} row(s))", rows.len());
            }
            Reply::Error(message) => eprintln!("error: {}", message),
        }
    }
    Ok(())
}

fn print_help() {
    println!(
        r#"
Statements end with ';' and may span several lines.

Commands:
  .tables   list tables
  .help     show this help
  .exit     quit
"#
    );
}
