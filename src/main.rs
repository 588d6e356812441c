//! Ponto - small rendezvous chat and file relay.
//!
//! This binary module is intentionally small: it parses CLI arguments and
//! delegates to the `server` or `client` modules.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use ponto::logging::ActivityLog;
use ponto::server::Server;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server and wait for incoming connections.
    Server {
        /// Port to listen on
        #[arg(value_parser)]
        port: u16,
        /// Activity log path
        #[arg(long, default_value = "ponto_log.jsonl")]
        log: PathBuf,
    },
    /// Connect to a relay server.
    Client {
        /// Server IP or hostname
        #[arg(value_parser)]
        ip: String,
        /// Server port
        #[arg(value_parser)]
        port: u16,
        /// Display name (defaults to the local username)
        #[arg(long)]
        name: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Server { port, log } => {
            let log = match ActivityLog::open(&log) {
                Ok(l) => l,
                Err(e) => {
                    eprintln!("Cannot open activity log: {}", e);
                    ActivityLog::disabled()
                }
            };
            let addr = format!("0.0.0.0:{}", port);
            let server = match Server::bind(&addr, log) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Cannot bind {}: {}", addr, e);
                    std::process::exit(1);
                }
            };
            println!("Server running on {}", addr);
            server.run();
        }
        Commands::Client { ip, port, name } => {
            let name = name.unwrap_or_else(whoami::username);
            if let Err(e) = ponto::client::run_client(&ip, port, &name) {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        }
    }
}
