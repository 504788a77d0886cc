//! tidekv server entry point.
//!
//! Binds the TCP listener, wires the keyspace and expiry driver together,
//! and accepts connections until a shutdown signal arrives.

use std::sync::Arc;
use tidekv::commands::CommandHandler;
use tidekv::connection::{handle_connection, ServerStats};
use tidekv::storage::{start_expiry_driver, Keyspace};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Server configuration
struct Config {
    /// Port to listen on
    port: u16,
}

impl Config {
    /// Parses the single positional `<port>` argument.
    fn from_args() -> Self {
        let args: Vec<String> = std::env::args().collect();

        if args.len() != 2 {
            print_usage(&args[0]);
            std::process::exit(1);
        }

        let port = args[1].parse().unwrap_or_else(|_| {
            eprintln!("Error: invalid port number '{}'", args[1]);
            print_usage(&args[0]);
            std::process::exit(1);
        });

        Self { port }
    }

    /// Returns the bind address as a string.
    fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn print_usage(program: &str) {
    eprintln!(
        r#"tidekv - an in-memory key-value server

USAGE:
    {program} <port>

EXAMPLE:
    {program} 6380
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!("tidekv v{} starting", tidekv::VERSION);

    // The keyspace is shared across all connections and the expiry
    // driver.
    let keyspace = Arc::new(Keyspace::new());
    info!("Keyspace initialized");

    let _driver = start_expiry_driver(Arc::clone(&keyspace));

    let stats = Arc::new(ServerStats::new());

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Listening on {}", config.bind_address());

    let shutdown = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Shutdown signal received, stopping server...");
    };

    tokio::select! {
        _ = accept_loop(listener, keyspace, stats) => {}
        _ = shutdown => {}
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Accepts incoming connections and spawns one task per client.
async fn accept_loop(
    listener: TcpListener,
    keyspace: Arc<Keyspace>,
    stats: Arc<ServerStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let commands = CommandHandler::new(Arc::clone(&keyspace));
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    handle_connection(stream, addr, commands, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
