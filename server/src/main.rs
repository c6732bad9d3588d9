use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::network::Server;
use std::path::PathBuf;
use std::time::Duration;

/// Authoritative arena server.
/// Parses command-line arguments, loads the arena config, then runs the tick loop.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value = "8080")]
        port: u16,
        /// Tick rate (updates per second)
        #[clap(short, long, default_value = "30")]
        tick_rate: u32,
        /// Maximum number of connected participants
        #[clap(short, long, default_value = "8")]
        max_clients: usize,
        /// TOML file with arena layout and tuning; built-in defaults otherwise
        #[clap(short, long)]
        config: Option<PathBuf>,
        /// Number of AI karts to add to the arena
        #[clap(short, long, default_value = "0")]
        bots: usize,
    }

    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = ServerConfig::load(args.config.as_deref())?;
    let tick_rate = args.tick_rate.max(1);

    let address = format!("{}:{}", args.host, args.port);
    info!(
        "Starting arena server on {} at {} Hz (max {} clients, {} bots)",
        address, tick_rate, args.max_clients, args.bots
    );

    let mut server = Server::new(
        &address,
        Duration::from_secs_f64(1.0 / tick_rate as f64),
        args.max_clients,
        config,
        args.bots,
    )
    .await?;

    server.run().await
}
