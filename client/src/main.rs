use clap::Parser;
use client::network::Client;
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name shown on the scoreboard
    #[arg(short = 'n', long, default_value = "bot")]
    name: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Seconds to stay connected (0 runs until disconnected)
    #[arg(short = 'd', long, default_value = "0")]
    duration: u64,

    /// Seed for the bot's driving decisions
    #[arg(long, default_value = "1")]
    seed: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }

    let duration = (args.duration > 0).then(|| Duration::from_secs(args.duration));
    let mut client = Client::new(&args.server, &args.name, args.fake_ping, args.seed).await?;

    client.run(duration).await?;

    Ok(())
}
