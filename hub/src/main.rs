use clap::Parser;
use hub::relay;

/// Relay hub for the shared world: accepts participant sessions, keeps
/// the last-known snapshot per connection and the canonical map, and
/// fans every change out to all sessions.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();
    let args = Args::parse();

    let hub = relay::Hub::bind(&format!("{}:{}", args.host, args.port)).await?;
    hub.run().await?;
    Ok(())
}
