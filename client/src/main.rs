use clap::Parser;
use client::game::{InputCommand, World};
use client::reconciler::{self, Control};
use client::session::{Session, SessionEvent};
use log::{info, warn};
use shared::map::BlockMap;
use shared::Message;
use std::path::PathBuf;
use tokio::time::{interval, Duration};

/// Headless participant: connects to a relay hub, runs the full world
/// simulation and publishes snapshots, without rendering or input.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Hub address to connect to
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Nickname shown to other participants
    #[arg(short, long, default_value = "player")]
    name: String,

    /// Map file (JSON) to submit if the hub has none yet
    #[arg(short, long)]
    map: Option<PathBuf>,

    /// Simulation ticks per second
    #[arg(short, long, default_value = "30")]
    tick_rate: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut session = Session::connect(&args.server).await?;
    info!("connected to {} as {}", args.server, session.local_key());

    let mut world = World::new(&args.name);

    // The hub's first message is always the canonical map, or the
    // explicit empty marker when this participant is the first one in.
    match wait_for_map(&mut session).await? {
        Some(blocks) => world.load_map(blocks),
        None => {
            let path = args
                .map
                .ok_or("hub has no map yet; submit one with --map")?;
            let text = tokio::fs::read_to_string(&path).await?;
            let blocks: BlockMap = serde_json::from_str(&text)?;
            session
                .send(&Message::Map {
                    map: Some(blocks.clone()),
                })
                .await?;
            world.load_map(blocks);
            info!("submitted map {}", path.display());
        }
    }

    let mut ticker = interval(Duration::from_millis(1000 / args.tick_rate.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !run_tick(&mut session, &mut world).await? {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("leaving");
                session
                    .send(&Message::Leave { disconnect: true, id: world.me.id })
                    .await?;
                break;
            }
        }
    }
    Ok(())
}

/// One simulation tick: drain everything the hub sent, advance the
/// world, push out any door toggle and the snapshot. Returns false once
/// the session is over.
async fn run_tick(
    session: &mut Session,
    world: &mut World,
) -> Result<bool, Box<dyn std::error::Error>> {
    while let Some(event) = session.try_recv() {
        match event {
            SessionEvent::Message(message) => {
                if reconciler::apply_message(world, session.local_key(), message)
                    == Control::Shutdown
                {
                    info!("hub is shutting down");
                    return Ok(false);
                }
            }
            SessionEvent::Disconnected => {
                warn!("lost connection to the hub");
                return Ok(false);
            }
        }
    }

    world.tick(&InputCommand::default());

    if let Some(blocks) = world.take_map_update() {
        session.send(&Message::Map { map: Some(blocks) }).await?;
    }
    session.send(&Message::Snapshot(world.snapshot())).await?;
    Ok(true)
}

async fn wait_for_map(
    session: &mut Session,
) -> Result<Option<BlockMap>, Box<dyn std::error::Error>> {
    while let Some(event) = session.recv().await {
        match event {
            SessionEvent::Message(Message::Map { map }) => return Ok(map),
            SessionEvent::Message(other) => {
                warn!("ignoring pre-handshake message: {:?}", other)
            }
            SessionEvent::Disconnected => break,
        }
    }
    Err("connection closed before the map handshake".into())
}
