use clap::Parser;
use client::network::Peer;
use log::{debug, error, info, warn};
use shared::{MessageHandler, SpatialPose, UdpTransport};
use std::net::SocketAddr;
use tokio::time::{interval, Duration, MissedTickBehavior};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Master server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:7777")]
    master: SocketAddr,

    /// Local address to bind
    #[arg(short, long, default_value = "0.0.0.0:0")]
    bind: SocketAddr,

    /// Message loop ticks per second
    #[arg(short, long, default_value_t = shared::config::DEFAULT_TICK_RATE)]
    tick_rate: u32,

    /// Ticks between pose updates
    #[arg(short = 'i', long, default_value = "30")]
    pose_interval: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to master at {}", args.master);

    let mut peer = Peer::new();
    peer.initialize(UdpTransport::bind(args.bind)?, args.master)?;
    peer.set_pose(SpatialPose::identity());

    let mut tick_interval = interval(Duration::from_micros(
        1_000_000 / u64::from(args.tick_rate.max(1)),
    ));
    tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut tick: u64 = 0;

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                if let Err(e) = peer.message_loop() {
                    error!("Message loop failed: {}", e);
                    break;
                }

                tick += 1;
                if args.pose_interval > 0 && tick % args.pose_interval == 0 {
                    if peer.is_rejected() {
                        info!("Asking master for a server again");
                        if let Err(e) = peer.request_server() {
                            error!("Failed to ask master for a server: {}", e);
                        }
                        continue;
                    }

                    if let Some(mut pose) = peer.pose().copied() {
                        pose.rotate[1] = (tick as f32 * 0.01) % std::f32::consts::TAU;
                        peer.set_pose(pose);
                    }
                    let Some(server) = peer.assigned_server() else {
                        warn!("No server assigned yet");
                        continue;
                    };
                    if let Some(pose) = peer.server_pose() {
                        debug!("{} last reported rotation {:?}", server, pose.rotate);
                    }
                    if let Err(e) = peer.send_pose().and_then(|_| peer.request_pose()) {
                        error!("Failed to exchange poses with {}: {}", server, e);
                    }
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, disconnecting...");
                break;
            }
        }
    }

    peer.disconnect()?;
    Ok(())
}
