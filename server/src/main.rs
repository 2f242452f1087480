use clap::Parser;
use log::{error, info};
use server::master::MasterServer;
use shared::{NetConfig, UdpTransport};
use tokio::time::{interval, MissedTickBehavior};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the master and its workers to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Master port; workers use the ports directly above it
    #[arg(short, long, default_value_t = shared::DEFAULT_SERVER_PORT)]
    port: u16,

    /// Number of worker servers in the pool
    #[arg(short = 'm', long, default_value_t = shared::MAX_SERVERS)]
    max_servers: usize,

    /// Message loop ticks per second
    #[arg(short, long, default_value_t = shared::config::DEFAULT_TICK_RATE)]
    tick_rate: u32,
}

impl From<Args> for NetConfig {
    fn from(args: Args) -> Self {
        NetConfig {
            host: args.host,
            port: args.port,
            max_servers: args.max_servers,
            tick_rate: args.tick_rate,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = NetConfig::from(Args::parse());

    let transport = UdpTransport::bind(config.master_addr()?)?;
    let mut master = MasterServer::new(transport, config.max_servers, |index| {
        UdpTransport::bind(config.worker_addr(index)?)
    })?;

    info!(
        "Master listening on {} with {} workers at {} Hz",
        master.local_addr()?,
        config.max_servers,
        config.tick_rate
    );

    let mut tick_interval = interval(config.tick_duration());
    tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                if let Err(e) = master.tick() {
                    error!("Message loop failed: {}", e);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down gracefully...");
                break;
            }
        }
    }

    master.shutdown();
    Ok(())
}
