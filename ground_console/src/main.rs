//! Ground console for the picofly link.
//!
//! Talks to a board flashed with the ground-station firmware: prints the
//! frames it relays and sends control updates up to the aircraft.

mod device;
mod display;

use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;

use picofly_link::config::serial;
use picofly_link::protocol::ControlUpdate;
use picofly_link::telemetry::Position;

use device::{resolve_port, RelayClient};
use display::print_frame;

#[derive(Parser)]
#[command(name = "ground-console")]
#[command(about = "Ground console for the picofly telemetry link")]
struct Args {
    /// Serial port of the ground relay (use "auto" to auto-detect)
    #[arg(short, long, default_value = "auto")]
    port: String,

    /// Baud rate
    #[arg(short, long, default_value_t = serial::BAUD_RATE)]
    baud: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print telemetry, signal strength and relay errors as they arrive
    Monitor {
        /// Stop after this many frames
        #[arg(short, long)]
        count: Option<usize>,
    },
    /// Send a new waypoint to the aircraft
    Waypoint {
        #[arg(allow_hyphen_values = true)]
        latitude: f64,
        #[arg(allow_hyphen_values = true)]
        longitude: f64,
    },
    /// Send a new altitude setpoint in metres
    Altitude {
        #[arg(allow_hyphen_values = true)]
        metres: f32,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let port = resolve_port(&args.port)?;

    println!("{}", "Picofly Ground Console".bold());
    println!("Port: {}", port);
    println!("Baud: {}", args.baud);
    println!();

    let mut relay = RelayClient::new(&port, args.baud)?;

    // Wait for bootloader output to finish, then clear buffer
    std::thread::sleep(Duration::from_millis(500));
    relay.drain_buffer()?;

    match args.command {
        Command::Monitor { count } => monitor(&mut relay, count),
        Command::Waypoint {
            latitude,
            longitude,
        } => {
            // The aircraft rejects a zero coordinate as an unset position
            if latitude == 0.0 || longitude == 0.0 {
                anyhow::bail!("Waypoint coordinates must both be non-zero");
            }
            let update = ControlUpdate::Waypoint(Position {
                latitude,
                longitude,
            });
            send(&mut relay, &update)
        }
        Command::Altitude { metres } => {
            if !metres.is_finite() {
                anyhow::bail!("Altitude must be a finite number");
            }
            send(&mut relay, &ControlUpdate::AltitudeSetpoint(metres))
        }
    }
}

fn monitor(relay: &mut RelayClient, count: Option<usize>) -> anyhow::Result<()> {
    println!("{}", "Listening (Ctrl-C to stop)...".green());

    let mut received = 0;
    while count.map_or(true, |limit| received < limit) {
        if let Some(frame) = relay.read_frame(Duration::from_secs(1))? {
            print_frame(&frame);
            received += 1;
        }
    }

    Ok(())
}

fn send(relay: &mut RelayClient, update: &ControlUpdate) -> anyhow::Result<()> {
    relay.send_control(update)?;
    println!("{} {:?}", "Queued:".green(), update);

    // The relay reports a failed transmission on the next cycle
    if let Some(frame) = relay.read_frame(Duration::from_secs(2))? {
        print_frame(&frame);
    }

    Ok(())
}
