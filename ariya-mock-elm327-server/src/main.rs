//! Mock ELM327 WiFi adapter plugged into a simulated Nissan Ariya
//!
//! Usage: cargo run -p ariya-mock-elm327-server -- [OPTIONS]
//! Then point the poller at 127.0.0.1:35000

use ariya_elm327_lib::{serve, VehicleProfile};
use clap::Parser;
use log::{error, info, LevelFilter};
use std::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "ariya-mock-elm327")]
#[command(about = "Simulated ELM327 WiFi adapter answering Ariya BMS and HV reads")]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:35000")]
    listen: String,

    /// 12V battery voltage reported by ATRV
    #[arg(short, long, default_value = "12.9")]
    aux_voltage: f64,

    /// State of charge in percent
    #[arg(short, long, default_value = "80.0")]
    soc: f64,

    /// HV pack voltage
    #[arg(long, default_value = "360.0")]
    hv_voltage: f64,

    /// Answer HV reads with NO DATA until an extended session is opened
    #[arg(short, long)]
    require_wakeup: bool,
}

fn main() {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Debug)
        .parse_default_env()
        .init();

    let args = Args::parse();
    let profile = VehicleProfile {
        aux_voltage: args.aux_voltage,
        soc_percent: args.soc,
        hv_voltage: args.hv_voltage,
        require_wakeup: args.require_wakeup,
    };

    info!("Mock ELM327 starting on {}...", args.listen);
    let listener = match TcpListener::bind(&args.listen) {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {}: {e}", args.listen);
            std::process::exit(1);
        }
    };
    info!("Mock ELM327 ready ({profile:?}) - waiting for connections...");

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                info!("Client connected: {:?}", stream.peer_addr());
                std::thread::spawn(move || {
                    if let Err(e) = serve(stream, profile) {
                        error!("Connection error: {e}");
                    }
                });
            }
            Err(e) => error!("Connection error: {e}"),
        }
    }
}
