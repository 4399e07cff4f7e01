//! Matchmaking and WebRTC signaling relay server.
//!
//! Pairs anonymous participants into 1:1 practice rooms and relays the
//! handshake messages their browsers need to establish a direct connection.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin server
//! cargo run --bin server -- --host 0.0.0.0 --port 3000 --no-geo
//! ```

use std::sync::Arc;

use clap::Parser;
use tandem_signaling::{
    common::logger::setup_logger,
    geo::{CountryResolver, HttpCountryResolver},
    server::run_server,
};

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Matchmaking and WebRTC signaling relay server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// ip-api.com-compatible endpoint used to resolve peer countries
    #[arg(long, default_value = "http://ip-api.com/json")]
    geo_endpoint: String,

    /// Disable geography lookups; every peer shows as "Unknown"
    #[arg(long)]
    no_geo: bool,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    let geo: Option<Arc<dyn CountryResolver>> = if args.no_geo {
        None
    } else {
        match HttpCountryResolver::new(args.geo_endpoint.clone()) {
            Ok(resolver) => Some(Arc::new(resolver)),
            Err(e) => {
                tracing::warn!("Geography lookup disabled: {}", e);
                None
            }
        }
    };

    if let Err(e) = run_server(args.host, args.port, geo).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
