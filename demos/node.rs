use std::{str::FromStr, sync::mpsc, time::Instant};

use clap::Parser;
use tracing::{info, Level};

use kvdht::{Bytes, Dht, Id};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Port to listen on, random if omitted
    #[arg(short, long)]
    port: Option<u16>,
    /// Addresses of nodes to bootstrap from
    #[arg(short, long)]
    bootstrap: Vec<String>,
    /// Hex encoded node id, random if omitted
    #[arg(long)]
    id: Option<String>,
    /// Store this value under the hash of its bytes
    #[arg(long)]
    set: Option<String>,
    /// Hex encoded key to look up
    #[arg(long)]
    get: Option<String>,
    /// Show debug logs
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_thread_names(true)
        .init();

    let mut builder = Dht::builder().bootstrap(&cli.bootstrap);

    if let Some(port) = cli.port {
        builder = builder.port(port);
    }
    if let Some(id) = &cli.id {
        builder = builder.id(Id::from_str(id).expect("invalid id"));
    }

    let dht = builder.build().expect("failed to start the node");

    info!(
        id = %dht.id(),
        address = %dht.local_addr(),
        peers = dht.peer_store().peers().len(),
        "Listening"
    );

    if let Some(value) = cli.set {
        let key = Id::from_value(value.as_bytes());
        let start = Instant::now();

        match dht.set_value(&key, Bytes::from(value)) {
            Ok(()) => info!(%key, elapsed = ?start.elapsed(), "Stored value"),
            Err(error) => info!(%key, %error, "Failed to store value"),
        }
    }

    if let Some(key) = cli.get {
        let key = Id::from_str(&key).expect("invalid key");
        let start = Instant::now();

        match dht.get_value(&key) {
            Ok(value) => info!(
                %key,
                value = %String::from_utf8_lossy(&value),
                elapsed = ?start.elapsed(),
                "Found value"
            ),
            Err(error) => info!(%key, %error, "Failed to get value"),
        }
    }

    let (sender, receiver) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = sender.send(());
    })
    .expect("failed to set the ctrl-c handler");

    info!("Press Ctrl+C to stop");
    let _ = receiver.recv();

    info!(peers = dht.peer_store().peers().len(), "Shutting down");
    dht.shutdown();
}
