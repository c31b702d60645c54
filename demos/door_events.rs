//! Example: Run one session and print every door event.
//!
//! Usage: cargo run --example door_events -- tcp://127.0.0.1:4000

use door_link::{LinkConfig, NetConnector, SessionController, SessionEvent};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let peer = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "14:41:05:05:88:77/1".to_string());
    let config = LinkConfig::builder().peer(peer.parse()?).build();

    let mut session =
        SessionController::new(config.peer.clone(), NetConnector::new(config.write_timeout));
    let mut events = session.subscribe();

    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::Event(code) => println!("Door event: {}", code),
                SessionEvent::Unrecognized(bytes) => {
                    println!("Noise: {:?}", String::from_utf8_lossy(&bytes))
                }
                SessionEvent::Terminated(reason) => {
                    println!("Session ended: {}", reason);
                    break;
                }
                other => println!("Session: {:?}", other),
            }
        }
    });

    let cancel = CancellationToken::new();
    let stop = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        println!("\nDisconnecting...");
        stop.cancel();
    });

    println!("Connecting to {} (Ctrl+C to stop)...", config.peer);
    if let Err(e) = session.run(&config, &cancel).await {
        println!("{} (exit code {})", e, e.exit_code());
    }
    Ok(())
}
