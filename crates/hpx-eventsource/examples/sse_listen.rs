//! Print every event from an SSE endpoint.
//!
//! ```sh
//! RUST_LOG=hpx_eventsource=debug cargo run --example sse_listen -- http://127.0.0.1:8080/events
//! ```

use hpx_eventsource::{EventSource, EventSourceConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://127.0.0.1:8080/events".to_string());

    let source = EventSource::connect_with(EventSourceConfig::new(url)).await?;
    let (handle, mut events) = source.split();

    tokio::spawn({
        let handle = handle.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.close();
            }
        }
    });

    while let Some(event) = events.next_event().await {
        println!("[{}] id={:?} {}", event.event_type(), event.id(), event.text());
    }

    println!("stream closed ({})", handle.ready_state());
    Ok(())
}
