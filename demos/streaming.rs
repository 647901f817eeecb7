//! Example demonstrating streaming endpoints.
//!
//! Opens the sample stream, prints a few records and closes it. Dropped
//! connections are reopened with a doubling backoff, which shows up in the
//! logs with `RUST_LOG=apiary=debug`.
//!
//! Run with: `BEARER_TOKEN=... cargo run --example streaming`

use apiary::{BearerToken, Client, StreamConfig};
use futures::StreamExt;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("apiary=info")),
        )
        .init();

    let token = std::env::var("BEARER_TOKEN").unwrap_or_default();
    let client = Client::builder()
        .auth(BearerToken::new(token)?)
        .stream_config(StreamConfig {
            initial_backoff: Duration::from_secs(5),
            jitter: true,
            ..StreamConfig::default()
        })
        .build()?;

    let mut sample = client
        .api("stream")?
        .join("statuses")
        .join("sample")
        .get()
        .param("language", "en")
        .stream()?;

    let mut seen = 0;
    while let Some(record) = sample.next().await {
        let record = record?;
        if let Some(text) = record["text"].as_str() {
            println!("[{}] {}", sample.state() as u8, text);
            seen += 1;
        }
        if seen == 10 {
            break;
        }
    }

    println!("Reconnects: {}", sample.reconnects());
    sample.close();
    println!("State: {:?}", sample.state());

    Ok(())
}
