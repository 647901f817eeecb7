//! Basic example demonstrating access chains and REST calls.
//!
//! This example shows how to:
//! - Create a client with a bearer token
//! - Address endpoints with access chains
//! - Send GET and POST calls with parameters
//! - Read the payload and response metadata
//!
//! Run with: `BEARER_TOKEN=... cargo run --example basic_call`

use apiary::{BearerToken, Client, Error};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct User {
    id: u64,
    screen_name: String,
    followers_count: u64,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("apiary=debug,basic_call=info")
        .init();

    let token = std::env::var("BEARER_TOKEN").unwrap_or_default();
    let client = Client::builder()
        .auth(BearerToken::new(token)?)
        .build()?;

    println!("=== GET Request Example ===");
    // GET https://api.twitter.com/1.1/users/show.json?screen_name=rustlang
    let user = client
        .api("api")?
        .join("users")
        .join("show")
        .get()
        .param("screen_name", "rustlang")
        .fetch()
        .await?;

    println!("Screen name: {}", user["screen_name"]);
    println!("Followers: {}", user["followers_count"]);
    println!("Served from: {}", user.url);
    println!(
        "Rate limit left: {}",
        user.header("x-rate-limit-remaining").unwrap_or("unknown")
    );

    let typed: User = user.deserialize()?;
    println!("Typed: {:?}", typed);

    println!("\n=== Iterating a Timeline ===");
    let statuses = client.api("api")?.join("statuses");
    let timeline = statuses
        .join("user_timeline")
        .get()
        .params([("screen_name", "rustlang"), ("count", "5")])
        .param("exclude_replies", true)
        .fetch()
        .await?;

    for tweet in &timeline {
        println!("- {}", tweet["text"]);
    }

    println!("\n=== POST Request Example ===");
    // Parameters of POST calls are sent as a form body
    let tweet = statuses
        .join("update")
        .post()
        .param("status", "Hello from apiary")
        .fetch()
        .await?;
    println!("Created tweet {}", tweet["id_str"]);

    println!("\n=== Other APIs ===");
    let upload = client.api(("upload", "1.1"))?.join("media").join("upload");
    println!("Upload endpoint: {}", upload.url());

    Ok(())
}
