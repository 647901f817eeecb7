//! Example demonstrating error handling.
//!
//! This example shows how to:
//! - Match on the classified error variants
//! - Read the raw body of failed responses
//! - Turn retrying off for a single call
//! - Plug in a custom error handler
//!
//! Run with: `cargo run --example error_handling`

use apiary::{Client, Error, ErrorHandler, RetryDecision};
use std::time::Duration;

/// Retries server errors up to three times on top of the default behavior.
struct PatientHandler;

impl ErrorHandler for PatientHandler {
    fn decide(&self, error: &Error, attempt: usize) -> RetryDecision {
        match error {
            Error::ServerError { .. } if attempt <= 3 => {
                RetryDecision::Retry(Duration::from_secs(attempt as u64))
            }
            _ => apiary::retry::DefaultErrorHandler.decide(error, attempt),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("apiary=info")
        .init();

    let client = Client::builder().build()?;

    println!("=== Example 1: Client Errors ===");
    // No credentials, so this fails with 400 or 401
    match client
        .api("api")?
        .join("users")
        .join("show")
        .get()
        .param("screen_name", "rustlang")
        .fetch()
        .await
    {
        Ok(user) => println!("Success: {}", user),
        Err(Error::ClientError {
            status,
            raw_response,
            ..
        }) => {
            println!("HTTP error {}", status);
            println!("Raw response: {}", raw_response);
        }
        Err(e) => println!("Other error: {}", e),
    }

    println!("\n=== Example 2: Rate Limits Without Retrying ===");
    match client
        .api("api")?
        .join("search")
        .join("tweets")
        .get()
        .param("q", "rust")
        .error_handling(false)
        .fetch()
        .await
    {
        Ok(results) => println!("Found {:?} results", results["statuses"].as_array().map(Vec::len)),
        Err(e @ Error::RateLimited { .. }) => {
            println!("Rate limited, reset in {:?}", e.reset_in());
        }
        Err(e) => println!("Error (retryable: {}): {}", e.is_retryable(), e),
    }

    println!("\n=== Example 3: Invalid Access Keys ===");
    let set = std::collections::HashSet::from(["api", "1.1"]);
    match client.api(set) {
        Ok(path) => println!("Unexpected path: {:?}", path),
        Err(Error::InvalidAccessKind(reason)) => println!("Rejected: {}", reason),
        Err(e) => println!("Other error: {}", e),
    }

    println!("\n=== Example 4: Custom Error Handler ===");
    let patient = Client::builder().error_handler(PatientHandler).build()?;
    match patient.api("api")?.join("help").join("configuration").get().fetch().await {
        Ok(config) => println!("Configuration has {:?} entries", config.len()),
        Err(e) => println!("Gave up: {} (status {:?})", e, e.status()),
    }

    Ok(())
}
