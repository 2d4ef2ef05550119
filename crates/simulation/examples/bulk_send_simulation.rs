//! Walk through the three send shapes against simulated providers.
//!
//! Run with: cargo run -p outpost-simulation --example bulk_send_simulation
//!
//! Set `RUST_LOG=outpost_executor=debug` to watch retries and polls.

use std::sync::Arc;
use std::time::Duration;

use outpost_core::{EmailAddress, EmailMessage};
use outpost_executor::{DispatchConfig, EmailSender};
use outpost_provider::LogEmailClient;
use outpost_simulation::prelude::*;
use tokio_util::sync::CancellationToken;

const SETTINGS: &str = r#"
default_sender = "news@example.com"
default_sender_name = "Example News"
max_retries = 2
polling_interval_ms = 200
default_categories = ["simulation"]

[default_headers]
X-Campaign = "spring-launch"

[bulk]
max_concurrency = 8
max_chunk_size = 25
inter_chunk_delay_ms = 50
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = DispatchConfig::from_toml_str(SETTINGS)?;
    let cancel = CancellationToken::new();

    // =========================================================================
    // Single send through the log client
    // =========================================================================
    println!("== single send (log client) ==");
    let log_sender = EmailSender::from_config(Arc::new(LogEmailClient::new("log")), config.clone())?;
    let welcome = EmailMessage::new("Welcome aboard")
        .add_to("new.user@example.com")
        .with_text_body("Thanks for signing up.");
    let result = log_sender.send(welcome, &cancel).await?;
    println!("  {} -> {:?} ({:?})\n", result.recipient, result.state, result.message_id);

    // =========================================================================
    // Chunked broadcast with one failing chunk
    // =========================================================================
    println!("== broadcast: 110 recipients, chunks of 25 ==");
    let client = Arc::new(
        RecordingClient::new("broadcast")
            .with_failure_mode(FailureMode::EveryN(3))
            .with_failure(503, FailureStyle::TerminalStatus)
            .with_retry_after(Duration::from_millis(100)),
    );
    let sender = EmailSender::from_config(client.clone(), config.clone())?;
    let recipients: Vec<EmailAddress> = (0..110)
        .map(|i| EmailAddress::new(format!("reader{i}@example.com")))
        .collect();
    let template = EmailMessage::new("Spring launch").with_html_body("<h1>We are live</h1>");
    let response = sender
        .send_bulk_shared(template, recipients, false, &cancel)
        .await?;
    println!("  provider calls: {}", client.call_count());
    println!("  chunk sizes:    {:?}", client.chunk_sizes());
    println!("  sent={} failed={}\n", response.sent, response.failed);

    // =========================================================================
    // Personalized fan-out with an invalid message
    // =========================================================================
    println!("== personalized: 40 messages, concurrency 8 ==");
    let client = Arc::new(
        RecordingClient::new("fanout")
            .with_delay(Duration::from_millis(20))
            .with_failure_mode(FailureMode::Probabilistic(0.1))
            .with_failure(422, FailureStyle::TerminalStatus),
    );
    let sender = EmailSender::from_config(client.clone(), config)?;
    let mut messages: Vec<EmailMessage> = (0..40)
        .map(|i| {
            EmailMessage::new(format!("Your invoice #{i}"))
                .add_to(format!("customer{i}@example.com"))
                .with_text_body(format!("Invoice {i} is attached."))
        })
        .collect();
    messages[7].text_body = None;

    let response = sender
        .send_bulk_personalized(messages, false, &cancel)
        .await?;
    println!("  provider calls:  {}", client.call_count());
    println!("  peak in flight:  {}", client.peak_in_flight());
    println!("  sent={} failed={}", response.sent, response.failed);
    for failed in response.results.iter().filter(|r| !r.success) {
        println!(
            "  x {} [{:?}] {}",
            failed.recipient,
            failed.state,
            failed.error.as_deref().unwrap_or_default()
        );
    }

    Ok(())
}
