use anyhow::Result;
use clap::Parser;
use colored::*;
use std::time::Duration;

mod api_client;
mod sse_client;

use api_client::{sample_messages, ApiClient};
use sse_client::Connection;

#[derive(Parser)]
#[command(name = "stream-client")]
#[command(about = "Attach to an MCP stream hub and print the events it pushes")]
struct Cli {
    /// Base URL of the hub (e.g., http://localhost:4000)
    #[arg(long)]
    base_url: String,

    /// Exit after this many events (0 = run until the stream closes)
    #[arg(long, default_value_t = 0)]
    count: usize,

    /// Seconds to wait for any single event
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Publish one sample message of each kind and check it comes back
    #[arg(long)]
    publish: bool,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    let timeout = Duration::from_secs(cli.timeout_secs);

    println!("{} Connecting to {}...", "→".blue(), cli.base_url);
    let mut connection = Connection::establish(&cli.base_url, timeout).await?;
    println!(
        "{} Connected (client ID: {})",
        "✓".green(),
        connection.client_id
    );

    if cli.publish {
        let api_client = ApiClient::new(reqwest::Client::new(), cli.base_url.clone());
        let ready = api_client.ready().await?;
        println!(
            "{} Hub reports {} connected client(s)",
            "→".blue(),
            ready["connected_clients"]
        );

        let mut all_passed = true;
        for sample in sample_messages() {
            api_client
                .publish(&sample.message, Some(&connection.client_id))
                .await?;

            match connection.wait_for_event(sample.expected_event, timeout).await {
                Ok(event) => println!(
                    "{} {} streamed as {} ({} ms)",
                    "✓".green(),
                    sample.label,
                    event.event_type,
                    event.received_at.elapsed().as_millis()
                ),
                Err(e) => {
                    all_passed = false;
                    println!("{} {}: {}", "✗".red(), sample.label, e);
                }
            }
        }

        if all_passed {
            println!("\n{}", "All sample messages streamed! ✓".bright_green().bold());
        } else {
            println!("\n{}", "Some sample messages were not streamed! ✗".bright_red().bold());
            std::process::exit(1);
        }
        return Ok(());
    }

    let mut received = 0;
    loop {
        let event = match connection.next_event(timeout).await {
            Ok(Some(event)) => event,
            Ok(None) => {
                println!("{} Stream closed by the hub", "→".blue());
                break;
            }
            Err(e) => {
                println!("{} {}", "→".blue(), e);
                break;
            }
        };
        received += 1;
        println!(
            "{} {}",
            format!("[{}]", event.event_type).cyan().bold(),
            serde_json::to_string_pretty(&event.data)?
        );

        if cli.count > 0 && received >= cli.count {
            break;
        }
    }

    println!("\n{} Received {} event(s)", "✓".green(), received);
    Ok(())
}
