//! mishwar-cli — interactive booking chat for the Mishwar HTTP API
//!
//! # Subcommands
//! - `chat --lat <lat> --lng <lng>` — open a session and chat until the
//!   booking is confirmed or canceled
//! - `status`                        — show server health

use std::io::{self, BufRead, Write};

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8077";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "mishwar-cli",
    version,
    about = "Mishwar booking chat — talk to a running Mishwar server"
)]
struct Cli {
    /// Mishwar HTTP server URL (overrides MISHWAR_HTTP_URL env var)
    #[arg(long, env = "MISHWAR_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start an interactive booking dialogue
    Chat {
        /// Pickup latitude
        #[arg(long)]
        lat: f64,

        /// Pickup longitude
        #[arg(long)]
        lng: f64,
    },

    /// Show Mishwar server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

/// One turn's reply from POST /chatbot
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatbotReply {
    pub session_id: String,
    pub bot_message: String,
    pub done: bool,
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn make_client() -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?)
}

fn post_turn(
    client: &reqwest::blocking::Client,
    server: &str,
    body: serde_json::Value,
) -> ChatbotReply {
    let url = format!("{}/chatbot", server);

    let resp = match client.post(&url).json(&body).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("mishwar-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        eprintln!("mishwar-cli: server returned {}: {}", status, body);
        std::process::exit(1);
    }

    match resp.json() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("mishwar-cli: failed to parse chatbot response: {}", e);
            std::process::exit(1);
        }
    }
}

fn do_chat(server: &str, lat: f64, lng: f64) -> anyhow::Result<()> {
    let client = make_client()?;

    let opening = post_turn(
        &client,
        server,
        serde_json::json!({ "lat": lat, "lng": lng }),
    );

    println!("{}", opening.bot_message);

    // An empty session id means the server refused to open a session
    // (e.g. coordinates outside the served region).
    if opening.session_id.is_empty() {
        std::process::exit(1);
    }

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let reply = post_turn(
            &client,
            server,
            serde_json::json!({
                "sessionId": opening.session_id,
                "userInput": input,
            }),
        );

        println!("{}", reply.bot_message);

        if reply.done {
            break;
        }
    }

    Ok(())
}

fn do_status(server: &str) -> anyhow::Result<()> {
    let client = make_client()?;
    let url = format!("{}/health", server);

    let resp = match client.get(&url).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("mishwar-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let body: serde_json::Value = resp.json().unwrap_or_default();

    if status.is_success() {
        println!("{}", serde_json::to_string_pretty(&body)?);
        Ok(())
    } else {
        eprintln!("mishwar-cli: server unhealthy ({}): {}", status, body);
        std::process::exit(1);
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Chat { lat, lng } => do_chat(&cli.server, lat, lng),
        Commands::Status => do_status(&cli.server),
    }
}
