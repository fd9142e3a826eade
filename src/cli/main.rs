use chat_fanout::client::{ChatSession, Identity, SessionStatus};
use chat_fanout::config::ClientConfig;
use chat_fanout::websocket::ServerMessage;
use clap::{Parser, Subcommand};
use reqwest::Client;
use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "chat-fanout-cli")]
#[command(about = "Chat fanout client", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join the chat; each stdin line is sent, `/quit` leaves
    Chat {
        #[arg(short, long, default_value = "ws://localhost:8080/ws")]
        url: String,

        #[arg(short = 'i', long, env = "CHAT_USER_ID", default_value = "anonymous")]
        user_id: String,

        #[arg(short = 'n', long, env = "CHAT_USERNAME", default_value = "Anonymous User")]
        username: String,

        #[arg(short, long, default_value = "general")]
        room: String,
    },

    /// Show registry and socket counts
    Stats,

    /// Show one registered connection
    Connection {
        #[arg(value_name = "CONNECTION_ID")]
        id: String,
    },

    /// Check server health
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Chat {
            url,
            user_id,
            username,
            room,
        } => {
            let config = ClientConfig {
                url,
                room_id: room,
                ..ClientConfig::default()
            };
            chat(config, Identity::new(user_id, username)).await?;
        }

        Commands::Stats => {
            let response = client
                .get(format!("{}/v1/stats", cli.endpoint))
                .send()
                .await
                .context("Failed to reach server")?;
            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Connection { id } => {
            let response = client
                .get(format!("{}/v1/connections/{}", cli.endpoint, id))
                .send()
                .await?;

            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Health => {
            let response = client.get(format!("{}/health", cli.endpoint)).send().await?;
            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}

async fn chat(config: ClientConfig, identity: Identity) -> anyhow::Result<()> {
    let session = ChatSession::from_config(&config, identity)
        .with_context(|| format!("Invalid chat URL {}", config.url))?;

    session.on_status(|status| println!("[{}]", status));
    session.on_message(|message| match message {
        ServerMessage::Message { username, message, .. } => println!("{}: {}", username, message),
        ServerMessage::System { message, .. } => println!("* {}", message),
        ServerMessage::Error { code, message } => eprintln!("! {} {}", code, message),
    });
    session.on_error(|error| eprintln!("! {}", error));

    session.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line == "/quit" {
                    break;
                }
                if line.is_empty() {
                    continue;
                }
                if line == "/reconnect" && session.status() != SessionStatus::Connected {
                    session.start();
                    continue;
                }
                if let Err(e) = session.send(line) {
                    eprintln!("! {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.disconnect();
    // Give the close frame a moment to reach the server
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    Ok(())
}
