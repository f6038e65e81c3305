//! Line-based console chat demo.
//!
//! Run with: cargo run -p console-chat-demo
//!
//! Spins up an in-process token endpoint and an in-memory chat service,
//! logs in, joins the general channel, and echoes whatever you type.
//! Exit with Ctrl-D.

use std::sync::Arc;

use anyhow::Result;
use axum::{Json, Router, routing::get};
use quickchat_core::{Message, SessionListener};
use quickchat_session::{ChatSessionCoordinator, MemoryChatService, SessionConfig};
use quickchat_token::TokenUrl;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Prints every arriving message.
struct ConsoleListener;

impl SessionListener for ConsoleListener {
    fn on_messages_changed(&self) {}

    fn on_new_message(&self, message: &Message) {
        println!("<{}> {}", message.author, message.body);
    }
}

/// In-process token endpoint, so the demo exercises the real HTTP path.
async fn spawn_token_endpoint() -> Result<TokenUrl> {
    let app = Router::new().route(
        "/chat-token",
        get(|| async { Json(json!({ "token": "demo-token" })) }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("token endpoint failed: {e}");
        }
    });
    Ok(TokenUrl::parse(&format!("http://{addr}/chat-token"))?)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let identity = std::env::var("USER").unwrap_or_else(|_| "demo".into());
    let token_url = spawn_token_endpoint().await?;

    let service = MemoryChatService::new();
    let coordinator = ChatSessionCoordinator::new(
        SessionConfig::new(token_url),
        Arc::new(service.clone()),
        Arc::new(ConsoleListener),
    );

    coordinator.login(&identity).await?;
    println!("Logged in as \"{identity}\" on #general. Type a message, Ctrl-D to quit.");

    service
        .deliver("operator", format!("welcome, {identity}!"))
        .await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        coordinator.send_message(&line).await?;
        // Play the remote side: reflect the send and have a bot answer.
        service.deliver(&identity, line.clone()).await;
        service.deliver("echo-bot", format!("you said: {line}")).await;
    }

    coordinator.shutdown().await;
    println!("Logged out.");
    Ok(())
}
