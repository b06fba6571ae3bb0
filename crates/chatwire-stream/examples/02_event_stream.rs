use anyhow::Result;
use chatwire_stream::{ChatRequest, ClientConfig, SharedToken, StreamClient, StreamEvent};
use futures::StreamExt;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let base_url =
        std::env::var("CHATWIRE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let tokens = SharedToken::default();
    if let Ok(token) = std::env::var("CHATWIRE_TOKEN") {
        tokens.set(token);
    }

    let client = StreamClient::new(ClientConfig::new(base_url), Arc::new(tokens))?;

    println!("Streaming response (Ctrl-C to stop):\n");

    let (cancel, mut events) =
        client.stream(ChatRequest::prompt("Explain how photosynthesis works."));
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let mut thinking_displayed = false;

    while let Some(event) = events.next().await {
        match event {
            StreamEvent::SessionId { id } => println!("[SESSION {}]", id),
            StreamEvent::Thinking { content } => {
                if !thinking_displayed {
                    println!("[THINKING]");
                    thinking_displayed = true;
                }
                print!("{}", content);
                std::io::Write::flush(&mut std::io::stdout())?;
            }
            StreamEvent::Message { content } => {
                if thinking_displayed {
                    println!("\n\n[RESPONSE]");
                    thinking_displayed = false;
                }
                print!("{}", content);
                std::io::Write::flush(&mut std::io::stdout())?;
            }
            StreamEvent::Error { message, severity, .. } => {
                println!("\n[{}] {}", severity, message);
            }
            StreamEvent::Done => println!("\n\nDone."),
            StreamEvent::Start => {}
        }
    }

    Ok(())
}
