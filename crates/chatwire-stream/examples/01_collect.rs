use anyhow::Result;
use chatwire_stream::{ChatRequest, ClientConfig, StreamClient};

#[tokio::main]
async fn main() -> Result<()> {
    let base_url =
        std::env::var("CHATWIRE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let client = StreamClient::anonymous(ClientConfig::new(base_url))?;

    let response = client
        .collect(&ChatRequest::prompt("What is the capital of France?"))
        .await;

    if !response.thinking.is_empty() {
        println!("[THINKING]\n{}\n", response.thinking);
    }
    println!("[RESPONSE]\n{}", response.content);
    println!("\nSession: {:?}", response.session_id);
    println!("Outcome: {:?} in {:?} ms", response.outcome, response.duration_ms());

    for error in &response.errors {
        println!("{}: {}", error.severity, error.message);
    }

    Ok(())
}
