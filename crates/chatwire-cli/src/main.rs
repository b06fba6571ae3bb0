mod config;

use std::io::Write;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::Context;
use chatwire_stream::{
    Callbacks, ChatRequest, NoToken, SessionState, Severity, StaticToken, StreamClient,
    TokenProvider,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::CliConfig;

const USAGE: &str = "usage: chatwire [--session <id>] <prompt...>";

/// Upper bound on the stop notification sent after Ctrl-C
const STOP_TIMEOUT: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = CliConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config);

    let request = parse_args(std::env::args().skip(1))?;

    let tokens: Arc<dyn TokenProvider> = match &config.token {
        Some(token) => Arc::new(StaticToken::new(token.clone())),
        None => Arc::new(NoToken),
    };
    let client = StreamClient::new(config.client.clone(), tokens)
        .context("Failed to create stream client")?;

    tracing::info!(url = %client.config().url(), "opening stream");

    let announced = Arc::new(OnceLock::new());
    let handle = client.spawn(request, terminal_callbacks(announced.clone()));

    let cancel = handle.cancel_handle();
    let join = handle.join();
    tokio::pin!(join);

    let (state, _) = tokio::select! {
        result = &mut join => result?,
        _ = tokio::signal::ctrl_c() => {
            // Local teardown first; the server-side stop runs alongside it
            cancel.cancel();
            let (result, _) = tokio::join!(&mut join, stop_backend(&client, announced.get()));
            result?
        }
    };
    println!();

    match state {
        SessionState::Failed => anyhow::bail!("stream failed"),
        _ => Ok(()),
    }
}

/// Prompt from the remaining arguments, with an optional `--session <id>`
/// to continue an earlier conversation
fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<ChatRequest> {
    let mut session_id = None;
    let mut words = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--session" | "-s" => {
                let id = args.next().context(USAGE)?;
                session_id = Some(id);
            }
            "--help" | "-h" => anyhow::bail!(USAGE),
            _ => words.push(arg),
        }
    }

    let prompt = words.join(" ");
    if prompt.trim().is_empty() {
        anyhow::bail!(USAGE);
    }

    let request = ChatRequest::prompt(prompt);
    Ok(match session_id {
        Some(id) => request.with_session_id(id),
        None => request,
    })
}

/// Best-effort request asking the backend to stop generating. Failures are
/// logged only; the local session is already cancelled.
async fn stop_backend(client: &StreamClient, session_id: Option<&String>) {
    let Some(session_id) = session_id else {
        tracing::debug!("no session id announced yet, nothing to stop on the backend");
        return;
    };

    match tokio::time::timeout(STOP_TIMEOUT, client.stop(session_id)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, session_id = %session_id, "stop request failed"),
        Err(_) => tracing::warn!(session_id = %session_id, "stop request timed out"),
    }
}

/// Answer text goes to stdout; thinking, session and status lines go to stderr.
/// The announced session id is stored in `announced` for the stop request.
fn terminal_callbacks(announced: Arc<OnceLock<String>>) -> Callbacks {
    let mut thinking_open = false;

    Callbacks::new(move |text| {
        print!("{}", text);
        let _ = std::io::stdout().flush();
    })
    .on_thinking(move |text| {
        if !thinking_open {
            eprint!("[thinking] ");
            thinking_open = true;
        }
        eprint!("{}", text);
    })
    .on_session_id(move |id| {
        let _ = announced.set(id.to_string());
        eprintln!("[session {}]", id);
    })
    .on_error(|error, severity| match severity {
        Severity::Info => eprintln!("\n[{}]", error),
        _ => eprintln!("\nerror: {}", error),
    })
}

/// Logs go to stderr so stdout carries only the streamed answer
fn init_logging(config: &CliConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }
}
