use std::path::PathBuf;
use std::sync::Arc;

use brew_assistant::concierge::Concierge;
use brew_assistant::config::{AssistantConfig, ConfigError};
use brew_assistant::llm::{CachedGenerator, LlmError};
use brew_assistant::remote::RemoteError;
use brew_assistant::resolver::Resolver;
use brew_assistant::routes::{self, AppState};
use brew_assistant::session::{Session, SessionEvent};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("generator: {0}")]
    Generator(#[from] LlmError),
    #[error("remote client: {0}")]
    Remote(#[from] RemoteError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "brew-assistant", about = "AG Brew Lab coffee and matcha assistant")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the site root and the concierge API.
    Serve {
        #[arg(long, env = "HOST", default_value = "127.0.0.1")]
        host: String,
        #[arg(long, env = "PORT", default_value_t = 4174)]
        port: u16,
        #[arg(long, env = "SITE_ROOT", default_value = ".")]
        root: PathBuf,
    },
    /// Interactive chat on stdin. Blank lines are ignored; `/reset` forgets
    /// the current topic.
    Chat,
    /// Answer a single message and exit.
    Ask { message: String },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let dotenv = dotenvy::dotenv();
    tracing_subscriber::fmt::init();
    if let Err(e) = dotenv {
        tracing::debug!(error = %e, "no .env loaded");
    }

    let cli = Cli::parse();
    let config = AssistantConfig::from_env()?;
    let generator = Arc::new(CachedGenerator::from_config(&config.generator)?);

    match cli.command {
        Command::Serve { host, port, root } => run_serve(&config, generator, &host, port, root).await,
        Command::Chat => run_chat(&config, generator).await,
        Command::Ask { message } => run_ask(&config, generator, message).await,
    }
}

async fn run_serve(
    config: &AssistantConfig,
    generator: Arc<CachedGenerator>,
    host: &str,
    port: u16,
    root: PathBuf,
) -> Result<(), CliError> {
    let concierge = Arc::new(Concierge::new(generator, config.quality));
    let app = routes::app(AppState { concierge }, &root);
    let listener = tokio::net::TcpListener::bind((host, port)).await?;

    tracing::info!(%host, %port, root = %root.display(), "brew assistant listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_chat(config: &AssistantConfig, generator: Arc<CachedGenerator>) -> Result<(), CliError> {
    let (session, rx) = Session::new(Resolver::standard(config, generator)?);
    let printer = tokio::spawn(print_events(rx));

    let mut submissions = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if line == "/reset" {
            session.reset();
            println!("(topic cleared)");
            continue;
        }
        submissions.spawn(session.submit(line));
    }

    while let Some(joined) = submissions.join_next().await {
        if let Err(e) = joined {
            tracing::warn!(error = %e, "chat: submission task failed");
        }
    }
    drop(session);
    if let Err(e) = printer.await {
        tracing::warn!(error = %e, "chat: printer task failed");
    }
    Ok(())
}

async fn run_ask(config: &AssistantConfig, generator: Arc<CachedGenerator>, message: String) -> Result<(), CliError> {
    let (session, rx) = Session::new(Resolver::standard(config, generator)?);
    session.submit(message).await;
    drop(session);
    print_events(rx).await;
    Ok(())
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<SessionEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            SessionEvent::Status(status) => eprintln!("[{status}]"),
            SessionEvent::Reply { text, mode } => println!("{text}\n({})\n", mode.as_str()),
            SessionEvent::Apology(text) => println!("{text}\n"),
        }
    }
}
