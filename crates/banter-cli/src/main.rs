//! banter CLI: terminal chat client for a remote conversational service

use banter_engine::{
    run_turn, Config, Conversation, ConversationStore, FileStore, HttpChatBackend, Sender,
    TurnOutcome,
};
use clap::{Parser, Subcommand};
use std::error::Error;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Terminal chat client with a persistent conversation
#[derive(Parser, Debug)]
#[command(name = "banter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding config.json, the stored conversation and the log
    #[arg(long, global = true, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Chat service origin, overriding the config file
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Open the TUI (default when no command specified)
    Tui,

    /// Send one message and print the reply
    Send {
        /// Message text (words are joined with spaces)
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Print the stored conversation
    History {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Clear the stored conversation and start over
    Reset,

    /// Print the effective configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

const DEFAULT_DATA_DIR: &str = ".banter";
const CONFIG_FILE: &str = "config.json";
const STORAGE_DIR: &str = "storage";
const LOG_FILE: &str = "banter.log";
const DEFAULT_LOG_FILTER: &str = "banter=info";

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    std::fs::create_dir_all(&cli.data_dir)?;
    init_logging(&cli.data_dir)?;

    let config_path = cli.data_dir.join(CONFIG_FILE);
    let mut config = Config::load_or_default(&config_path)?;
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    let store = FileStore::new(cli.data_dir.join(STORAGE_DIR))?;

    match cli.command.unwrap_or(Commands::Tui) {
        Commands::Tui => {
            let backend = Arc::new(HttpChatBackend::from_config(&config)?);
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(banter_tui::run_tui(&config, store, backend))
        }
        Commands::Send { text } => cmd_send(&config, store, &text.join(" ")),
        Commands::History { json } => cmd_history(store, json),
        Commands::Reset => cmd_reset(store),
        Commands::Config { json } => cmd_config(&config, &config_path, json),
    }
}

/// Log to a file so the TUI keeps the terminal to itself.
fn init_logging(data_dir: &Path) -> Result<(), Box<dyn Error>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(data_dir.join(LOG_FILE))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| format!("failed to initialize logging: {e}"))?;

    Ok(())
}

fn cmd_send(config: &Config, store: FileStore, text: &str) -> Result<(), Box<dyn Error>> {
    let backend = HttpChatBackend::from_config(config)?;
    let mut store = ConversationStore::new(store);
    let mut conversation = store.load().with_history(config.send_history);

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(run_turn(
        &mut conversation,
        &backend,
        text,
        config.min_reply_delay(),
    ));
    // The user message is kept even when the request failed
    store.sync(&conversation)?;
    let outcome = outcome?;

    println!("{}", outcome.message().text);
    if let TurnOutcome::Failed(_) = outcome {
        eprintln!("(request to {} failed, see {LOG_FILE})", backend.url());
    }
    Ok(())
}

fn cmd_history(store: FileStore, json: bool) -> Result<(), Box<dyn Error>> {
    let mut store = ConversationStore::new(store);
    let conversation = store.load();

    if json {
        println!("{}", serde_json::to_string_pretty(conversation.messages())?);
        return Ok(());
    }

    println!("Stage: {}\n", conversation.stage());
    for message in conversation.messages() {
        let who = match message.sender {
            Sender::User => "You",
            Sender::Bot => "Bot",
        };
        println!("{who}: {}", message.text);
    }
    Ok(())
}

fn cmd_reset(store: FileStore) -> Result<(), Box<dyn Error>> {
    let mut store = ConversationStore::new(store);
    store.clear()?;
    store.sync(&Conversation::new())?;
    info!("Conversation reset from the command line");
    println!("Conversation reset");
    Ok(())
}

fn cmd_config(config: &Config, path: &Path, json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    println!("Config file: {}", path.display());
    println!("Chat URL: {}", config.chat_url());
    println!("Request timeout: {}s", config.request_timeout_seconds);
    println!("Minimum reply delay: {}ms", config.min_reply_delay_ms);
    println!("Send history: {}", config.send_history);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_is_tui() {
        let cli = Cli::try_parse_from(["banter"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(cli.endpoint, None);
    }

    #[test]
    fn test_send_joins_words_and_global_flags() {
        let cli = Cli::try_parse_from([
            "banter",
            "send",
            "What",
            "projects?",
            "--data-dir",
            "/tmp/b",
            "--endpoint",
            "http://localhost:3000",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Some(Commands::Send {
                text: vec!["What".into(), "projects?".into()]
            })
        );
        assert_eq!(cli.data_dir, PathBuf::from("/tmp/b"));
        assert_eq!(cli.endpoint.as_deref(), Some("http://localhost:3000"));
    }

    #[test]
    fn test_send_requires_text() {
        assert!(Cli::try_parse_from(["banter", "send"]).is_err());
    }

    #[test]
    fn test_history_json_flag() {
        let cli = Cli::try_parse_from(["banter", "history", "--json"]).unwrap();
        assert_eq!(cli.command, Some(Commands::History { json: true }));
    }
}
