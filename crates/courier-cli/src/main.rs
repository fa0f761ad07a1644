//! `courier` - deliver chat bot updates from the command line without
//! tripping the platform's flood limits.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use courier_core::{
    ChatTarget, CompositeLimiter, CourierConfig, DeliveryRequest, DispatchEngine, InlineKeyboard,
    MessageId, MessageOwners, OwnerId, Payload,
};
use courier_telegram::{TelegramApi, escape_html};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Courier - rate-limited delivery of chat bot messages
#[derive(Parser, Debug)]
#[command(name = "courier", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a YAML configuration file (environment variables are used otherwise)
    #[arg(short, long, global = true, env = "COURIER_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deliver one message, optionally with media or as an edit
    Send(SendArgs),

    /// Send the same text to many chats
    Broadcast(BroadcastArgs),
}

#[derive(Args, Debug)]
struct SendArgs {
    /// Target chat: numeric id or @username
    #[arg(long, allow_negative_numbers = true)]
    chat: ChatTarget,

    /// Message text, or the caption when media is attached
    #[arg(long, default_value = "")]
    text: String,

    /// Photo, video or animation file to attach
    #[arg(long)]
    media: Option<PathBuf>,

    /// Edit this message instead of sending a new one, when possible
    #[arg(long, value_name = "MESSAGE_ID")]
    edit: Option<MessageId>,

    /// User the message and its keyboard belong to
    #[arg(long)]
    owner: Option<OwnerId>,

    /// Inline keyboard as JSON, e.g. '{"rows":[[{"text":"Go","action":{"url":"https://t.me"}}]]}'
    #[arg(long, value_parser = parse_keyboard)]
    keyboard: Option<InlineKeyboard>,

    /// Treat the text as Telegram HTML instead of escaping it
    #[arg(long)]
    html: bool,
}

#[derive(Args, Debug)]
struct BroadcastArgs {
    /// Target chats: numeric ids or @usernames
    #[arg(long = "chat", required = true, num_args = 1.., allow_negative_numbers = true)]
    chats: Vec<ChatTarget>,

    /// Message text
    #[arg(long)]
    text: String,

    /// Treat the text as Telegram HTML instead of escaping it
    #[arg(long)]
    html: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

fn parse_keyboard(raw: &str) -> Result<InlineKeyboard, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid keyboard JSON: {e}"))
}

fn load_config(path: Option<&Path>) -> Result<CourierConfig> {
    match path {
        Some(path) => CourierConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => CourierConfig::from_env().context("Failed to load config from environment"),
    }
}

fn render_text(text: &str, html: bool) -> String {
    if html {
        text.to_string()
    } else {
        escape_html(text)
    }
}

fn build_request(args: SendArgs) -> DeliveryRequest {
    let caption = render_text(&args.text, args.html);
    let mut request = match args.media {
        Some(path) => DeliveryRequest::media(args.chat, Payload::from_path(path), caption),
        None => DeliveryRequest::text(args.chat, caption),
    };
    if let Some(keyboard) = args.keyboard {
        request = request.with_keyboard(keyboard);
    }
    if let Some(message_id) = args.edit {
        request = request.prefer_edit(message_id);
    }
    if let Some(owner) = args.owner {
        request = request.owned_by(owner);
    }
    request
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;
    debug!(limits = ?config.limits, "Loaded configuration");

    let api = TelegramApi::from_config(&config)?;
    let limiter = CompositeLimiter::new(&config.limits);
    let engine = DispatchEngine::new(
        Arc::new(api),
        Arc::new(MessageOwners::new()),
        config.limits.max_retries,
    );

    match cli.command {
        Commands::Send(args) => {
            let message = engine.deliver(build_request(args), &limiter).await?;
            println!("{message}");
        }
        Commands::Broadcast(args) => {
            let text = render_text(&args.text, args.html);
            let summary = engine.broadcast(&args.chats, &text, &limiter).await;
            if args.json {
                println!("{}", serde_json::to_string(&summary)?);
            } else {
                println!("sent: {}, failed: {}", summary.sent, summary.failed);
            }
        }
    }

    Ok(())
}
