//! Wish Danmaku CLI - backend helpers and offline simulation.
//!
//! Usage:
//!   wish-cli messages                     # list wishes the backend holds
//!   wish-cli send "生日快乐" --emoji 🎉    # submit a wish
//!   wish-cli stats                        # visitor / message counters
//!   wish-cli simulate --seconds 30        # offline run on virtual time
//!   wish-cli config set page birthday     # change persisted settings

mod simulate;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wish_danmaku::api::ApiClient;
use wish_danmaku::config::AppConfig;
use wish_danmaku::danmaku::PagePreset;
use wish_danmaku::wish::{parse_message_list, NewMessage, ANONYMOUS_NAME};

#[derive(Parser)]
#[command(name = "wish-cli")]
#[command(about = "Wish Danmaku CLI tools")]
struct Cli {
    /// Backend base URL (overrides config)
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the wishes the backend returns, normalized
    Messages {
        /// Print the raw response body instead
        #[arg(long)]
        raw: bool,
    },

    /// Submit a wish
    Send {
        /// Wish text
        message: String,

        /// Display name
        #[arg(short, long, default_value = ANONYMOUS_NAME)]
        name: String,

        /// Emoji shown with the wish
        #[arg(short, long)]
        emoji: Option<String>,
    },

    /// Show backend counters
    Stats,

    /// Run the scheduler offline on virtual time and print what it did
    Simulate {
        /// Page preset (overrides config)
        #[arg(long)]
        page: Option<PagePreset>,

        /// Virtual seconds to simulate
        #[arg(long, default_value_t = 30.0)]
        seconds: f64,

        /// Virtual milliseconds per tick
        #[arg(long, default_value_t = 50)]
        step_ms: u64,

        /// RNG seed
        #[arg(long)]
        seed: Option<u64>,

        /// JSON file shaped like a GET /api/messages response, merged in at --refresh-at
        #[arg(long)]
        messages: Option<PathBuf>,

        /// Virtual second at which the messages file is merged
        #[arg(long, default_value_t = 2.0)]
        refresh_at: f64,

        /// Virtual second at which the scheduler is stopped
        #[arg(long)]
        stop_at: Option<f64>,

        /// Print each spawn and retirement
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show or change persisted settings
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file location and contents
    Show,
    /// Set one setting (server_url, page, poll_interval_secs, frame_interval_ms, seed)
    Set { key: String, value: String },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load();
    let server = cli.server.clone().unwrap_or_else(|| config.server_url.clone());

    let result = match cli.command {
        Commands::Messages { raw } => block_on(list_messages(&server, raw)),
        Commands::Send { message, name, emoji } => {
            block_on(send_message(&server, NewMessage::new(&name, &message, emoji.as_deref())))
        }
        Commands::Stats => block_on(show_stats(&server)),
        Commands::Simulate { page, seconds, step_ms, seed, messages, refresh_at, stop_at, verbose } => {
            let options = simulate::SimulateOptions {
                page: page.unwrap_or(config.page),
                seconds,
                step_ms,
                seed: seed.or(config.seed),
                messages,
                refresh_at,
                stop_at,
                verbose,
            };
            block_on(simulate::run(options))
        }
        Commands::Config { action } => run_config(config, action.unwrap_or(ConfigAction::Show)),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn block_on<F: std::future::Future<Output = wish_danmaku::Result<()>>>(fut: F) -> wish_danmaku::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(fut)
}

// ── Subcommand handlers ─────────────────────────────────────────────

async fn list_messages(server: &str, raw: bool) -> wish_danmaku::Result<()> {
    let api = ApiClient::new(server)?;
    let body = api.list_messages_raw().await?;
    if raw {
        println!("{}", body);
        return Ok(());
    }
    let wishes = parse_message_list(&body)?;
    if wishes.is_empty() {
        println!("No wishes yet.");
    }
    for wish in &wishes {
        let when = wish.timestamp.as_deref().unwrap_or("-");
        println!("{} {}  [{}]", wish.emoji, wish.display_text(), when);
    }
    Ok(())
}

async fn send_message(server: &str, message: NewMessage) -> wish_danmaku::Result<()> {
    message.validate().map_err(wish_danmaku::Error::Rejected)?;
    let api = ApiClient::new(server)?;
    let receipt = api.post_message(&message).await?;
    match receipt.id {
        Some(id) => println!("Wish saved (id {}).", id),
        None => println!("Wish saved."),
    }
    if let Some(code) = receipt.red_packet_code {
        println!("🧧 Reward code: {}", code);
    }
    Ok(())
}

async fn show_stats(server: &str) -> wish_danmaku::Result<()> {
    let api = ApiClient::new(server)?;
    let stats = api.stats().await?;
    println!("Messages:         {}", stats.total_messages);
    println!("Visitors:         {}", stats.total_visitors);
    println!("Unique messagers: {}", stats.unique_messagers);
    if stats.today_messages > 0 || stats.today_visitors > 0 {
        println!("Today:            {} messages, {} visitors", stats.today_messages, stats.today_visitors);
    }
    Ok(())
}

fn run_config(mut config: AppConfig, action: ConfigAction) -> wish_danmaku::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("# {}", config.path().display());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            config.save()?;
            println!("{} updated in {}", key, config.path().display());
        }
    }
    Ok(())
}
