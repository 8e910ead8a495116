use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "linkrelay")]
#[command(about = "Forward links posted to a Telegram chat to a GitHub repository dispatch", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Poll Telegram and forward every link as a repository dispatch until SIGINT/SIGTERM.
    Run {
        /// Config file path (default: LINKRELAY_CONFIG_PATH or ~/.linkrelay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Validate configuration and print the resolved settings (tokens redacted).
    Check {
        /// Config file path (default: LINKRELAY_CONFIG_PATH or ~/.linkrelay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Show the link and tags that would be taken from a message.
    Extract {
        /// Message text
        text: String,
    },

    /// Fetch a page and print its title.
    Title {
        url: String,

        /// Request timeout in seconds
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("linkrelay {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Run { config }) => {
            if let Err(e) = run(config).await {
                log::error!("relay failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Check { config }) => {
            if let Err(e) = check(config) {
                log::error!("check failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Extract { text }) => {
            let extracted = lib::extract::extract(&text);
            match extracted.url {
                Some(url) => {
                    println!("url:  {}", url);
                    println!("tags: {}", lib::extract::join_tags(&extracted.tags));
                }
                None => println!("no link found"),
            }
        }
        Some(Commands::Title { url, timeout }) => {
            if let Err(e) = title(&url, timeout).await {
                log::error!("title failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn settings(config_path: Option<PathBuf>) -> anyhow::Result<lib::config::Settings> {
    let (config, path) = lib::config::load_config(config_path)?;
    log::debug!("using config {}", path.display());
    Ok(lib::config::Settings::resolve(&config)?)
}

async fn run(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let settings = settings(config_path)?;
    log::info!("forwarding links to {}", settings.dispatch_url);
    lib::relay::run_relay(settings).await
}

fn check(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let settings = settings(config_path)?;
    println!("telegram api:    {}", settings.telegram_api_base);
    println!("dispatch url:    {}", settings.dispatch_url);
    println!("poll interval:   {:?}", settings.poll_interval);
    println!(
        "fetch retries:   {} (first backoff {:?})",
        settings.retry.max_attempts, settings.retry.initial_backoff
    );
    println!("http timeout:    {:?}", settings.http_timeout);
    println!("notify failures: {}", settings.notify_failures);
    Ok(())
}

async fn title(url: &str, timeout: u64) -> anyhow::Result<()> {
    let client = lib::config::http_client(std::time::Duration::from_secs(timeout))?;
    let title = lib::title::TitleResolver::new(client).resolve(url).await?;
    println!("{}", title);
    Ok(())
}
