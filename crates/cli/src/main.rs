use clap::{Parser, Subcommand};
use parley::channels::{ConsoleChannel, TelegramChannel, VkChannel};
use parley::conversation::Manager;
use parley::store::JsonlStore;
use parley::survey::SurveyFlow;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Parley CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and default files (config, bundled language packs).
    Init {
        /// Config file path (default: PARLEY_CONFIG_PATH or ~/.parley/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the survey bot on every channel with a token (TELEGRAM_BOT_TOKEN, VK_BOT_TOKEN or config).
    Run {
        /// Config file path (default: PARLEY_CONFIG_PATH or ~/.parley/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Also chat locally over stdin/stdout.
        #[arg(long)]
        console: bool,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("parley {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Run { config, console }) => {
            if let Err(e) = run_bot(config, console).await {
                log::error!("run failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(parley::config::default_config_path);
    let dir = parley::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_bot(config_path: Option<std::path::PathBuf>, console: bool) -> anyhow::Result<()> {
    let (config, path) = parley::config::load_config(config_path)?;
    let pack = parley::config::resolve_language_pack(&config, &path)?;
    let records = parley::config::resolve_records_path(&config, &path);
    log::info!("survey records are appended to {}", records.display());

    let flow = SurveyFlow::new(pack, Arc::new(JsonlStore::new(records)));
    let mut manager = Manager::new(flow.entry_point());

    if let Some(token) = parley::config::resolve_telegram_token(&config) {
        let api_base = config.channels.telegram.api_base.clone();
        manager.add_agent(Arc::new(TelegramChannel::new(token, api_base)));
        log::info!("telegram channel registered");
    }
    if let Some(token) = parley::config::resolve_vk_token(&config) {
        let vk = &config.channels.vk;
        let group_id = vk.group_id.clone().unwrap_or_default();
        manager.add_agent(Arc::new(VkChannel::new(token, group_id, vk.api_version.clone())));
        log::info!("vk channel registered");
    }
    if console {
        manager.add_agent(Arc::new(ConsoleChannel::new(None)));
        log::info!("console channel registered; type /start to begin");
    }

    let run = manager.run();
    tokio::pin!(run);
    tokio::select! {
        res = &mut run => res?,
        _ = tokio::signal::ctrl_c() => {
            log::info!("shutdown signal received, stopping channels");
            manager.stop();
            run.await?;
        }
    }
    log::info!("parley stopped");
    Ok(())
}
