use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tokio::sync::{Mutex, mpsc};
use tracing_subscriber::EnvFilter;

use autozap::reply::{GeminiProvider, ReplyGenerator, TextProvider};
use autozap::storage::JsonFileStore;
use autozap::{Automation, Config, Console, Shell};

/// AutoZap - simulated WhatsApp automation console
#[derive(Parser)]
#[command(name = "autozap", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory holding the persisted console state
    #[arg(long, env = "AUTOZAP_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Open the interactive console (default)
    Shell,
    /// Print the dashboard and exit
    Status,
    /// Interactive first-run setup
    Setup,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,autozap=info",
        1 => "info,autozap=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let command = cli.command.unwrap_or(Command::Shell);
    if matches!(command, Command::Setup) {
        return autozap::setup::run_setup();
    }

    let config = Config::load(cli.data_dir)?;
    tracing::debug!(?config, "loaded configuration");

    let console = open_console(&config)?;

    match command {
        Command::Status => {
            let mut stdout = std::io::stdout();
            autozap::shell::render_dashboard(&console, &mut stdout)?;
            Ok(())
        }
        Command::Shell | Command::Setup => run_shell(&config, console).await,
    }
}

fn open_console(config: &Config) -> anyhow::Result<Console> {
    let store = JsonFileStore::new(config.state_path());
    tracing::info!(path = %store.path().display(), "opening console state");
    Ok(Console::open(Arc::new(store), &config.locale, &config.payment)?)
}

async fn run_shell(config: &Config, console: Console) -> anyhow::Result<()> {
    let provider = GeminiProvider::from_config(&config.provider)
        .map(|p| Arc::new(p) as Arc<dyn TextProvider>);
    let generator = ReplyGenerator::new(provider);
    if !generator.is_configured() {
        tracing::warn!("no Gemini API key configured, replies will use the fallback message");
    }

    let console = Arc::new(Mutex::new(console));
    let (tx, rx) = mpsc::unbounded_channel();
    let automation =
        Automation::new(Arc::clone(&console), generator, config.simulation).with_notices(tx);

    let interactive = std::io::stdin().is_terminal();
    if interactive {
        println!("AutoZap console. Type 'help' for commands.\n");
    }

    let mut shell = Shell::new(automation).with_prompt(interactive);
    let mut stdout = std::io::stdout();
    shell
        .run(BufReader::new(tokio::io::stdin()), &mut stdout, rx)
        .await?;

    console.lock().await.flush()?;
    Ok(())
}
