mod cli;
mod core;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::core::config::AppConfig;

#[derive(Parser)]
#[command(name = "ctally", about = "Daily and monthly Codex token usage from session logs", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output format (text|json)
    #[arg(short, long, global = true)]
    format: Option<String>,

    /// Shorthand for --format json
    #[arg(short = 'j', long = "json", global = true)]
    json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Sessions directory (default: $CODEX_HOME/sessions or ~/.codex/sessions)
    #[arg(long, global = true)]
    sessions_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show today's, recent days' and this month's token usage
    Usage {
        /// Day to report on (YYYY-MM-DD, default: today)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Keep refreshing; Enter refreshes now, Ctrl-C quits
    Watch {
        /// Seconds between refreshes (default: from config)
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate default config file
    Init,
    /// Validate config file
    Check,
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose { "ctally=debug" } else { "ctally=warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, path = %AppConfig::config_path().display(), "using default config");
            AppConfig::default()
        }
    };

    let output_opts = cli::output::OutputOptions {
        format: if cli.json {
            cli::output::OutputFormat::Json
        } else {
            cli::output::OutputFormat::from_name(
                cli.format
                    .as_deref()
                    .unwrap_or(config.settings.default_format.as_str()),
            )
        },
        pretty: cli.pretty,
        use_color: cli::output::detect_color(!cli.no_color, &config.settings.color),
        verbose: cli.verbose,
    };

    match cli.command {
        None => cli::usage_cmd::run(&config, cli.sessions_dir, None, &output_opts).await?,
        Some(Commands::Usage { date }) => {
            cli::usage_cmd::run(&config, cli.sessions_dir, date, &output_opts).await?
        }
        Some(Commands::Watch { interval }) => {
            cli::watch_cmd::run(&config, cli.sessions_dir, interval, &output_opts).await?
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init => cli::config_cmd::init(&output_opts)?,
            ConfigAction::Check => cli::config_cmd::check(&output_opts)?,
        },
    }

    Ok(())
}
