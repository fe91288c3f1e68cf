//! nse-movers: download today's NSE live-equity snapshot and print top movers.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use nse_movers::DEFAULT_RESULT_COUNT;

mod cli;

#[derive(Parser)]
#[command(
    name = "nse-movers",
    about = "Download the NSE live-equity snapshot and report the day's movers",
    version,
    after_help = "Run 'nse-movers <command> --help' for details on each command.\nRun 'nse-movers' with no command to download and analyze today's snapshot."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Rows per query
    #[arg(short = 'n', long, global = true, default_value_t = DEFAULT_RESULT_COUNT)]
    count: usize,

    /// Directory the browser downloads into (default: $NSE_MOVERS_DOWNLOAD_DIR or ~/Downloads/nse-movers)
    #[arg(long, global = true)]
    download_dir: Option<String>,

    /// User-agent string presented to the source site
    #[arg(long, global = true)]
    user_agent: Option<String>,

    /// Path to the Chromium binary (default: $NSE_MOVERS_CHROMIUM_PATH or auto-detect)
    #[arg(long, global = true)]
    chromium: Option<String>,

    /// Show the browser window instead of running headless
    #[arg(long, global = true)]
    headful: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the snapshot and run every query (default)
    Run,
    /// Run every query over an existing CSV snapshot
    Analyze {
        /// Path to a previously downloaded snapshot
        csv: String,
    },
    /// Check Chromium and the download directory
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        shell: Shell,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_format);
    cli::output::set_json(cli.json);

    let settings = cli::Settings {
        download_dir: cli.download_dir,
        user_agent: cli.user_agent,
        chromium: cli.chromium,
        headless: !cli.headful,
    };

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => cli::run_cmd::run(&settings, cli.count).await,
        Commands::Analyze { csv } => cli::analyze_cmd::run(&csv, cli.count),
        Commands::Doctor => cli::doctor::run(&settings),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "nse-movers", &mut std::io::stdout());
            Ok(())
        }
    };

    // 0=success, 1=error
    if let Err(e) = &result {
        if cli::output::is_json() {
            cli::output::print_json(&cli::output::error_json(e));
        } else {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}
