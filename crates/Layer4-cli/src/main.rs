//! Anvil CLI - Main entry point

mod cli;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Anvil - cache-aware, rate-limited code requests and agent-mode edits
#[derive(Parser, Debug)]
#[command(name = "anvil")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Workspace root (config lookup and edit target)
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse an agent-mode reply into change instructions
    Parse {
        /// Reply file ('-' for stdin)
        #[arg(default_value = "-")]
        reply: PathBuf,
    },
    /// Apply an agent-mode reply to the workspace
    Apply {
        /// Reply file ('-' for stdin)
        #[arg(default_value = "-")]
        reply: PathBuf,

        /// Validate and show results without writing
        #[arg(long)]
        dry_run: bool,

        /// Undo the applied changes when any instruction fails
        #[arg(long)]
        atomic: bool,
    },
    /// Send a request through the pipeline using a recorded reply
    Run {
        /// File holding the provider's reply
        #[arg(long)]
        reply: PathBuf,

        /// Code to send ('-' for stdin)
        #[arg(default_value = "-")]
        code: PathBuf,

        #[arg(short, long, default_value = "text")]
        language: String,

        #[arg(short, long, default_value = "explain")]
        action: String,

        /// Apply the reply's edits to the workspace
        #[arg(long)]
        agent: bool,

        /// Preview agent-mode edits without writing
        #[arg(long)]
        dry_run: bool,

        /// Stream the reply in chunks
        #[arg(long)]
        stream: bool,

        /// Rate-limit context (defaults to the global context)
        #[arg(long)]
        context: Option<String>,

        /// Extra files counted toward the token estimate
        #[arg(long = "aux")]
        aux_files: Vec<PathBuf>,
    },
    /// Estimate the token cost of a text
    Estimate {
        /// Text file ('-' for stdin)
        #[arg(default_value = "-")]
        input: PathBuf,

        /// Extra files counted toward the estimate
        #[arg(long = "aux")]
        aux_files: Vec<PathBuf>,
    },
    /// Mask secret values in a text
    Redact {
        /// Text file ('-' for stdin)
        #[arg(default_value = "-")]
        input: PathBuf,
    },
    /// Print the cache key of a request
    Key {
        /// Code file ('-' for stdin)
        #[arg(default_value = "-")]
        code: PathBuf,

        #[arg(short, long, default_value = "text")]
        language: String,

        #[arg(short, long, default_value = "explain")]
        action: String,
    },
    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum ConfigAction {
    /// Print the merged configuration
    Show,
    /// Write the defaults to the project config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries command output
    let log_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let mut out = std::io::stdout().lock();
    let format = cli::OutputFormat::from_json_flag(args.json);

    match args.command {
        Command::Parse { reply } => {
            let reply = cli::read_input(&reply)?;
            cli::parse_reply(&reply, format, &mut out)
        }
        Command::Apply {
            reply,
            dry_run,
            atomic,
        } => {
            let reply = cli::read_input(&reply)?;
            let config = cli::load_config(&args.root)?;
            let options = cli::ApplyOptions { dry_run, atomic };
            cli::apply_reply(&args.root, &config, &reply, options, format, &mut out)
        }
        Command::Run {
            reply,
            code,
            language,
            action,
            agent,
            dry_run,
            stream,
            context,
            aux_files,
        } => {
            let code = cli::read_input(&code)?;
            let mut config = cli::load_config(&args.root)?;
            config.stream = config.stream || stream;

            let run = cli::RunArgs {
                reply,
                code,
                language,
                action,
                agent,
                dry_run,
                context,
                aux_files,
            };
            drop(out);
            cli::run_request(&args.root, &config, run, format).await
        }
        Command::Estimate { input, aux_files } => {
            let text = cli::read_input(&input)?;
            let config = cli::load_config(&args.root)?;
            cli::estimate(&config, &text, &aux_files, format, &mut out).await
        }
        Command::Redact { input } => {
            let text = cli::read_input(&input)?;
            cli::redact_text(&text, &mut out)
        }
        Command::Key {
            code,
            language,
            action,
        } => {
            let code = cli::read_input(&code)?;
            cli::print_key(&code, &language, &action, &mut out)
        }
        Command::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => {
                let config = cli::load_config(&args.root)?;
                cli::show_config(&config, &mut out)
            }
            ConfigAction::Init { force } => cli::init_config(&args.root, force, &mut out),
        },
    }
}
