use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use brandpulse::cli::OutputFormat;
use brandpulse::cli::commands::monitor::MonitorOptions;
use brandpulse::types::ProviderKind;

#[derive(Parser)]
#[command(name = "brandpulse")]
#[command(
    version,
    about = "Track how LLM search providers mention and rank your brand"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Extra config file merged over the global and project configs
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Query providers and record brand mentions
    Monitor {
        #[arg(help = "Queries to run")]
        queries: Vec<String>,
        #[arg(long, help = "File with one query per line")]
        file: Option<PathBuf>,
        #[arg(
            long = "provider",
            short = 'p',
            help = "Limit to these providers (repeatable): openai, perplexity, gemini"
        )]
        providers: Vec<ProviderKind>,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json, yaml"
        )]
        format: OutputFormat,
        #[arg(long, help = "Do not write results to the store")]
        no_persist: bool,
        #[arg(long, short, help = "Write the batch results as JSON to this file")]
        output: Option<PathBuf>,
    },

    /// Verify provider credentials and store access
    Check {
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json, yaml"
        )]
        format: OutputFormat,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text (toml), json, yaml"
        )]
        format: OutputFormat,
    },
    /// Show configuration file paths
    Path,
    /// Write a starter configuration file
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mBrandPulse encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Call default hook for backtrace (if RUST_BACKTRACE=1)
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "brandpulse=debug,info"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli.config.as_deref();

    match cli.command {
        Commands::Monitor {
            queries,
            file,
            providers,
            format,
            no_persist,
            output,
        } => {
            brandpulse::cli::commands::monitor::run(MonitorOptions {
                queries,
                file,
                config: cli.config.clone(),
                providers,
                format,
                no_persist,
                output,
            })?;
        }
        Commands::Check { format } => {
            brandpulse::cli::commands::check::run(config, format)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => {
                brandpulse::cli::commands::config::show(config, format)?;
            }
            ConfigAction::Path => {
                brandpulse::cli::commands::config::path()?;
            }
            ConfigAction::Init { global, force } => {
                brandpulse::cli::commands::config::init(global, force)?;
            }
        },
    }

    Ok(())
}
