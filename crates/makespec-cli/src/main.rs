mod commands;
mod config;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::resolve::OutputFormat;
use commands::{SourceArgs, EXIT_FAILURE, EXIT_FETCH_ERROR, EXIT_MANIFEST_ERROR};
use config::CliConfig;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "makespec",
    version,
    about = "Resolve, validate and convert make-style build manifests"
)]
struct Cli {
    /// Path to a TOML config file (default: ~/.config/makespec/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve includes and overrides and print the validated manifest.
    Resolve {
        #[command(flatten)]
        source: SourceArgs,
        /// Output format (`--json` implies json).
        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
        /// Write to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check a manifest and list every problem found.
    Validate {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Convert a manifest into a composer-style dependency manifest.
    Convert {
        #[command(flatten)]
        source: SourceArgs,
        /// Write to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

fn exit_code_for(msg: &str) -> u8 {
    if msg.starts_with("failed to fetch") || msg.starts_with("include not found") {
        EXIT_FETCH_ERROR
    } else if msg.starts_with("manifest error")
        || msg.starts_with("invalid manifest")
        || msg.starts_with("cyclic include")
        || msg.starts_with("include path escapes")
        || msg.starts_with("no input")
    {
        EXIT_MANIFEST_ERROR
    } else {
        EXIT_FAILURE
    }
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("MAKESPEC_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let loaded = match &cli.config {
        Some(path) => CliConfig::load(path),
        None => CliConfig::load_default(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("error: {msg}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let result = match cli.command {
        Commands::Resolve {
            source,
            format,
            output,
        } => {
            let format = if cli.json { OutputFormat::Json } else { format };
            commands::resolve::run(&config, &source, format, output.as_deref())
        }
        Commands::Validate { source } => commands::validate::run(&config, &source, cli.json),
        Commands::Convert { source, output } => {
            commands::convert::run(&config, &source, output.as_deref())
        }
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}
