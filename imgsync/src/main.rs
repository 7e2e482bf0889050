use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod format;

/// imgsync - Container Image Synchronizer
///
/// Tags local images, pushes them to a registry and reports the manifest
/// digest the registry serves for them.
#[derive(Parser, Debug)]
#[command(name = "imgsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Control colored output: auto, always, never
    #[arg(long, global = true, default_value = "auto")]
    color: String,

    /// Path to the configuration file
    #[arg(short, long, global = true, env = "IMGSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Engine endpoint, overriding engine.host and IMGSYNC_HOST
    #[arg(long, global = true)]
    host: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Display version information
    Version,
    /// Tag a local image with the target name and push it
    Push {
        /// Local image reference (pulled first when absent)
        source: String,
        /// Target registry reference
        target: String,
        /// Output format: pretty, json, yaml
        #[arg(short, long, default_value = "pretty")]
        format: String,
    },
    /// Print the manifest digest the registry serves for a reference
    Digest {
        /// Registry reference
        target: String,
        /// Report the local engine image ID instead
        #[arg(long)]
        local: bool,
        /// Output format: pretty, json, yaml
        #[arg(short, long, default_value = "pretty")]
        format: String,
    },
    /// Check whether the registry still serves an expected digest (exit 2 on drift)
    Check {
        /// Registry reference
        target: String,
        /// Digest recorded by an earlier push
        digest: String,
        /// Output format: pretty, json, yaml
        #[arg(short, long, default_value = "pretty")]
        format: String,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Display the resolved configuration with secrets masked
    Show {
        /// Output format: pretty, json, yaml
        #[arg(short, long, default_value = "pretty")]
        format: String,
    },
    /// Validate the resolved configuration
    Validate,
}

fn init_tracing(verbosity: context::VerbosityLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.filter()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let verbosity = context::VerbosityLevel::from_count(cli.verbose);
    init_tracing(verbosity);

    // Commands that need no configuration
    match cli.command {
        Commands::Version => {
            commands::version::print_version();
            return;
        }
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
            return;
        }
        _ => {}
    }

    let color = format::ColorChoice::from(cli.color.as_str());
    let ctx = match context::AppContext::build(cli.config.as_deref(), cli.host, color) {
        Ok(ctx) => ctx,
        Err(e) => {
            format::create_formatter(color).error(&e.to_string());
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Push {
            source,
            target,
            format,
        } => {
            let fmt = format::OutputFormat::from(format.as_str());
            commands::push::handle_push(&ctx, &source, &target, fmt);
        }
        Commands::Digest {
            target,
            local,
            format,
        } => {
            let fmt = format::OutputFormat::from(format.as_str());
            commands::digest::handle_digest(&ctx, &target, local, fmt);
        }
        Commands::Check {
            target,
            digest,
            format,
        } => {
            let fmt = format::OutputFormat::from(format.as_str());
            commands::check::handle_check(&ctx, &target, &digest, fmt);
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show { format } => {
                let fmt = format::OutputFormat::from(format.as_str());
                commands::config::handle_show(&ctx, fmt);
            }
            ConfigCommands::Validate => commands::config::handle_validate(&ctx),
        },
        Commands::Version | Commands::Completion { .. } => {}
    }
}
