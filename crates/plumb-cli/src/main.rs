mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_CONFIG_ERROR, EXIT_DRIVER_ERROR, EXIT_FAILURE};
use plumb_core::{install_signal_handler, CancelToken};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "plumb",
    version,
    about = "Storage provisioner test harness for container clusters"
)]
struct Cli {
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
    /// List compiled-in storage drivers and the provisioner types they accept.
    Drivers,
    /// Show which driver serves a provisioner type.
    Resolve {
        /// Driver id or provisioner type alias.
        provisioner: String,
        /// Fallback provisioner type used when the requested one is unknown.
        #[arg(long)]
        default_provisioner: Option<String>,
    },
    /// Parse a harness config and check that every app routes to a driver.
    Check {
        /// Path to harness config TOML file.
        #[arg(default_value = "plumb.toml")]
        config: PathBuf,
    },
    /// Run every configured app scenario against the simulated cluster.
    Run {
        /// Path to harness config TOML file.
        #[arg(default_value = "plumb.toml")]
        config: PathBuf,
        /// Number of scenarios to run concurrently.
        #[arg(long, default_value_t = 1)]
        workers: usize,
    },
    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Generate man pages.
    ManPages {
        /// Output directory.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn exit_code_for(msg: &str) -> u8 {
    if msg.starts_with("config error:")
        || msg.starts_with("failed to parse config")
        || msg.starts_with("failed to read config")
    {
        EXIT_CONFIG_ERROR
    } else if msg.starts_with("driver error:") {
        EXIT_DRIVER_ERROR
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
            tracing_subscriber::EnvFilter::try_from_env("PLUMB_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let json_output = cli.json;

    let result = match cli.command {
        Commands::Drivers => commands::drivers::run(json_output),
        Commands::Resolve {
            provisioner,
            default_provisioner,
        } => commands::resolve::run(&provisioner, default_provisioner.as_deref(), json_output),
        Commands::Check { config } => commands::check::run(&config, json_output),
        Commands::Run { config, workers } => {
            let cancel = CancelToken::new();
            install_signal_handler(cancel.clone());
            commands::run::run(&config, workers, &cancel, json_output)
        }
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn error_prefixes_map_to_exit_codes() {
        assert_eq!(exit_code_for("config error: plumb.toml: missing"), EXIT_CONFIG_ERROR);
        assert_eq!(exit_code_for("driver error: unsupported provisioner"), EXIT_DRIVER_ERROR);
        assert_eq!(exit_code_for("something else"), EXIT_FAILURE);
    }

    #[test]
    fn run_defaults_to_one_worker() {
        let cli = Cli::try_parse_from(["plumb", "run"]).unwrap();
        match cli.command {
            Commands::Run { config, workers } => {
                assert_eq!(config, PathBuf::from("plumb.toml"));
                assert_eq!(workers, 1);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
