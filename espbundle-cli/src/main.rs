//! espbundle CLI - Command-line tool for flashing zip bundles to ESP boards.
//!
//! ## Features
//!
//! - Detect an ESP board on any serial port through `esptool`
//! - Watch the device status until the board is ready
//! - Erase and flash every entry of a zip bundle
//! - Preview the flash layout of a bundle
//! - Shell completion generation
//! - Environment variable support

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use log::debug;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

mod commands;
mod config;

use config::{Config, Overrides};

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Set by the Ctrl-C handler.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Check if emoji/animations should be used (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// Whether Ctrl-C was pressed.
fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

/// CLI failure classes with dedicated exit codes.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Bad invocation or missing input in non-interactive mode (exit 2).
    #[error("{0}")]
    Usage(String),
    /// Stopped by the user (exit 130).
    #[error("{0}")]
    Cancelled(String),
}

/// Map an error to the process exit code.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<CliError>() {
        Some(CliError::Usage(_)) => 2,
        Some(CliError::Cancelled(_)) => 130,
        None => match err.downcast_ref::<espbundle::Error>() {
            Some(espbundle::Error::Cancelled) => 130,
            _ => 1,
        },
    }
}

/// espbundle - Flash zip bundles onto ESP boards through esptool.
///
/// Environment variables:
///   ESPBUNDLE_CONFIG            - Configuration file path
///   ESPBUNDLE_PORT              - Serial port (skips auto-detection)
///   ESPBUNDLE_BAUD              - Baud rate override
///   ESPBUNDLE_TOOL              - Flashing tool override
///   ESPBUNDLE_NON_INTERACTIVE   - Non-interactive mode (disable prompts)
#[derive(Parser)]
#[command(name = "espbundle")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Serial port to use (all ports are probed if not specified).
    #[arg(short, long, global = true, env = "ESPBUNDLE_PORT")]
    port: Option<String>,

    /// Baud rate (overrides the configuration file).
    #[arg(short, long, global = true, env = "ESPBUNDLE_BAUD")]
    baud: Option<u32>,

    /// Flashing tool executable (overrides the configuration file).
    #[arg(long, global = true, env = "ESPBUNDLE_TOOL")]
    tool: Option<String>,

    /// Echo the flashing tool's output.
    #[arg(long, global = true)]
    echo_tool_output: bool,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Non-interactive mode (fail instead of prompting).
    #[arg(long, global = true, env = "ESPBUNDLE_NON_INTERACTIVE")]
    non_interactive: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH", env = "ESPBUNDLE_CONFIG")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Load the configuration file and apply overrides.
    fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config_path.as_deref())?;
        config.apply(&Overrides {
            baud_rate: self.baud,
            tool: self.tool.clone(),
            echo_tool_output: self.echo_tool_output,
        })?;
        Ok(config)
    }
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Probe once and print the device status.
    Status {
        /// Output the status as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Keep polling and display the device status.
    Watch {
        /// Upload this bundle as soon as a device is found, then exit.
        #[arg(long, value_name = "BUNDLE")]
        upload: Option<PathBuf>,
    },

    /// Erase the device and flash a zip bundle.
    Upload {
        /// Path to the zip bundle (prompted for if omitted).
        bundle: Option<PathBuf>,

        /// Skip the erase confirmation.
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the flash layout of a bundle without touching a device.
    Plan {
        /// Path to the zip bundle.
        bundle: PathBuf,

        /// Output the plan as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// List available serial ports.
    ListPorts {
        /// Output port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions.
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> ExitCode {
    // --- NO_COLOR and TTY detection ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "espbundle v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    if let Err(e) = ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::Relaxed)) {
        debug!("Failed to install Ctrl-C handler: {e}");
    }
    espbundle::set_interrupt_checker(was_interrupted);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", style("Error:").red().bold());
            ExitCode::from(exit_code_for(&err))
        },
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Status { json } => {
            let config = cli.load_config()?;
            commands::status::cmd_status(cli, &config, *json)
        },
        Commands::Watch { upload } => {
            let config = cli.load_config()?;
            commands::watch::cmd_watch(cli, &config, upload.as_deref())
        },
        Commands::Upload { bundle, yes } => {
            let config = cli.load_config()?;
            commands::upload::cmd_upload(cli, &config, bundle.clone(), *yes)
        },
        Commands::Plan { bundle, json } => {
            let config = cli.load_config()?;
            commands::plan::cmd_plan(&config, bundle, *json)
        },
        Commands::ListPorts { json } => {
            commands::ports::cmd_list_ports(*json);
            Ok(())
        },
        Commands::Completions { shell } => {
            commands::completions::cmd_completions(*shell);
            Ok(())
        },
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_command_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parse_status() {
        let cli = Cli::try_parse_from(["espbundle", "status", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Status { json: true }));
    }

    #[test]
    fn test_cli_parse_watch_with_upload() {
        let cli = Cli::try_parse_from(["espbundle", "watch", "--upload", "fw.zip"]).unwrap();
        match cli.command {
            Commands::Watch { upload } => assert_eq!(upload, Some(PathBuf::from("fw.zip"))),
            _ => panic!("expected watch"),
        }
    }

    #[test]
    fn test_cli_parse_upload() {
        let cli = Cli::try_parse_from(["espbundle", "upload", "bundle.zip", "-y"]).unwrap();
        match cli.command {
            Commands::Upload { bundle, yes } => {
                assert_eq!(bundle, Some(PathBuf::from("bundle.zip")));
                assert!(yes);
            },
            _ => panic!("expected upload"),
        }
    }

    #[test]
    fn test_cli_parse_upload_without_bundle() {
        let cli = Cli::try_parse_from(["espbundle", "upload"]).unwrap();
        assert!(matches!(cli.command, Commands::Upload { bundle: None, yes: false }));
    }

    #[test]
    fn test_cli_parse_plan() {
        let cli = Cli::try_parse_from(["espbundle", "plan", "bundle.zip", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Plan { json: true, .. }));
    }

    #[test]
    fn test_cli_plan_requires_bundle() {
        assert!(Cli::try_parse_from(["espbundle", "plan"]).is_err());
    }

    #[test]
    fn test_cli_parse_list_ports() {
        let cli = Cli::try_parse_from(["espbundle", "list-ports"]).unwrap();
        assert!(matches!(cli.command, Commands::ListPorts { json: false }));
    }

    #[test]
    fn test_cli_parse_completions() {
        let cli = Cli::try_parse_from(["espbundle", "completions", "zsh"]).unwrap();
        assert!(matches!(cli.command, Commands::Completions { shell: Shell::Zsh }));
    }

    #[test]
    fn test_cli_global_options() {
        let cli = Cli::try_parse_from([
            "espbundle",
            "status",
            "--port",
            "/dev/ttyACM0",
            "--baud",
            "921600",
            "--tool",
            "esptool.py",
            "--echo-tool-output",
            "--non-interactive",
            "-vv",
            "--config",
            "my.toml",
        ])
        .unwrap();
        assert_eq!(cli.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(cli.baud, Some(921_600));
        assert_eq!(cli.tool.as_deref(), Some("esptool.py"));
        assert!(cli.echo_tool_output);
        assert!(cli.non_interactive);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config_path, Some(PathBuf::from("my.toml")));
    }

    #[test]
    fn test_cli_missing_subcommand() {
        assert!(Cli::try_parse_from(["espbundle"]).is_err());
    }

    #[test]
    fn test_cli_invalid_baud() {
        assert!(Cli::try_parse_from(["espbundle", "status", "--baud", "fast"]).is_err());
    }

    #[test]
    fn test_exit_codes() {
        let usage = anyhow::Error::from(CliError::Usage("no bundle".into()));
        assert_eq!(exit_code_for(&usage), 2);

        let cancelled = anyhow::Error::from(CliError::Cancelled("stopped".into()));
        assert_eq!(exit_code_for(&cancelled), 130);

        let lib_cancelled = anyhow::Error::from(espbundle::Error::Cancelled).context("upload");
        assert_eq!(exit_code_for(&lib_cancelled), 130);

        let other = anyhow::Error::from(espbundle::Error::NoDeviceFound);
        assert_eq!(exit_code_for(&other), 1);
    }
}
