// crates/ado-bridge-cli/src/main.rs
// ============================================================================
// Module: ADO Bridge CLI Entry Point
// Description: Command dispatcher for the ADO bridge MCP server.
// Purpose: Start the server, validate configuration, and inspect tools.
// Dependencies: clap, dotenvy, ado-bridge-config, ado-bridge-mcp, tokio.
// ============================================================================

//! ## Overview
//! The ADO bridge CLI loads configuration (file, `.env`, then process
//! environment), starts the HTTP MCP server, and offers offline helpers for
//! validating configuration and listing the built-in tool catalog.
//! Security posture: secrets arrive via environment or config and are never
//! echoed back to the terminal.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use ado_bridge_config::AdoBridgeConfig;
use ado_bridge_mcp::McpServer;
use ado_bridge_mcp::default_registry;
use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "ado-bridge", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Dotenv file loaded before reading the environment (defaults to `.env`).
    #[arg(long, value_name = "PATH", global = true)]
    env_file: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the MCP server over HTTP.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Tool catalog utilities.
    Tools {
        /// Selected tools subcommand.
        #[command(subcommand)]
        command: ToolsCommand,
    },
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to ado-bridge.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a config file and report missing settings.
    Validate(ConfigValidateCommand),
}

/// Arguments for config validation.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to ado-bridge.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Tools subcommands.
#[derive(Subcommand, Debug)]
enum ToolsCommand {
    /// Print the tool catalog as JSON.
    List,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("ado-bridge {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    load_env_file(cli.env_file.as_deref())?;

    match command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command,
        } => command_config(command),
        Commands::Tools {
            command,
        } => command_tools(&command),
    }
}

/// Loads a dotenv file into the process environment.
///
/// An explicit path must exist; the default `.env` is optional. Variables
/// already present in the environment win over file values.
fn load_env_file(path: Option<&Path>) -> CliResult<()> {
    match path {
        Some(path) => dotenvy::from_path(path).map_err(|err| {
            CliError::new(format!("failed to load env file {}: {err}", path.display()))
        }),
        None => match dotenvy::dotenv() {
            Ok(_) => Ok(()),
            Err(err) if err.not_found() => Ok(()),
            Err(err) => Err(CliError::new(format!("failed to load .env: {err}"))),
        },
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = AdoBridgeConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let server = McpServer::from_config(&config)
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    write_stderr_line(&format!("ado-bridge: listening on http://{}", server.bind_addr()))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    server.serve().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config Command
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(&command),
    }
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let config = AdoBridgeConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    for line in validation_report(&config) {
        write_stdout_line(&line).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Renders the validation summary lines for a loaded config.
fn validation_report(config: &AdoBridgeConfig) -> Vec<String> {
    let missing = config.missing_settings();
    if missing.is_empty() {
        return vec!["config ok".to_string()];
    }
    let mut lines = vec!["config ok with missing settings:".to_string()];
    lines.extend(missing.into_iter().map(|setting| format!("  - {setting}")));
    lines
}

// ============================================================================
// SECTION: Tools Command
// ============================================================================

/// Executes tools subcommands.
fn command_tools(command: &ToolsCommand) -> CliResult<ExitCode> {
    match command {
        ToolsCommand::List => {
            let rendered = render_tool_catalog()?;
            write_stdout_line(&rendered)
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Serializes the built-in tool catalog as pretty JSON.
fn render_tool_catalog() -> CliResult<String> {
    let registry = default_registry()
        .map_err(|err| CliError::new(format!("tool registry init failed: {err}")))?;
    serde_json::to_string_pretty(&registry.definitions())
        .map_err(|err| CliError::new(format!("failed to serialize tools: {err}")))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Prints the top-level help text.
fn show_help() -> CliResult<()> {
    let help = Cli::command().render_help().to_string();
    write_stdout_line(&help).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
