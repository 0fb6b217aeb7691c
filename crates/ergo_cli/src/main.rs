//! Command-line regeneration entry point.
//!
//! # Responsibility
//! - Probe `ergo_core` linkage (ping/version), as a quick sanity check.
//! - Open a project, regenerate it when it holds form data, and report
//!   notifications. A project without form data is left untouched.
//!
//! # Exit codes
//! - `0` success, `1` error notifications, `2` invalid invocation.

use clap::{Parser, ValueEnum};
use ergo_core::{Collaborators, EditorSession, SessionConfig, Severity, StoreBackend};
use log::info;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "ergo_cli",
    version,
    about = "Regenerate the Typst sources of an Ergo paper project"
)]
struct Cli {
    /// Project directory containing the form data.
    #[arg(value_name = "PROJECT_DIR")]
    project_dir: PathBuf,

    /// Form-data backend.
    #[arg(long, value_enum)]
    store: Option<StoreArg>,

    /// Session config JSON file (defaults apply to missing keys).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write rotating log files into this directory.
    #[arg(long = "log-dir", value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Log level used with --log-dir.
    #[arg(long = "log-level", value_name = "LEVEL")]
    log_level: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum StoreArg {
    Json,
    Sqlite,
}

impl From<StoreArg> for StoreBackend {
    fn from(value: StoreArg) -> Self {
        match value {
            StoreArg::Json => Self::Json,
            StoreArg::Sqlite => Self::Sqlite,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    println!("ergo_core ping={}", ergo_core::ping());
    println!("ergo_core version={}", ergo_core::core_version());

    if let Some(log_dir) = &cli.log_dir {
        if let Err(err) = ergo_core::init_logging(log_level(&cli), absolute(log_dir)) {
            eprintln!("warning: logging disabled: {err}");
        }
    }

    if !cli.project_dir.is_dir() {
        eprintln!(
            "error: project directory `{}` does not exist",
            cli.project_dir.display()
        );
        return ExitCode::from(2);
    }

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("error: {message}");
            return ExitCode::from(2);
        }
    };
    if let Some(store) = cli.store {
        config.store = store.into();
    }

    let collaborators = match Collaborators::for_project(&cli.project_dir, &config) {
        Ok(collaborators) => collaborators,
        Err(err) => {
            eprintln!("error: failed to open {} store: {err}", config.store.as_str());
            return ExitCode::FAILURE;
        }
    };

    let mut session = EditorSession::new(&cli.project_dir, collaborators, &config);
    session.open();
    let passes = session.settle();
    session.close();
    info!(
        "event=cli_run module=cli status=done populated={} passes={}",
        session.is_touched(),
        passes
    );

    let document = session.document();
    println!(
        "project={} store={} sections={} authors={} passes={}",
        cli.project_dir.display(),
        config.store.as_str(),
        document.sections().len(),
        document.people().authors().len(),
        passes
    );

    let mut failed = false;
    for notification in session.take_notifications() {
        failed |= notification.severity == Severity::Error;
        eprintln!("{}: {}", notification.severity, notification.message);
    }
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn log_level(cli: &Cli) -> &str {
    cli.log_level
        .as_deref()
        .unwrap_or(ergo_core::default_log_level())
}

fn load_config(path: Option<&Path>) -> Result<SessionConfig, String> {
    let Some(path) = path else {
        return Ok(SessionConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read config `{}`: {err}", path.display()))?;
    serde_json::from_str(&raw)
        .map_err(|err| format!("invalid config `{}`: {err}", path.display()))
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
