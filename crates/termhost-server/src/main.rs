//! Termhost server: hosts one shell on a PTY and serves its screen over
//! HTTP.
//!
//! Three GET endpoints drive the hosted terminal: `/keyboard` delivers a key
//! event, `/screen` returns the encoded snapshot, `/stop` tears the session
//! down. The terminal starts lazily on the first keyboard or screen request.

// CLI binary allowances (library lints stay strict)
#![allow(missing_docs)]
#![allow(clippy::print_stderr)]

mod http;

use std::sync::Arc;

use clap::Parser;
use miette::{bail, IntoDiagnostic, Result};
use termhost::pty::{self, Cmd, Size};
use termhost::term::{TermConfig, TermSlot};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "termhost-server", version, about = "Headless terminal host HTTP service")]
struct Cli {
    /// Listen port; 0 picks an ephemeral port
    #[arg(long, default_value_t = 0)]
    port: u16,

    /// Terminal rows
    #[arg(long, default_value_t = 27)]
    row: i32,

    /// Terminal columns
    #[arg(long, default_value_t = 58)]
    col: i32,

    /// Shell to run on the terminal
    #[arg(long, default_value_t = default_shell())]
    shell: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let Ok(row) = u16::try_from(cli.row) else {
        bail!("invalid row");
    };
    let Ok(col) = u16::try_from(cli.col) else {
        bail!("invalid col");
    };
    if row == 0 {
        bail!("invalid row");
    }
    if col == 0 {
        bail!("invalid col");
    }
    if cli.shell.is_empty() {
        bail!("shell not specified");
    }

    let slot = Arc::new(TermSlot::new(TermConfig {
        open: Arc::new(pty::open),
        size: Size::new(row, col),
        cmd: Cmd {
            path: cli.shell,
            args: Vec::new(),
        },
    }));

    http::serve(cli.port, Arc::clone(&slot))
        .await
        .into_diagnostic()?;
    slot.stop();
    Ok(())
}

/// The platform's default interactive shell.
#[cfg(windows)]
fn default_shell() -> String {
    if let Ok(comspec) = std::env::var("COMSPEC") {
        if !comspec.is_empty() {
            return comspec;
        }
    }
    if let Ok(systemroot) = std::env::var("SYSTEMROOT") {
        if !systemroot.is_empty() {
            return format!("{systemroot}\\system32\\cmd.exe");
        }
    }
    if let Some(path) = find_on_path("cmd.exe") {
        return path;
    }
    String::new()
}

/// The platform's default interactive shell.
#[cfg(not(windows))]
fn default_shell() -> String {
    if let Ok(shell) = std::env::var("SHELL") {
        if !shell.is_empty() {
            return shell;
        }
    }
    if let Some(path) = find_on_path("sh") {
        return path;
    }
    String::new()
}

fn find_on_path(name: &str) -> Option<String> {
    let paths = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&paths) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate.to_string_lossy().into_owned());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn default_shell_finds_something() {
        assert!(!default_shell().is_empty());
    }
}
