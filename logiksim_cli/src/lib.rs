//! Library half of the `logiksim` command-line front-end.
//!
//! Grounded on the teacher's `logisim_cli/src/lib.rs`: a thiserror'd
//! `CliError`, a `CliConfig` carrying the verbosity flags `main.rs` parses,
//! and a `run_session` entry point `main.rs` calls into — the teacher's
//! equivalent was `simulate()`/`validate()`.

use logiksim_core::config::SimulationConfig;
use logiksim_core::controller::Controller;
use logiksim_core::protocol::{Command, Update};
use std::io::{BufRead, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("invalid command line: {0}")]
    CommandError(String),

    #[error("invalid configuration: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("malformed command/update JSON: {0}")]
    FormatError(#[from] serde_json::Error),

    #[error(transparent)]
    CoreError(#[from] logiksim_core::error::CoreError),
}

pub type CliResult<T> = Result<T, CliError>;

/// Verbosity flags parsed from the command line.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub verbose: bool,
    pub quiet: bool,
}

impl CliConfig {
    /// Initialize `env_logger` at the level these flags imply. Called once,
    /// from `main`.
    pub fn init_logging(&self) {
        let level = if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    }
}

/// Read newline-delimited JSON [`Command`]s from `input`, feed them to a
/// fresh [`Controller`], and write every [`Update`] it produces to `output`
/// as newline-delimited JSON. Blank lines are skipped. Once `input` is
/// exhausted the controller is run to completion so any events still
/// pending get to fire before we return.
pub fn run_session(
    config: SimulationConfig,
    mut input: impl BufRead,
    mut output: impl Write,
) -> CliResult<()> {
    let (mut ctrl, commands_tx, updates_rx) = Controller::new(config);

    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = input.read_line(&mut line)?;
        if bytes_read == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let command: Command = serde_json::from_str(trimmed)?;
        log::debug!("submitting command: {trimmed}");
        if commands_tx.send(command).is_err() {
            break;
        }
        ctrl.process(0);
        drain_updates(&updates_rx, &mut output)?;
    }

    drop(commands_tx);
    ctrl.run();
    drain_updates(&updates_rx, &mut output)?;
    Ok(())
}

fn drain_updates(
    updates_rx: &crossbeam_channel::Receiver<Update>,
    output: &mut impl Write,
) -> CliResult<()> {
    while let Ok(update) = updates_rx.try_recv() {
        let text = serde_json::to_string(&update)?;
        writeln!(output, "{text}")?;
    }
    Ok(())
}

/// Validate that a command line parses without actually running a session;
/// used by the CLI's `--check` flag.
pub fn validate(line: &str) -> CliResult<Command> {
    serde_json::from_str(line).map_err(CliError::from)
}
