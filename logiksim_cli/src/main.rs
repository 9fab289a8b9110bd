//! `logiksim` — a command-line front-end for the LogikSim simulation
//! core. Reads newline-delimited JSON commands from a file or stdin,
//! writes newline-delimited JSON updates to stdout.

use clap::{Arg, ArgAction, Command as ClapCommand};
use logiksim_cli::{validate, CliConfig};
use logiksim_core::config::SimulationConfig;
use std::fs::File;
use std::io::{self, BufReader};

fn build_cli() -> ClapCommand {
    ClapCommand::new("logiksim")
        .about("LogikSim discrete-event digital logic simulator")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("enable debug logging"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("only log errors"),
        )
        .subcommand(
            ClapCommand::new("run")
                .about("run a session from a command file (defaults to stdin)")
                .arg(Arg::new("file").help("path to a newline-delimited JSON command file"))
                .arg(
                    Arg::new("max-time")
                        .long("max-time")
                        .help("stop once simulated time passes this many ticks"),
                )
                .arg(
                    Arg::new("grid-spacing")
                        .long("grid-spacing")
                        .help("grid units per interconnect delay step"),
                ),
        )
        .subcommand(
            ClapCommand::new("check")
                .about("validate a single command's JSON shape without running a session")
                .arg(Arg::new("line").required(true)),
        )
}

fn main() {
    let matches = build_cli().get_matches();
    let config = CliConfig {
        verbose: matches.get_flag("verbose"),
        quiet: matches.get_flag("quiet"),
    };
    config.init_logging();

    let result = match matches.subcommand() {
        Some(("run", sub)) => run_command(sub),
        Some(("check", sub)) => check_command(sub),
        _ => {
            log::error!("no subcommand given; try `logiksim run` or `logiksim check`");
            std::process::exit(2);
        }
    };

    if let Err(err) = result {
        log::error!("{err}");
        std::process::exit(1);
    }
}

fn run_command(sub: &clap::ArgMatches) -> anyhow::Result<()> {
    let mut sim_config = SimulationConfig::default();
    if let Some(max_time) = sub.get_one::<String>("max-time") {
        sim_config.max_time = Some(max_time.parse()?);
    }
    if let Some(grid_spacing) = sub.get_one::<String>("grid-spacing") {
        sim_config.grid_spacing = grid_spacing.parse()?;
    }

    let stdout = io::stdout();
    match sub.get_one::<String>("file") {
        Some(path) => {
            let reader = BufReader::new(File::open(path)?);
            logiksim_cli::run_session(sim_config, reader, stdout.lock())?;
        }
        None => {
            let reader = io::stdin().lock();
            logiksim_cli::run_session(sim_config, reader, stdout.lock())?;
        }
    }
    Ok(())
}

fn check_command(sub: &clap::ArgMatches) -> anyhow::Result<()> {
    let line = sub.get_one::<String>("line").expect("required");
    let command = validate(line)?;
    println!("ok: {command:?}");
    Ok(())
}
