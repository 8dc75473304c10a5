//! `sbc` entry point.

use clap::Parser;
use sbc::cli::commands::{self, Context};
use sbc::cli::{Cli, Commands};
use sbc::config::{Settings, resolve_state_dir};
use sbc::error::Error;
use std::process::ExitCode;
use std::time::Duration;

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);
    if cli.no_color {
        colored::control::set_override(false);
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                eprintln!("{}", e.to_structured_json());
            } else if let Some(hint) = e.hint() {
                eprintln!("Error: {e}\n  Hint: {hint}");
            } else {
                eprintln!("Error: {e}");
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,russh=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn context(cli: &Cli) -> Result<Context, Error> {
    let state_dir = resolve_state_dir(cli.state_dir.as_deref()).ok_or_else(|| {
        Error::InvalidArgument(
            "cannot determine the home directory; pass --state-dir or set SBC_STATE_DIR".to_string(),
        )
    })?;

    let mut settings = Settings::new(state_dir);
    settings.connect_timeout = Duration::from_secs(cli.timeout);
    if let Some(command) = cli.restart_command.as_deref().filter(|c| !c.trim().is_empty()) {
        settings.restart_command = command.to_string();
    }

    Ok(Context {
        settings,
        json: cli.json,
    })
}

fn run(cli: &Cli) -> Result<(), Error> {
    match &cli.command {
        Commands::Version => return commands::version::execute(cli.json),
        Commands::Completions { shell } => return commands::completions::execute(shell),
        _ => {}
    }

    let ctx = context(cli)?;
    match &cli.command {
        // Local files
        Commands::Show { file } => commands::edit::show(file, &ctx),
        Commands::Get { file, key } => commands::edit::get(file, key, &ctx),
        Commands::Set(args) => commands::edit::set(&args.file, &args.assignments, &ctx),

        // Connection profile
        Commands::Profile { command } => commands::profile::execute(command, &ctx),

        // Device
        Commands::Pull { show } => commands::remote::pull(*show, &ctx),
        Commands::Push { file, yes } => commands::remote::push(file.as_deref(), *yes, &ctx),
        Commands::Apply { yes } => commands::remote::apply(*yes, &ctx),

        Commands::Shell => commands::shell::execute(&ctx),

        Commands::Version | Commands::Completions { .. } => Ok(()),
    }
}
