use clap::Parser;
use doit::cli::Cli;
use doit::utils::logger::init_logger;
use doit::Shell;
use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logger(cli.log_level.as_deref(), cli.log_file.clone()) {
        eprintln!("doit: failed to initialise logging: {:#}", err);
        return ExitCode::from(2);
    }

    let config = match cli.resolve_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("doit: {}", err);
            return ExitCode::from(2);
        }
    };

    match run(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("doit: {:#}", err);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli, config: doit::ShellConfig) -> anyhow::Result<()> {
    let mut shell = Shell::new(config)?;
    if cli.is_single_shot() {
        shell.run_single(cli.command)?;
    } else {
        shell.run_interactive(io::stdin().lock())?;
    }
    Ok(())
}
