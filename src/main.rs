use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use kajian_notes::{App, Cli, Config, NotesError};

pub fn initialize_logger(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();

    info!("Logger initialized");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    initialize_logger(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            if e.is_storage_failure() {
                eprintln!("Save failed: {}", e);
            } else {
                eprintln!("Error: {}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), NotesError> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    info!("Using data directory {}", config.data_dir.display());

    let app = App::open(config, cli.verbose).await?;
    app.run(cli.command).await
}
