use std::process::ExitCode;

use clap::Parser;
use popgen::config::setup_logging;
use tracing::{error, info};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    if let Err(err) = dotenvy::dotenv()
        && !err.not_found()
    {
        eprintln!("Failed to read .env file: {}", err);
    }
    let cli = popgen::cli::CliOptions::parse();

    let _ = setup_logging(cli.debug);

    let state = match cli.app_state() {
        Ok(state) => state,
        Err(err) => {
            error!("Configuration error: {}", err);
            return ExitCode::FAILURE;
        }
    };
    info!("Writing generated images to {}", cli.output_dir.display());

    if let Err(err) = popgen::web::setup_server(&cli.listen_address, cli.port, state).await {
        error!("Application error: {}", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
