use std::process::ExitCode;

use rest_api::config::load_config;
use rest_api::lifecycle::startup;
use rest_api::ShutdownSignal;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("rest-api: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match startup::run(config, ShutdownSignal::new()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("rest-api: {}", e);
            ExitCode::FAILURE
        }
    }
}
