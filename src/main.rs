use std::sync::Arc;

use postpulse::config::{load_config, print_schema};
use postpulse::startup;
use postpulse::utils::logger::init_logging;

#[tokio::main]
async fn main() {
    if std::env::args().any(|arg| arg == "--schema") {
        print_schema();
        return;
    }

    let config = load_config();
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialise logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = startup::run(Arc::new(config)).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
