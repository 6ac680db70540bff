use counter_relay_cli::run_cli;
use tracing::error;

#[tokio::main]
async fn main() {
    if let Err(e) = run_cli().await {
        error!("counter-relay error: {}", e);
        // Also reach operators when logging never came up
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
