/// Ember CLI
///
/// Runs, checks and evaluates scripts in a sandboxed state configured from
/// `ember.toml`, `EMBER_*` variables and flags.
use ember_core::cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run_cli().await {
        eprintln!("{}", cli::render_error(&e));
        std::process::exit(cli::exit_code(&e));
    }
}
