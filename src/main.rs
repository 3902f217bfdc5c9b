mod cli;

use std::sync::Arc;

use ledgerctl::config::Streams;
use tracing_subscriber::EnvFilter;

fn main() {
    dotenvy::dotenv().ok();

    // Logs go to stderr so plugin output on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let args: Vec<String> = std::env::args().collect();
    let code = runtime.block_on(cli::run(args, Arc::new(Streams::inherit())));
    std::process::exit(code);
}
