//! mediadl - download media files and post-process videos with ffmpeg.

mod cli;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log directives for the engine and this binary. `RUST_LOG` replaces them.
fn log_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "info" } else { "warn" };
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mediadl={level},mediadl_cli={level}")))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env may set MEDIADL_* overrides and RUST_LOG
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(log_filter(cli::is_verbose()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    cli::run().await
}
