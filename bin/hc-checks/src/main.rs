//! Entrypoint.

use std::time::Duration;

use checks::{Checks, Client, Outcome};
use clap::Parser;
use config::Opts;
use dotenvy::dotenv;
use eyre::WrapErr;
use tracing::debug;
use tracing_subscriber::filter::EnvFilter;

/// Load `ENV_FILE` if set, otherwise the default `.env` when present.
fn load_env() -> eyre::Result<()> {
    if let Ok(custom_env_file) = std::env::var("ENV_FILE") {
        dotenvy::from_filename(&custom_env_file)
            .wrap_err_with(|| format!("failed to load ENV_FILE {custom_env_file}"))?;
    } else {
        // Try the default .env file, and ignore if it doesn't exist.
        dotenv().ok();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let env_loaded = load_env();

    let opts = Opts::parse();

    // stdout is reserved for the JSON outcome.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match env_loaded {
        Ok(()) => run(&opts).await,
        Err(e) => Err(e),
    };
    let outcome = Outcome::from_result(result);

    println!("{}", serde_json::to_string(&outcome)?);
    if outcome.failed {
        std::process::exit(1);
    }
    Ok(())
}

async fn run(opts: &Opts) -> eyre::Result<Outcome> {
    let invocation = opts.resolve()?;
    let args = &invocation.args;
    debug!(state = %args.state, check_mode = args.check_mode, "Resolved invocation");

    let client = Client::with_base_url(
        invocation.api_token.clone(),
        opts.api.api_url.clone(),
        Duration::from_secs(opts.api.timeout_secs),
    )?;

    Checks::new(client, args.check_mode).run(args.state, &args.check, args.uuid()).await
}
