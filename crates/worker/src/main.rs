//! `oneadif-worker`: runs one upload job.
//!
//! Reads a start command on stdin, writes state/progress events on
//! stdout and logs to stderr. Started by `oneadif-control`.

use oneadif_elog::{Dialect, ElogClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oneadif_worker=info,oneadif_elog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // ELOG_BASE_URL points every provider at one host (staging, tests).
    let base_url = std::env::var("ELOG_BASE_URL").ok();
    let make_client = move |provider| match base_url {
        Some(url) => ElogClient::with_dialect(Dialect::for_provider(provider).with_base_url(url)),
        None => ElogClient::new(provider),
    };

    match oneadif_worker::serve(tokio::io::stdin(), tokio::io::stdout(), make_client).await {
        Ok(state) => {
            tracing::info!(state = %state, "Worker finished");
            // The blocking stdin reader would otherwise keep the runtime alive.
            std::process::exit(0);
        }
        Err(e) => {
            tracing::error!(error = %e, "Worker failed");
            std::process::exit(1);
        }
    }
}
