use anyhow::{Context, Result};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agency::{env_bet, shutdown, ClientSession, Config, CsvBetSource, RunOutcome};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // LOG_FORMAT=text for human-readable output
    let use_json = std::env::var("LOG_FORMAT")
        .unwrap_or_else(|_| "json".to_string())
        .eq_ignore_ascii_case("json");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "agency=info".into());

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        service = "agency",
        version = env!("CARGO_PKG_VERSION"),
        log_format = if use_json { "json" } else { "text" },
        "Starting agency client"
    );

    let config = Config::load()?;
    tracing::info!(
        agency_id = %config.agency.id,
        server = %config.server.address,
        batch_max_amount = config.batch.max_amount,
        confirmation = ?config.batch.confirmation,
        "Configuration loaded"
    );

    let session = ClientSession::new(config);
    let handle = session.shutdown_handle();
    let signals = shutdown::on_signal(move || handle.request_shutdown());

    let agency_id = session.config().agency.id.clone();
    let outcome = match session.config().agency.data_path.clone() {
        Some(path) => {
            let source = CsvBetSource::open(&path, agency_id.as_str())
                .with_context(|| format!("failed to open bets file {}", path.display()))?;
            session.run(source).await
        }
        None => {
            let bet = env_bet(&agency_id, |key| std::env::var(key).ok())
                .context("CLI_DATA_PATH is not set and BET_* variables are incomplete")?;
            session.run(vec![Ok(bet)]).await
        }
    };
    signals.abort();

    if let RunOutcome::Success { report, winners } = &outcome {
        tracing::info!(
            batches = report.batches_sent,
            bets = report.bets_sent,
            winner_count = winners.len(),
            "Agency run complete"
        );
    }
    Ok(ExitCode::from(outcome.exit_code()))
}
