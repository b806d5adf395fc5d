//! Client session: transmit every bet, then poll for the draw results.

use protocol::{BetRecord, ErrorKind};
use tracing::Level;

use crate::config::Config;
use crate::connection::{Lifecycle, ShutdownHandle};
use crate::errors::{ClientError, Result};
use crate::poller::{PollOutcome, ResultPoller};
use crate::source::SourceError;
use crate::transmitter::{BatchTransmitter, TransmitReport};

/// How a session run ended.
#[derive(Debug)]
pub enum RunOutcome {
    Success {
        report: TransmitReport,
        winners: Vec<String>,
    },
    Aborted(ClientError),
    /// Shutdown was requested; whatever was in flight was dropped silently.
    Shutdown,
}

impl RunOutcome {
    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Success { .. } | RunOutcome::Shutdown => 0,
            RunOutcome::Aborted(e) => e.kind().exit_code(),
        }
    }
}

pub struct ClientSession {
    config: Config,
    lifecycle: Lifecycle,
}

impl ClientSession {
    pub fn new(config: Config) -> Self {
        let lifecycle = Lifecycle::new(
            config.server.connect_timeout,
            config.server.max_payload_bytes,
        );
        Self { config, lifecycle }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.lifecycle.shutdown_handle()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// Send all records, then wait for the winners of this agency.
    pub async fn run<I>(&self, source: I) -> RunOutcome
    where
        I: IntoIterator<Item = std::result::Result<BetRecord, SourceError>>,
    {
        let mut transmitter = BatchTransmitter::new(&self.lifecycle, &self.config);
        let report = match transmitter.transmit(source).await {
            Ok(report) => report,
            Err(e) => return self.abort(e),
        };

        let poller = ResultPoller::new(&self.lifecycle, &self.config);
        match poller.poll().await {
            Ok(PollOutcome::Winners(winners)) => {
                tracing::info!(
                    action = "winners_query",
                    result = "success",
                    agency_id = %self.config.agency.id,
                    winner_count = winners.len(),
                    "Winners received"
                );
                RunOutcome::Success { report, winners }
            }
            Ok(PollOutcome::Interrupted) => self.stopped(),
            Err(e) => self.abort(e),
        }
    }

    /// Submit a single bet with the legacy BET operation.
    pub async fn send_bet(&self, bet: &BetRecord) -> Result<()> {
        BatchTransmitter::new(&self.lifecycle, &self.config)
            .send_bet(bet)
            .await
    }

    fn abort(&self, error: ClientError) -> RunOutcome {
        if !self.is_running() || error.kind() == ErrorKind::Shutdown {
            return self.stopped();
        }

        let kind = error.kind();
        let agency_id = &self.config.agency.id;
        if kind.log_level() == Level::WARN {
            tracing::warn!(agency_id = %agency_id, kind = %kind, error = %error, "Run aborted");
        } else {
            tracing::error!(agency_id = %agency_id, kind = %kind, error = %error, "Run aborted");
        }
        RunOutcome::Aborted(error)
    }

    fn stopped(&self) -> RunOutcome {
        tracing::info!(
            action = "shutdown",
            result = "success",
            agency_id = %self.config.agency.id,
            "Session stopped"
        );
        RunOutcome::Shutdown
    }
}
