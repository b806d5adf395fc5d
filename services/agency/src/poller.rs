//! Draw result polling
//!
//! Each attempt opens a fresh connection, sends WINNERS_QUERY with the agency
//! id and reads exactly one reply. NOT_READY schedules another attempt after
//! the retry strategy's delay; WINNERS ends the loop.

use std::time::Instant;
use tracing::Instrument;

use protocol::{parse_winners, OperationCode};

use crate::config::Config;
use crate::connection::Lifecycle;
use crate::errors::{ClientError, Result};
use crate::retry_strategy::RetryStrategy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Winning documents, in server order
    Winners(Vec<String>),
    /// Shutdown was requested before results arrived
    Interrupted,
}

pub struct ResultPoller<'a> {
    lifecycle: &'a Lifecycle,
    config: &'a Config,
    retry: RetryStrategy,
}

impl<'a> ResultPoller<'a> {
    pub fn new(lifecycle: &'a Lifecycle, config: &'a Config) -> Self {
        Self {
            lifecycle,
            config,
            retry: RetryStrategy::new(&config.poll),
        }
    }

    /// Query until the server publishes results, shutdown is requested, or
    /// the attempt limit runs out.
    pub async fn poll(&self) -> Result<PollOutcome> {
        let span = tracing::info_span!("poll", agency_id = %self.config.agency.id);
        match self.poll_loop().instrument(span).await {
            Ok(outcome) => Ok(outcome),
            Err(_) if !self.lifecycle.is_running() => Ok(PollOutcome::Interrupted),
            Err(e) => Err(e),
        }
    }

    async fn poll_loop(&self) -> Result<PollOutcome> {
        let start_time = Instant::now();
        let mut backoff = self.retry.create_backoff();
        let mut attempts: u32 = 0;

        loop {
            if !self.lifecycle.is_running() {
                return Ok(PollOutcome::Interrupted);
            }

            attempts += 1;
            metrics::counter!("agency_poll_attempts_total").increment(1);

            if let Some(winners) = self.query_once().await? {
                tracing::info!(
                    attempts,
                    winner_count = winners.len(),
                    duration_ms = start_time.elapsed().as_millis() as u64,
                    "Draw results received"
                );
                return Ok(PollOutcome::Winners(winners));
            }

            if !self.retry.should_retry(attempts) {
                tracing::warn!(attempts, "Giving up on draw results");
                return Err(ClientError::PollExhausted { attempts });
            }

            let delay = self.retry.next_delay(&mut backoff);
            tracing::debug!(attempts, delay_ms = delay.as_millis() as u64, "Results not ready");

            tokio::select! {
                biased;
                _ = self.lifecycle.stopped() => return Ok(PollOutcome::Interrupted),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One query round trip. `None` means the draw has not happened yet.
    async fn query_once(&self) -> Result<Option<Vec<String>>> {
        let mut conn = self.lifecycle.open(&self.config.server.address).await?;
        let result = async {
            conn.send(OperationCode::WinnersQuery, self.config.agency.id.as_bytes())
                .await?;
            conn.receive().await
        }
        .await;
        conn.close().await;

        let frame = result?;
        match frame.opcode {
            OperationCode::NotReady => Ok(None),
            OperationCode::Winners if frame.is_empty() => Ok(Some(Vec::new())),
            OperationCode::Winners => Ok(Some(parse_winners(frame.text()?))),
            other => Err(ClientError::unexpected(
                "NOT_READY or WINNERS",
                other,
                &frame.payload,
            )),
        }
    }
}
