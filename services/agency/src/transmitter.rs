//! Batch transmission
//!
//! Groups bet records into BATCH frames over a single connection, waits for
//! CONFIRMATION frames according to the configured mode, and closes the run
//! with a READY frame carrying the agency id.

use std::time::Instant;
use tracing::Instrument;

use protocol::{encode_batch, BetRecord, OperationCode};

use crate::config::{Config, ConfirmationMode};
use crate::connection::{Connection, Lifecycle};
use crate::errors::{ClientError, Result};
use crate::source::SourceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitState {
    Idle,
    Opening,
    Sending,
    AwaitingConfirmation,
    Finalizing,
    Done,
    Aborted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransmitReport {
    pub batches_sent: usize,
    pub bets_sent: usize,
    pub confirmations: usize,
}

pub struct BatchTransmitter<'a> {
    lifecycle: &'a Lifecycle,
    config: &'a Config,
    state: TransmitState,
    report: TransmitReport,
}

impl<'a> BatchTransmitter<'a> {
    pub fn new(lifecycle: &'a Lifecycle, config: &'a Config) -> Self {
        Self {
            lifecycle,
            config,
            state: TransmitState::Idle,
            report: TransmitReport::default(),
        }
    }

    pub fn state(&self) -> TransmitState {
        self.state
    }

    /// Send every record from `source` and finish with READY.
    ///
    /// Any failure aborts the whole run; nothing is retried.
    pub async fn transmit<I>(&mut self, source: I) -> Result<TransmitReport>
    where
        I: IntoIterator<Item = std::result::Result<BetRecord, SourceError>>,
    {
        let start_time = Instant::now();
        let span = tracing::info_span!("transmit", agency_id = %self.config.agency.id);

        match self.run(source).instrument(span).await {
            Ok(()) => {
                self.transition(TransmitState::Done);
                metrics::histogram!("agency_transmit_duration_seconds")
                    .record(start_time.elapsed().as_secs_f64());
                tracing::info!(
                    action = "transmit",
                    result = "success",
                    batches = self.report.batches_sent,
                    bets = self.report.bets_sent,
                    duration_ms = start_time.elapsed().as_millis() as u64,
                    "All batches sent"
                );
                Ok(self.report.clone())
            }
            Err(e) => {
                self.transition(TransmitState::Aborted);
                Err(e)
            }
        }
    }

    /// Submit one bet with the legacy BET operation on its own connection.
    pub async fn send_bet(&mut self, bet: &BetRecord) -> Result<()> {
        let result = self.run_single(bet).await;
        match result {
            Ok(()) => {
                self.transition(TransmitState::Done);
                tracing::info!(
                    action = "bet_sent",
                    result = "success",
                    document = %bet.document,
                    number = %bet.number,
                    "Bet sent"
                );
                Ok(())
            }
            Err(e) => {
                self.transition(TransmitState::Aborted);
                Err(e)
            }
        }
    }

    async fn run_single(&mut self, bet: &BetRecord) -> Result<()> {
        let mut conn = self.open().await?;
        self.transition(TransmitState::Sending);
        let result = async {
            conn.send(OperationCode::Bet, bet.to_payload().as_bytes()).await?;
            self.report.bets_sent += 1;
            self.await_confirmation(&mut conn).await
        }
        .await;
        conn.close().await;
        result
    }

    async fn run<I>(&mut self, source: I) -> Result<()>
    where
        I: IntoIterator<Item = std::result::Result<BetRecord, SourceError>>,
    {
        let mut conn = self.open().await?;
        let result = self.send_all(&mut conn, source).await;
        conn.close().await;
        result
    }

    async fn open(&mut self) -> Result<Connection> {
        self.transition(TransmitState::Opening);
        self.lifecycle.open(&self.config.server.address).await
    }

    async fn send_all<I>(&mut self, conn: &mut Connection, source: I) -> Result<()>
    where
        I: IntoIterator<Item = std::result::Result<BetRecord, SourceError>>,
    {
        self.transition(TransmitState::Sending);

        let max = self.config.batch.max_amount.max(1);
        let mut batch: Vec<BetRecord> = Vec::with_capacity(max);

        for record in source {
            if !self.lifecycle.is_running() {
                return Err(ClientError::Interrupted);
            }
            batch.push(record?);
            if batch.len() == max {
                self.flush(conn, &mut batch).await?;
            }
        }

        if !batch.is_empty() {
            self.flush(conn, &mut batch).await?;
        }

        if self.config.batch.confirmation == ConfirmationMode::EndOfRun
            && self.report.batches_sent > 0
        {
            self.await_confirmation(conn).await?;
        }

        self.transition(TransmitState::Finalizing);
        conn.send(OperationCode::Ready, self.config.agency.id.as_bytes())
            .await?;
        tracing::debug!(agency_id = %self.config.agency.id, "READY sent");
        Ok(())
    }

    async fn flush(&mut self, conn: &mut Connection, batch: &mut Vec<BetRecord>) -> Result<()> {
        let payload = encode_batch(batch);
        conn.send(OperationCode::Batch, payload.as_bytes()).await?;

        self.report.batches_sent += 1;
        self.report.bets_sent += batch.len();
        metrics::counter!("agency_batches_sent_total").increment(1);
        metrics::counter!("agency_bets_sent_total").increment(batch.len() as u64);
        tracing::debug!(
            batch = self.report.batches_sent,
            bet_count = batch.len(),
            bytes = payload.len(),
            "Batch sent"
        );
        batch.clear();

        if self.config.batch.confirmation == ConfirmationMode::PerBatch {
            self.await_confirmation(conn).await?;
            self.transition(TransmitState::Sending);
        }
        Ok(())
    }

    async fn await_confirmation(&mut self, conn: &mut Connection) -> Result<()> {
        self.transition(TransmitState::AwaitingConfirmation);
        let frame = conn.receive().await?;
        match frame.opcode {
            OperationCode::Confirmation => {
                self.report.confirmations += 1;
                Ok(())
            }
            other => Err(ClientError::unexpected("CONFIRMATION", other, &frame.payload)),
        }
    }

    fn transition(&mut self, next: TransmitState) {
        tracing::trace!(from = ?self.state, to = ?next, "Transmitter state change");
        self.state = next;
    }
}
