//! Lottery agency client.
//!
//! Sends an agency's bets to the central server in batches over the framed
//! TCP protocol from the `protocol` crate, then polls until the draw results
//! for the agency are published.

pub mod config;
pub mod connection;
pub mod errors;
pub mod poller;
pub mod retry_strategy;
pub mod session;
pub mod shutdown;
pub mod source;
pub mod transmitter;

pub use config::{Config, ConfirmationMode};
pub use connection::{Connection, Lifecycle, ShutdownHandle};
pub use errors::{ClientError, Result};
pub use poller::{PollOutcome, ResultPoller};
pub use session::{ClientSession, RunOutcome};
pub use source::{env_bet, CsvBetSource, SourceError};
pub use transmitter::{BatchTransmitter, TransmitReport, TransmitState};
