/// Domain values carried by the lottery protocol
///
/// Payload text is plain UTF-8 using the separators in `constants`; these
/// helpers are the only place that knows the field order.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::*;
use crate::errors::{FramingError, ValidationError};

/// One-byte tag identifying the meaning of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OperationCode {
    /// Legacy single bet submission
    Bet = 1,
    Confirmation = 2,
    Error = 3,
    Batch = 4,
    /// Agency has no more batches to send
    Ready = 5,
    WinnersQuery = 6,
    /// Draw has not happened yet, ask again later
    NotReady = 7,
    Winners = 8,
}

impl OperationCode {
    pub const ALL: [OperationCode; 8] = [
        OperationCode::Bet,
        OperationCode::Confirmation,
        OperationCode::Error,
        OperationCode::Batch,
        OperationCode::Ready,
        OperationCode::WinnersQuery,
        OperationCode::NotReady,
        OperationCode::Winners,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for OperationCode {
    type Error = FramingError;

    fn try_from(value: u8) -> Result<Self, FramingError> {
        OperationCode::ALL
            .into_iter()
            .find(|op| op.as_u8() == value)
            .ok_or(FramingError::UnknownOpcode(value))
    }
}

impl fmt::Display for OperationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationCode::Bet => "BET",
            OperationCode::Confirmation => "CONFIRMATION",
            OperationCode::Error => "ERROR",
            OperationCode::Batch => "BATCH",
            OperationCode::Ready => "READY",
            OperationCode::WinnersQuery => "WINNERS_QUERY",
            OperationCode::NotReady => "NOT_READY",
            OperationCode::Winners => "WINNERS",
        };
        f.write_str(name)
    }
}

/// A single bettor's entry as submitted by an agency.
///
/// Every field is opaque text; the server owns any semantic validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetRecord {
    pub agency: String,
    pub first_name: String,
    pub last_name: String,
    pub document: String,
    pub birthdate: String,
    pub number: String,
}

impl BetRecord {
    pub fn new(
        agency: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        document: impl Into<String>,
        birthdate: impl Into<String>,
        number: impl Into<String>,
    ) -> Self {
        Self {
            agency: agency.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            document: document.into(),
            birthdate: birthdate.into(),
            number: number.into(),
        }
    }

    /// Build a record from already split fields, agency first.
    pub fn from_fields(fields: &[&str]) -> Result<Self, ValidationError> {
        match fields {
            [agency, first_name, last_name, document, birthdate, number] => Ok(Self::new(
                *agency, *first_name, *last_name, *document, *birthdate, *number,
            )),
            _ => Err(ValidationError::FieldCount {
                found: fields.len(),
                expected: BET_FIELD_COUNT,
            }),
        }
    }

    /// Encode as `agency,name,lastname,document,birthdate,number`.
    pub fn to_payload(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BetRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = FIELD_SEPARATOR;
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}{sep}{}{sep}{}",
            self.agency, self.first_name, self.last_name, self.document, self.birthdate, self.number
        )
    }
}

/// Encode a group of records as one BATCH payload (no trailing separator).
pub fn encode_batch(records: &[BetRecord]) -> String {
    let mut payload = String::new();
    for (idx, record) in records.iter().enumerate() {
        if idx > 0 {
            payload.push(RECORD_SEPARATOR);
        }
        payload.push_str(&record.to_payload());
    }
    payload
}

/// Parse a BATCH payload back into records.
pub fn decode_batch(payload: &str) -> Result<Vec<BetRecord>, ValidationError> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }
    payload
        .split(RECORD_SEPARATOR)
        .map(|raw| {
            let fields: Vec<&str> = raw.split(FIELD_SEPARATOR).collect();
            BetRecord::from_fields(&fields)
        })
        .collect()
}

/// Split a WINNERS payload into identifiers. An empty payload means no winners.
pub fn parse_winners(payload: &str) -> Vec<String> {
    if payload.is_empty() {
        return Vec::new();
    }
    payload
        .split(WINNER_SEPARATOR)
        .map(|id| id.to_string())
        .collect()
}
