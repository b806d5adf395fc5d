//! Bet record sources
//!
//! The transmitter consumes any `IntoIterator<Item = Result<BetRecord, SourceError>>`.
//! Two sources ship with the agency: a per-agency bets file and a single bet
//! described by environment variables.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use protocol::BetRecord;

/// Fields per line in an agency bets file (the agency id is not stored in the file).
const FILE_FIELD_COUNT: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read bets: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: expected {expected} fields, found {found}")]
    Malformed {
        line: usize,
        found: usize,
        expected: usize,
    },
}

/// Reads `name,lastname,document,birthdate,number` lines and tags each bet
/// with the agency id.
pub struct CsvBetSource<R> {
    agency: String,
    lines: io::Lines<R>,
    line_no: usize,
}

impl CsvBetSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>, agency: impl Into<String>) -> Result<Self, SourceError> {
        let file = File::open(path.as_ref())?;
        Ok(Self::new(BufReader::new(file), agency))
    }
}

impl<R: BufRead> CsvBetSource<R> {
    pub fn new(reader: R, agency: impl Into<String>) -> Self {
        Self {
            agency: agency.into(),
            lines: reader.lines(),
            line_no: 0,
        }
    }

    fn parse_line(&self, line: &str) -> Result<BetRecord, SourceError> {
        let fields: Vec<&str> = line.split(protocol::FIELD_SEPARATOR).collect();
        match fields.as_slice() {
            [first_name, last_name, document, birthdate, number] => Ok(BetRecord::new(
                self.agency.as_str(),
                *first_name,
                *last_name,
                *document,
                *birthdate,
                *number,
            )),
            _ => Err(SourceError::Malformed {
                line: self.line_no,
                found: fields.len(),
                expected: FILE_FIELD_COUNT,
            }),
        }
    }
}

impl<R: BufRead> Iterator for CsvBetSource<R> {
    type Item = Result<BetRecord, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;

            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            return Some(self.parse_line(line));
        }
    }
}

/// Build a single bet from `BET_NAME`, `BET_LASTNAME`, `BET_DOCUMENT`,
/// `BET_BIRTHDATE` and `BET_NUMBER`. Returns `None` if any of them is missing.
pub fn env_bet<F>(agency: &str, lookup: F) -> Option<BetRecord>
where
    F: Fn(&str) -> Option<String>,
{
    Some(BetRecord::new(
        agency,
        lookup("BET_NAME")?,
        lookup("BET_LASTNAME")?,
        lookup("BET_DOCUMENT")?,
        lookup("BET_BIRTHDATE")?,
        lookup("BET_NUMBER")?,
    ))
}
