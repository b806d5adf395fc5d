use anyhow::{bail, Context};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use protocol::MAX_PAYLOAD_LEN;

#[derive(Debug, Clone)]
pub struct Config {
    pub agency: AgencyConfig,
    pub server: ServerConfig,
    pub batch: BatchConfig,
    pub poll: PollConfig,
}

#[derive(Debug, Clone)]
pub struct AgencyConfig {
    /// Session identifier sent with READY and WINNERS_QUERY
    pub id: String,
    pub data_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: String,
    pub connect_timeout: Duration,
    pub max_payload_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub max_amount: usize,
    pub confirmation: ConfirmationMode,
}

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    pub max_attempts: Option<u32>,
}

/// When the agency waits for the server to acknowledge batches.
///
/// Not negotiated on the wire: the server must be deployed with the same mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationMode {
    /// One CONFIRMATION after every BATCH
    PerBatch,
    /// A single CONFIRMATION after the last BATCH
    EndOfRun,
}

impl FromStr for ConfirmationMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_batch" | "per-batch" => Ok(ConfirmationMode::PerBatch),
            "end_of_run" | "end-of-run" => Ok(ConfirmationMode::EndOfRun),
            other => bail!("unknown confirmation mode '{}'", other),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (environment, map in tests).
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let id = lookup("CLI_ID").context("CLI_ID must be set")?;
        if id.trim().is_empty() {
            bail!("CLI_ID must not be empty");
        }

        let max_amount: usize = parse(&get("CLI_BATCH_MAXAMOUNT", "50"), "CLI_BATCH_MAXAMOUNT")?;
        if max_amount == 0 {
            bail!("CLI_BATCH_MAXAMOUNT must be greater than zero");
        }

        let multiplier: f64 = parse(&get("CLI_POLL_MULTIPLIER", "1.0"), "CLI_POLL_MULTIPLIER")?;
        if multiplier.is_nan() || multiplier < 1.0 {
            bail!("CLI_POLL_MULTIPLIER must be at least 1.0");
        }

        let max_attempts = match lookup("CLI_POLL_MAX_ATTEMPTS") {
            Some(raw) => Some(parse::<u32>(&raw, "CLI_POLL_MAX_ATTEMPTS")?),
            None => None,
        };
        if max_attempts == Some(0) {
            bail!("CLI_POLL_MAX_ATTEMPTS must be greater than zero");
        }

        let connect_timeout =
            millis(&get("CLI_CONNECT_TIMEOUT_MS", "5000"), "CLI_CONNECT_TIMEOUT_MS")?;
        let max_interval =
            millis(&get("CLI_POLL_MAX_INTERVAL_MS", "30000"), "CLI_POLL_MAX_INTERVAL_MS")?;

        Ok(Config {
            agency: AgencyConfig {
                id,
                data_path: lookup("CLI_DATA_PATH").map(PathBuf::from),
            },
            server: ServerConfig {
                address: get("CLI_SERVER_ADDRESS", "server:12345"),
                connect_timeout,
                max_payload_bytes: match lookup("CLI_MAX_PAYLOAD_BYTES") {
                    Some(raw) => parse(&raw, "CLI_MAX_PAYLOAD_BYTES")?,
                    None => MAX_PAYLOAD_LEN,
                },
            },
            batch: BatchConfig {
                max_amount,
                confirmation: get("CLI_CONFIRMATION_MODE", "per_batch").parse()?,
            },
            poll: PollConfig {
                interval: millis(&get("CLI_POLL_INTERVAL_MS", "1000"), "CLI_POLL_INTERVAL_MS")?,
                max_interval,
                multiplier,
                max_attempts,
            },
        })
    }
}

fn parse<T>(raw: &str, key: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("invalid value '{}' for {}", raw, key))
}

fn millis(raw: &str, key: &str) -> anyhow::Result<Duration> {
    parse::<u64>(raw, key).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[("CLI_ID", "1")])).unwrap();

        assert_eq!(config.agency.id, "1");
        assert_eq!(config.agency.data_path, None);
        assert_eq!(config.server.address, "server:12345");
        assert_eq!(config.server.max_payload_bytes, MAX_PAYLOAD_LEN);
        assert_eq!(config.batch.max_amount, 50);
        assert_eq!(config.batch.confirmation, ConfirmationMode::PerBatch);
        assert_eq!(config.poll.interval, Duration::from_secs(1));
        assert_eq!(config.poll.multiplier, 1.0);
        assert_eq!(config.poll.max_attempts, None);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("CLI_ID", "3"),
            ("CLI_SERVER_ADDRESS", "127.0.0.1:9000"),
            ("CLI_BATCH_MAXAMOUNT", "7"),
            ("CLI_CONFIRMATION_MODE", "end_of_run"),
            ("CLI_POLL_INTERVAL_MS", "250"),
            ("CLI_POLL_MULTIPLIER", "2"),
            ("CLI_POLL_MAX_ATTEMPTS", "10"),
            ("CLI_DATA_PATH", "/data/agency-3.csv"),
        ]))
        .unwrap();

        assert_eq!(config.server.address, "127.0.0.1:9000");
        assert_eq!(config.batch.max_amount, 7);
        assert_eq!(config.batch.confirmation, ConfirmationMode::EndOfRun);
        assert_eq!(config.poll.interval, Duration::from_millis(250));
        assert_eq!(config.poll.multiplier, 2.0);
        assert_eq!(config.poll.max_attempts, Some(10));
        assert_eq!(
            config.agency.data_path,
            Some(PathBuf::from("/data/agency-3.csv"))
        );
    }

    #[test]
    fn test_missing_id_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("CLI_ID"));
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("CLI_ID", "1"),
            ("CLI_BATCH_MAXAMOUNT", "0"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("CLI_BATCH_MAXAMOUNT"));
    }

    #[test]
    fn test_zero_attempt_cap_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("CLI_ID", "1"),
            ("CLI_POLL_MAX_ATTEMPTS", "0"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("CLI_POLL_MAX_ATTEMPTS"));

        let config = Config::from_lookup(lookup_from(&[
            ("CLI_ID", "1"),
            ("CLI_POLL_MAX_ATTEMPTS", "1"),
        ]))
        .unwrap();
        assert_eq!(config.poll.max_attempts, Some(1));
    }

    #[test]
    fn test_invalid_number_names_the_key() {
        let err = Config::from_lookup(lookup_from(&[
            ("CLI_ID", "1"),
            ("CLI_POLL_INTERVAL_MS", "soon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("CLI_POLL_INTERVAL_MS"));
    }

    #[test]
    fn test_confirmation_mode_parsing() {
        assert_eq!(
            "PER_BATCH".parse::<ConfirmationMode>().unwrap(),
            ConfirmationMode::PerBatch
        );
        assert_eq!(
            "end-of-run".parse::<ConfirmationMode>().unwrap(),
            ConfirmationMode::EndOfRun
        );
        assert!("sometimes".parse::<ConfirmationMode>().is_err());
    }
}
