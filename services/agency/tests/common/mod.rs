#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use agency::{Config, ConfirmationMode, Lifecycle, SourceError};
use protocol::{codec, BetRecord, Frame, OperationCode};

pub const AGENCY_ID: &str = "1";

pub async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    (listener, address)
}

/// Config pointing at `address` with a short poll interval; `extra` overrides keys.
pub fn test_config(address: &str, extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = [
        ("CLI_ID", AGENCY_ID),
        ("CLI_SERVER_ADDRESS", address),
        ("CLI_CONNECT_TIMEOUT_MS", "2000"),
        ("CLI_POLL_INTERVAL_MS", "20"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

pub fn lifecycle(config: &Config) -> Lifecycle {
    Lifecycle::new(config.server.connect_timeout, config.server.max_payload_bytes)
}

pub fn bet(n: usize) -> BetRecord {
    BetRecord::new(
        AGENCY_ID,
        format!("Name{}", n),
        format!("Last{}", n),
        format!("{}", 30_000_000 + n),
        "1999-03-17",
        format!("{}", n),
    )
}

pub fn records(n: usize) -> Vec<Result<BetRecord, SourceError>> {
    (0..n).map(|i| Ok(bet(i))).collect()
}

pub async fn send(socket: &mut TcpStream, opcode: OperationCode, payload: &str) {
    let bytes = Frame::new(opcode, payload.as_bytes()).encode().unwrap();
    codec::write_all(socket, &bytes).await.unwrap();
}

pub async fn recv(socket: &mut TcpStream) -> Frame {
    tokio::time::timeout(Duration::from_secs(5), codec::decode(socket))
        .await
        .expect("client went silent")
        .unwrap()
}

/// Accept one transmission connection and answer it the way a server in
/// `mode` would. Returns every frame read, up to and including READY.
///
/// In end-of-run mode the single CONFIRMATION goes out after `expected_batches`.
pub fn serve_transmission(
    listener: TcpListener,
    mode: ConfirmationMode,
    expected_batches: usize,
) -> JoinHandle<(TcpListener, Vec<Frame>)> {
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut frames = Vec::new();
        let mut batches = 0;

        while let Ok(frame) = codec::decode(&mut socket).await {
            let opcode = frame.opcode;
            frames.push(frame);
            match opcode {
                OperationCode::Batch => {
                    batches += 1;
                    if mode == ConfirmationMode::PerBatch || batches == expected_batches {
                        send(&mut socket, OperationCode::Confirmation, "").await;
                    }
                }
                OperationCode::Bet => send(&mut socket, OperationCode::Confirmation, "").await,
                OperationCode::Ready => break,
                _ => {}
            }
        }
        (listener, frames)
    })
}

/// Answer one WINNERS_QUERY per scripted response, each on its own connection.
/// Returns the queries received.
pub fn serve_polls(
    listener: TcpListener,
    responses: Vec<(OperationCode, &'static str)>,
) -> JoinHandle<Vec<Frame>> {
    tokio::spawn(async move {
        let mut queries = Vec::new();
        for (opcode, payload) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let Ok(query) = codec::decode(&mut socket).await else {
                break;
            };
            queries.push(query);
            let reply = codec::encode(opcode, payload.as_bytes()).unwrap();
            if codec::write_all(&mut socket, &reply).await.is_err() {
                break;
            }
        }
        queries
    })
}
