//! Consensus engine subscription: newline-delimited JSON over TCP.
//!
//! The daemon sends a resume request, receives an acceptance line, then
//! one `ConsensusChange` per line. Every fully-projected change is
//! acknowledged back; the engine re-emits unacknowledged changes after
//! a reconnect.

use std::fmt;

use quartz_primitives::{ConsensusChange, ConsensusChangeId};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

#[derive(Debug)]
pub enum SubscribeError {
    Io(std::io::Error),
    Protocol(String),
    /// The engine no longer retains the requested resume id.
    Rejected(String),
}

impl fmt::Display for SubscribeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscribeError::Io(err) => write!(f, "{err}"),
            SubscribeError::Protocol(message) => write!(f, "{message}"),
            SubscribeError::Rejected(message) => write!(f, "subscription rejected: {message}"),
        }
    }
}

impl std::error::Error for SubscribeError {}

impl From<std::io::Error> for SubscribeError {
    fn from(err: std::io::Error) -> Self {
        SubscribeError::Io(err)
    }
}

#[derive(Serialize)]
struct SubscribeRequest {
    #[serde(rename = "resumefrom")]
    resume_from: ConsensusChangeId,
}

#[derive(Deserialize)]
struct SubscribeResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct Acknowledgement {
    ack: ConsensusChangeId,
}

pub struct ConsensusSubscription {
    reader: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl ConsensusSubscription {
    pub async fn connect(
        addr: &str,
        resume_from: ConsensusChangeId,
    ) -> Result<Self, SubscribeError> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, mut writer) = stream.into_split();
        let mut reader = BufReader::new(read_half).lines();

        let request = serde_json::to_string(&SubscribeRequest { resume_from })
            .map_err(|err| SubscribeError::Protocol(err.to_string()))?;
        writer.write_all(request.as_bytes()).await?;
        writer.write_all(b"\n").await?;

        let line = reader.next_line().await?.ok_or_else(|| {
            SubscribeError::Protocol("connection closed before subscribe response".to_string())
        })?;
        let response: SubscribeResponse = serde_json::from_str(&line)
            .map_err(|err| SubscribeError::Protocol(format!("invalid subscribe response: {err}")))?;
        if !response.ok {
            return Err(SubscribeError::Rejected(
                response
                    .error
                    .unwrap_or_else(|| "no reason given".to_string()),
            ));
        }

        Ok(Self { reader, writer })
    }

    /// The next change, or `None` once the engine closes the stream.
    pub async fn next_change(&mut self) -> Result<Option<ConsensusChange>, SubscribeError> {
        loop {
            let Some(line) = self.reader.next_line().await? else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            return serde_json::from_str(&line).map(Some).map_err(|err| {
                SubscribeError::Protocol(format!("invalid consensus change: {err}"))
            });
        }
    }

    pub async fn acknowledge(&mut self, id: ConsensusChangeId) -> Result<(), SubscribeError> {
        let line = serde_json::to_string(&Acknowledgement { ack: id })
            .map_err(|err| SubscribeError::Protocol(err.to_string()))?;
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        Ok(())
    }

    pub async fn unsubscribe(mut self) {
        let _ = self.writer.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quartz_primitives::Block;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn subscribe_stream_and_acknowledge() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();

        let change = ConsensusChange {
            id: ConsensusChangeId([7u8; 32]),
            reverted_blocks: Vec::new(),
            applied_blocks: vec![Block {
                parent_id: [0u8; 32],
                timestamp: 1_600_000_000,
                miner_payouts: Vec::new(),
                transactions: Vec::new(),
            }],
        };
        let change_line = serde_json::to_string(&change).expect("encode change");

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let (read_half, mut write_half) = stream.split();
            let mut lines = BufReader::new(read_half).lines();

            let request = lines.next_line().await.expect("read").expect("request");
            assert!(request.contains("resumefrom"));

            write_half
                .write_all(b"{\"ok\": true}\n")
                .await
                .expect("ack subscribe");
            write_half
                .write_all(format!("{change_line}\n").as_bytes())
                .await
                .expect("send change");

            let ack = lines.next_line().await.expect("read").expect("ack");
            assert!(ack.contains(&ConsensusChangeId([7u8; 32]).hex()));
        });

        let mut subscription =
            ConsensusSubscription::connect(&addr, ConsensusChangeId::beginning())
                .await
                .expect("connect");
        let received = subscription
            .next_change()
            .await
            .expect("next change")
            .expect("some change");
        assert_eq!(received, change);
        subscription
            .acknowledge(received.id)
            .await
            .expect("acknowledge");

        server.await.expect("server");
    }

    #[tokio::test]
    async fn rejected_resume_id_fails_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let mut request = vec![0u8; 256];
            let _ = stream.read(&mut request).await.expect("read");
            stream
                .write_all(b"{\"ok\": false, \"error\": \"unknown change id\"}\n")
                .await
                .expect("reject");
        });

        let result =
            ConsensusSubscription::connect(&addr, ConsensusChangeId([9u8; 32])).await;
        assert!(matches!(result, Err(SubscribeError::Rejected(_))));
        server.await.expect("server");
    }
}
