//! A client-side PDU transport: connects to an agent or master's listen
//! address, sends one PDU, and waits for the reply (spec §5, "client-side
//! request/reply uses wall-clock ms").

use std::net::SocketAddr;
use std::time::Duration;

use concord_api::{wire, Pdu};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

#[derive(Debug)]
pub enum ClientError {
    Unreachable(std::io::Error),
    Timeout,
    Protocol(concord_api::ApiError),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Unreachable(e) => write!(f, "could not reach master: {e}"),
            ClientError::Timeout => write!(f, "timed out waiting for a reply"),
            ClientError::Protocol(e) => write!(f, "protocol error: {e}"),
        }
    }
}

pub struct PduClient {
    stream: TcpStream,
}

impl PduClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await.map_err(ClientError::Unreachable)?;
        Ok(Self { stream })
    }

    pub async fn request(&mut self, pdu: &Pdu, timeout_ms: u64) -> Result<Pdu, ClientError> {
        let bytes = wire::encode_pdu(pdu);
        self.stream.write_all(&bytes).await.map_err(ClientError::Unreachable)?;

        let reply = timeout(Duration::from_millis(timeout_ms), self.read_one_pdu())
            .await
            .map_err(|_| ClientError::Timeout)??;
        Ok(reply)
    }

    async fn read_one_pdu(&mut self) -> Result<Pdu, ClientError> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            if let Some((pdu, _consumed)) = wire::decode_pdu(&buf, false).map_err(ClientError::Protocol)? {
                return Ok(pdu);
            }
            let n = self
                .stream
                .read(&mut chunk)
                .await
                .map_err(ClientError::Unreachable)?;
            if n == 0 {
                return Err(ClientError::Unreachable(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed before a full PDU arrived",
                )));
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }
}
