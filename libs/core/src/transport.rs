use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },
    #[error("transport closed")]
    Closed,
    #[error("transport i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Writing half of an open chat session. The connection manager's engine task
/// is the only holder, which makes it the sole transport writer.
#[async_trait]
pub trait LineWriter: Send {
    async fn write_line(&mut self, line: &str) -> Result<(), TransportError>;
}

/// Reading half of an open chat session. `Ok(None)` signals an orderly close.
#[async_trait]
pub trait LineReader: Send {
    async fn read_line(&mut self) -> Result<Option<String>, TransportError>;
}

/// One established bidirectional session, already split so the send and
/// receive loops can run on independent tasks.
pub struct TransportSession {
    pub writer: Box<dyn LineWriter>,
    pub reader: Box<dyn LineReader>,
}

impl std::fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSession").finish_non_exhaustive()
    }
}

/// Abstract line-oriented channel to the chat server. Implementations own
/// socket setup only; framing above a line is the protocol layer's concern.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open(&self, endpoint: &str) -> Result<TransportSession, TransportError>;
}

/// Plain TCP transport speaking newline-delimited text.
#[derive(Debug, Default)]
pub struct TcpTransport;

#[async_trait]
impl ChatTransport for TcpTransport {
    async fn open(&self, endpoint: &str) -> Result<TransportSession, TransportError> {
        let stream = TcpStream::connect(endpoint)
            .await
            .map_err(|source| TransportError::Connect {
                endpoint: endpoint.to_string(),
                source,
            })?;
        let (read_half, write_half) = stream.into_split();
        Ok(TransportSession {
            writer: Box::new(TcpLineWriter { inner: write_half }),
            reader: Box::new(TcpLineReader {
                inner: BufReader::new(read_half).lines(),
            }),
        })
    }
}

struct TcpLineWriter {
    inner: OwnedWriteHalf,
}

#[async_trait]
impl LineWriter for TcpLineWriter {
    async fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        self.inner.write_all(line.as_bytes()).await?;
        self.inner.write_all(b"\r\n").await?;
        self.inner.flush().await?;
        Ok(())
    }
}

struct TcpLineReader {
    inner: tokio::io::Lines<BufReader<OwnedReadHalf>>,
}

#[async_trait]
impl LineReader for TcpLineReader {
    async fn read_line(&mut self) -> Result<Option<String>, TransportError> {
        Ok(self.inner.next_line().await?)
    }
}
