use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time::{timeout, Duration};

use thiserror::Error;

use crate::config::MAX_FRAME_SIZE;
use crate::transport::Transport;

/// Default timeout for network operations (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Framing failures that end a connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("Frame too large: more than {limit} bytes")]
    TooLarge { limit: usize },
    #[error("Connection closed by peer")]
    Closed,
}

/// Newline-delimited JSON over TCP.
pub struct TcpTransport {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    timeout_duration: Duration,
    max_frame_size: usize,
}

fn map_io_error(e: std::io::Error) -> anyhow::Error {
    match e.kind() {
        std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::BrokenPipe => {
            FrameError::Closed.into()
        }
        std::io::ErrorKind::ConnectionReset => anyhow::anyhow!("Connection reset by peer"),
        _ => anyhow::anyhow!("I/O error: {}", e),
    }
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Self {
        Self::with_config(stream, DEFAULT_TIMEOUT, MAX_FRAME_SIZE)
    }

    pub fn with_timeout(stream: TcpStream, timeout_duration: Duration) -> Self {
        Self::with_config(stream, timeout_duration, MAX_FRAME_SIZE)
    }

    pub fn with_config(stream: TcpStream, timeout_duration: Duration, max_frame_size: usize) -> Self {
        let (read_half, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer,
            timeout_duration,
            max_frame_size,
        }
    }

    pub async fn connect<A: ToSocketAddrs>(addr: A) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream))
    }

    async fn read_frame(&mut self) -> anyhow::Result<String> {
        loop {
            let mut buf = Vec::new();
            let limit = self.max_frame_size as u64 + 1;
            let n = (&mut self.reader)
                .take(limit)
                .read_until(b'\n', &mut buf)
                .await
                .map_err(map_io_error)?;
            if n == 0 {
                return Err(FrameError::Closed.into());
            }
            if buf.last() != Some(&b'\n') {
                if buf.len() > self.max_frame_size {
                    return Err(FrameError::TooLarge {
                        limit: self.max_frame_size,
                    }
                    .into());
                }
                return Err(FrameError::Closed.into());
            }
            while matches!(buf.last(), Some(b'\n' | b'\r')) {
                buf.pop();
            }
            if buf.is_empty() {
                continue;
            }
            // Invalid UTF-8 is passed on lossily and rejected as JSON upstream.
            return Ok(String::from_utf8(buf)
                .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()));
        }
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, frame: &str) -> anyhow::Result<()> {
        if frame.len() > self.max_frame_size {
            return Err(anyhow::anyhow!(
                "Frame too large: {} bytes (max: {})",
                frame.len(),
                self.max_frame_size
            ));
        }
        if frame.contains('\n') {
            return Err(anyhow::anyhow!("Frame contains a newline"));
        }

        let send_op = async {
            self.writer.write_all(frame.as_bytes()).await.map_err(map_io_error)?;
            self.writer.write_all(b"\n").await.map_err(map_io_error)?;
            self.writer.flush().await.map_err(map_io_error)?;
            anyhow::Ok(())
        };

        timeout(self.timeout_duration, send_op)
            .await
            .map_err(|_| anyhow::anyhow!("Send timeout after {:?}", self.timeout_duration))?
    }

    async fn recv(&mut self) -> anyhow::Result<String> {
        let duration = self.timeout_duration;
        timeout(duration, self.read_frame())
            .await
            .map_err(|_| anyhow::anyhow!("Receive timeout after {:?}", duration))?
    }
}
