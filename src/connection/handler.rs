//! Connection Handler Module
//!
//! This module handles individual client connections to the ledger.
//! Each client gets its own handler task that runs in a loop,
//! reading request lines and sending reply lines.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read bytes from socket  │ │ <── idle timeout
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Split off one line      │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Execute (blocking pool) │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Send reply line         │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects / idle timeout / error
//!        │
//!        ▼
//! 5. Handler task ends
//! ```
//!
//! ## Ordering
//!
//! A line is fully executed and answered before the next line is looked at,
//! so replies come back in request order. Several lines arriving in one TCP
//! packet are answered one by one.

use crate::commands::CommandHandler;
use crate::protocol::types::UNKNOWN_ACTION;
use crate::protocol::Reply;
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, error, info, trace, warn};

/// Maximum length of a single request line (64 KB)
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Default time a connection may sit idle between requests
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Per-connection limits.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionConfig {
    /// Close the connection after this long without a complete request
    pub idle_timeout: Duration,
    /// Reject lines longer than this many bytes
    pub max_line_length: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_line_length: MAX_LINE_LENGTH,
        }
    }
}

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total requests processed
    pub requests_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn request_processed(&self) {
        self.requests_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
///
/// This struct manages the read buffer, line framing, and reply sending
/// for one connected client. It works over any byte stream; the server
/// uses it with a `TcpStream`.
pub struct ConnectionHandler<S> {
    /// The stream for this connection
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// The command handler (shared store across connections)
    command_handler: CommandHandler,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,

    config: ConnectionConfig,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The byte stream for this connection
    /// * `addr` - The client's socket address
    /// * `command_handler` - The command handler for executing requests
    /// * `stats` - Shared connection statistics
    /// * `config` - Idle timeout and line limits
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
        config: ConnectionConfig,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            stats,
            config,
        }
    }

    /// Runs the main connection loop.
    ///
    /// This method reads request lines from the client, executes them,
    /// and sends back replies until the client disconnects, goes idle,
    /// or an error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::IdleTimeout(after) => {
                    debug!(client = %self.addr, idle = ?after, "Closing idle connection")
                }
                ConnectionError::IoError(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            // Answer every complete line already buffered
            while let Some(line) = self.try_take_line()? {
                self.respond(line).await?;
            }

            if !self.read_more_data().await? {
                // Peer closed; a final line may lack its newline
                if !self.buffer.is_empty() {
                    self.check_line_length(self.buffer.len())?;
                    let rest = self.buffer.split();
                    let line = decode_line(&rest);
                    self.respond(line).await?;
                }
                return Err(ConnectionError::ClientDisconnected);
            }
        }
    }

    /// Splits one complete line off the front of the buffer.
    fn try_take_line(&mut self) -> Result<Option<String>, ConnectionError> {
        let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') else {
            return Ok(None);
        };
        self.check_line_length(pos)?;

        let raw = self.buffer.split_to(pos + 1);
        let line = decode_line(&raw[..pos]);

        trace!(
            client = %self.addr,
            consumed = pos + 1,
            remaining = self.buffer.len(),
            "Framed request line"
        );
        Ok(Some(line))
    }

    /// Rejects a line whose content exceeds the configured limit.
    fn check_line_length(&self, len: usize) -> Result<(), ConnectionError> {
        if len > self.config.max_line_length {
            error!(client = %self.addr, size = len, "Request line too long");
            return Err(ConnectionError::LineTooLong(self.config.max_line_length));
        }
        Ok(())
    }

    /// Executes a line and writes its reply.
    async fn respond(&mut self, line: String) -> Result<(), ConnectionError> {
        let reply = self.execute(line).await;
        self.stats.request_processed();
        self.send_reply(&reply).await
    }

    /// Runs the command handler on the blocking pool; storage calls block.
    async fn execute(&self, line: String) -> Reply {
        let handler = self.command_handler.clone();

        match tokio::task::spawn_blocking(move || handler.execute(&line)).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(client = %self.addr, error = %e, "Request task failed");
                Reply::failure(UNKNOWN_ACTION, format!("processing error: {}", e))
            }
        }
    }

    /// Reads more data from the stream into the buffer.
    ///
    /// Returns `Ok(false)` when the peer has closed its side.
    async fn read_more_data(&mut self) -> Result<bool, ConnectionError> {
        // Everything buffered here belongs to one unterminated line
        self.check_line_length(self.buffer.len())?;

        // Ensure we have some capacity
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let read = self.stream.get_mut().read_buf(&mut self.buffer);
        let n = tokio::time::timeout(self.config.idle_timeout, read)
            .await
            .map_err(|_| ConnectionError::IdleTimeout(self.config.idle_timeout))??;

        if n == 0 {
            return Ok(false);
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(true)
    }

    /// Sends a reply line to the client.
    async fn send_reply(&mut self, reply: &Reply) -> Result<(), ConnectionError> {
        let mut line = reply.serialize();
        line.push('\n');

        self.stream.write_all(line.as_bytes()).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(line.len());
        trace!(
            client = %self.addr,
            bytes = line.len(),
            "Sent reply"
        );
        Ok(())
    }
}

/// Decodes a raw line, dropping a trailing `\r`. Invalid UTF-8 is replaced
/// rather than rejected so the client still gets a reply.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// No complete request arrived within the idle timeout
    #[error("Idle for {0:?}")]
    IdleTimeout(Duration),

    /// A line exceeded the length limit
    #[error("Request line exceeds {0} bytes")]
    LineTooLong(usize),
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion.
///
/// # Arguments
///
/// * `stream` - The TCP stream for this connection
/// * `addr` - The client's socket address
/// * `command_handler` - The command handler for executing requests
/// * `stats` - Shared connection statistics
/// * `config` - Idle timeout and line limits
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    config: ConnectionConfig,
) {
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats, config);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected | ConnectionError::IdleTimeout(_) => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{StorageConfig, StorageEngine};
    use tempfile::TempDir;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    fn create_command_handler() -> (TempDir, CommandHandler) {
        let dir = tempfile::tempdir().unwrap();
        let engine = StorageEngine::new(StorageConfig::new(dir.path().join("ledger.db")));
        engine.initialize().unwrap();
        (dir, CommandHandler::new(Arc::new(engine)))
    }

    async fn create_test_server(
        config: ConnectionConfig,
    ) -> (SocketAddr, TempDir, Arc<ConnectionStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (dir, command_handler) = create_command_handler();
        let stats = Arc::new(ConnectionStats::new());

        let stats_clone = Arc::clone(&stats);

        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let handler = command_handler.clone();
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(stream, client_addr, handler, stats, config));
            }
        });

        (addr, dir, stats)
    }

    fn test_addr() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let (addr, _dir, _) = create_test_server(ConnectionConfig::default()).await;

        let (reader, mut writer) = TcpStream::connect(addr).await.unwrap().into_split();
        let mut lines = BufReader::new(reader).lines();

        writer
            .write_all(b"alice,add,50.0,2023-10-27,expense,Lunch,Sandwich\n")
            .await
            .unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "add~1~null~null");

        writer.write_all(b"alice,list\n").await.unwrap();
        let reply = lines.next_line().await.unwrap().unwrap();
        assert!(reply.starts_with("list~1~null~"));
        assert!(reply.ends_with(",alice,50.0,expense,2023-10-27,Lunch,Sandwich"));
    }

    #[tokio::test]
    async fn test_empty_line_gets_reply() {
        let (addr, _dir, _) = create_test_server(ConnectionConfig::default()).await;

        let (reader, mut writer) = TcpStream::connect(addr).await.unwrap().into_split();
        let mut lines = BufReader::new(reader).lines();

        writer.write_all(b"\r\n").await.unwrap();
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "unknown~0~empty request~null"
        );
    }

    #[tokio::test]
    async fn test_pipelined_lines_answered_in_order() {
        let (addr, _dir, _) = create_test_server(ConnectionConfig::default()).await;

        let (reader, mut writer) = TcpStream::connect(addr).await.unwrap().into_split();
        let mut lines = BufReader::new(reader).lines();

        writer
            .write_all(b"bob,add,1,2023-01-01\r\nbob,add,2,2023-01-02\nbob,clear\nbob,delete,abc\n")
            .await
            .unwrap();

        assert_eq!(lines.next_line().await.unwrap().unwrap(), "add~1~null~null");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "add~1~null~null");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "clear~1~2~null");
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "delete~0~invalid record id~null"
        );
    }

    #[tokio::test]
    async fn test_unterminated_final_line() {
        let (addr, _dir, _) = create_test_server(ConnectionConfig::default()).await;

        let (reader, mut writer) = TcpStream::connect(addr).await.unwrap().into_split();
        let mut lines = BufReader::new(reader).lines();

        writer.write_all(b"carol,list").await.unwrap();
        writer.shutdown().await.unwrap();

        assert_eq!(lines.next_line().await.unwrap().unwrap(), "list~1~null~null");
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_idle_connection_is_closed() {
        let config = ConnectionConfig {
            idle_timeout: Duration::from_millis(100),
            ..ConnectionConfig::default()
        };
        let (addr, _dir, stats) = create_test_server(config).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        let mut buf = [0u8; 16];
        let n = tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf))
            .await
            .expect("server should close the idle connection")
            .unwrap();
        assert_eq!(n, 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, _dir, stats) = create_test_server(ConnectionConfig::default()).await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        let (reader, mut writer) = TcpStream::connect(addr).await.unwrap().into_split();
        let mut lines = BufReader::new(reader).lines();

        // Give the server time to accept the connection
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);

        writer.write_all(b"dave,list\n").await.unwrap();
        let _ = lines.next_line().await.unwrap();

        assert!(stats.requests_processed.load(Ordering::Relaxed) >= 1);
        assert!(stats.bytes_read.load(Ordering::Relaxed) > 0);
        assert!(stats.bytes_written.load(Ordering::Relaxed) > 0);

        // Close connection
        drop(writer);
        drop(lines);

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_scripted_stream() {
        let (_dir, command_handler) = create_command_handler();
        let stream = tokio_test::io::Builder::new()
            .read(b"erin,register,pw\nerin,login,pw\n")
            .write(b"register~1~null~null\n")
            .write(b"login~1~null~null\n")
            .build();

        let handler = ConnectionHandler::new(
            stream,
            test_addr(),
            command_handler,
            Arc::new(ConnectionStats::new()),
            ConnectionConfig::default(),
        );
        assert!(matches!(
            handler.run().await,
            Err(ConnectionError::ClientDisconnected)
        ));
    }

    #[tokio::test]
    async fn test_line_too_long() {
        let (_dir, command_handler) = create_command_handler();
        let stream = tokio_test::io::Builder::new().read(&[b'x'; 32]).build();

        let config = ConnectionConfig {
            max_line_length: 16,
            ..ConnectionConfig::default()
        };
        let handler = ConnectionHandler::new(
            stream,
            test_addr(),
            command_handler,
            Arc::new(ConnectionStats::new()),
            config,
        );
        assert!(matches!(
            handler.run().await,
            Err(ConnectionError::LineTooLong(16))
        ));
    }

    #[tokio::test]
    async fn test_line_too_long_in_single_read() {
        let (_dir, command_handler) = create_command_handler();
        let mut data = vec![b'x'; 32];
        data.push(b'\n');
        let stream = tokio_test::io::Builder::new().read(&data).build();

        let config = ConnectionConfig {
            max_line_length: 16,
            ..ConnectionConfig::default()
        };
        let handler = ConnectionHandler::new(
            stream,
            test_addr(),
            command_handler,
            Arc::new(ConnectionStats::new()),
            config,
        );
        assert!(matches!(
            handler.run().await,
            Err(ConnectionError::LineTooLong(16))
        ));
    }

    #[tokio::test]
    async fn test_line_at_limit_is_accepted() {
        let (_dir, command_handler) = create_command_handler();
        let stream = tokio_test::io::Builder::new()
            .read(b"alice,list\r\n")
            .write(b"list~1~null~null\n")
            .build();

        let config = ConnectionConfig {
            max_line_length: "alice,list\r".len(),
            ..ConnectionConfig::default()
        };
        let handler = ConnectionHandler::new(
            stream,
            test_addr(),
            command_handler,
            Arc::new(ConnectionStats::new()),
            config,
        );
        assert!(matches!(
            handler.run().await,
            Err(ConnectionError::ClientDisconnected)
        ));
    }

    #[tokio::test]
    async fn test_invalid_utf8_still_answered() {
        let (_dir, command_handler) = create_command_handler();
        let stream = tokio_test::io::Builder::new()
            .read(b"\xff,list\n")
            .write(b"list~1~null~null\n")
            .read(b"bob,\xfe\n")
            .write("unknown~0~unknown action: \u{FFFD}~null\n".as_bytes())
            .build();

        let handler = ConnectionHandler::new(
            stream,
            test_addr(),
            command_handler,
            Arc::new(ConnectionStats::new()),
            ConnectionConfig::default(),
        );
        assert!(matches!(
            handler.run().await,
            Err(ConnectionError::ClientDisconnected)
        ));
    }
}
