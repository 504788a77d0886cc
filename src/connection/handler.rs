//! Connection Handling
//!
//! Each accepted TCP connection is owned by exactly one task running a
//! read-execute-reply loop:
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  Read bytes from the socket  │
//! └──────────────┬───────────────┘
//!                ▼
//! ┌──────────────────────────────┐
//! │  Frame one request line      │
//! └──────────────┬───────────────┘
//!                ▼
//! ┌──────────────────────────────┐
//! │  Execute against keyspace    │
//! └──────────────┬───────────────┘
//!                ▼
//! ┌──────────────────────────────┐
//! │  Write the reply, loop back  │
//! └──────────────────────────────┘
//! ```
//!
//! TCP is a stream: a read may deliver a partial line or several pipelined
//! lines at once. Incoming bytes accumulate in a `BytesMut` buffer and the
//! loop drains every complete line before reading again, so pipelined
//! requests are answered in receive order on the same connection.
//!
//! Errors are connection-local: a failed read, write, or oversized line
//! closes this connection and nothing else.
//!
//! Each handler keeps its own request/byte tallies and emits them as
//! tracing fields in its disconnect line; the shared [`ServerStats`]
//! gauges only carry what outlives a single connection.

use crate::commands::CommandHandler;
use crate::protocol::{self, ParseError, Reply, Request};
use bytes::{Buf, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Initial capacity of the per-connection read buffer
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Server-wide gauges shared by every connection task.
#[derive(Debug, Default)]
pub struct ServerStats {
    accepted: AtomicU64,
    active: AtomicU64,
    commands: AtomicU64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a client. Returns the active count including it.
    fn client_connected(&self) -> u64 {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Unregisters a client. Returns the active count without it.
    fn client_disconnected(&self) -> u64 {
        self.active.fetch_sub(1, Ordering::Relaxed) - 1
    }

    fn command_executed(&self) {
        self.commands.fetch_add(1, Ordering::Relaxed);
    }

    /// Connections accepted since startup.
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Connections currently open.
    pub fn active(&self) -> u64 {
        self.active.load(Ordering::Relaxed)
    }

    /// Commands executed across all connections since startup.
    pub fn commands(&self) -> u64 {
        self.commands.load(Ordering::Relaxed)
    }
}

/// State for one client connection: the socket, its read buffer, and the
/// shared command handler.
pub struct ConnectionHandler {
    /// Buffered writer over the TCP stream
    stream: BufWriter<TcpStream>,

    /// Client address (for logging)
    addr: SocketAddr,

    /// Accumulates incoming bytes until a full line is present
    buffer: BytesMut,

    /// Executes requests against the shared keyspace
    commands: CommandHandler,

    /// Server-wide gauges
    stats: Arc<ServerStats>,

    /// Requests answered on this connection
    served: u64,

    /// Bytes read from this socket
    bytes_in: u64,

    /// Bytes written to this socket
    bytes_out: u64,
}

impl ConnectionHandler {
    /// Creates a handler owning the given stream.
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        commands: CommandHandler,
        stats: Arc<ServerStats>,
    ) -> Self {
        let active = stats.client_connected();
        info!(client = %addr, active = active, "Client connected");

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            commands,
            stats,
            served: 0,
            bytes_in: 0,
            bytes_out: 0,
        }
    }

    /// Runs the connection to completion.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        let result = self.main_loop().await;

        let active = self.stats.client_disconnected();
        match &result {
            Ok(()) | Err(ConnectionError::ClientDisconnected) => {
                info!(
                    client = %self.addr,
                    served = self.served,
                    bytes_in = self.bytes_in,
                    bytes_out = self.bytes_out,
                    active = active,
                    "Client disconnected"
                );
            }
            Err(ConnectionError::IoError(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(
                    client = %self.addr,
                    served = self.served,
                    "Connection reset by client"
                );
            }
            Err(e) => {
                warn!(
                    client = %self.addr,
                    served = self.served,
                    error = %e,
                    "Connection error"
                );
            }
        }

        result
    }

    /// The read-execute-reply loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            // Drain every complete line already buffered before reading
            // again, so pipelined requests are answered in order.
            while let Some(request) = self.try_parse_request()? {
                let reply = self.commands.execute(&request);
                self.served += 1;
                self.stats.command_executed();
                self.send_reply(&reply).await?;
            }

            self.read_more_data().await?;
        }
    }

    /// Attempts to frame one request line from the buffer.
    fn try_parse_request(&mut self) -> Result<Option<Request>, ConnectionError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match protocol::parse(&self.buffer)? {
            Some((request, consumed)) => {
                self.buffer.advance(consumed);
                trace!(
                    client = %self.addr,
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Parsed request"
                );
                Ok(Some(request))
            }
            None => {
                trace!(
                    client = %self.addr,
                    buffered = self.buffer.len(),
                    "Incomplete line, need more data"
                );
                Ok(None)
            }
        }
    }

    /// Reads more bytes from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            // Peer closed its end.
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        self.bytes_in += n as u64;
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    /// Writes one reply to the client.
    async fn send_reply(&mut self, reply: &Reply) -> Result<(), ConnectionError> {
        let bytes = reply.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.bytes_out += bytes.len() as u64;
        trace!(client = %self.addr, bytes = bytes.len(), "Sent reply");
        Ok(())
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error on the socket
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Unacceptable request framing
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),

    /// Client closed the connection between requests
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Client closed the connection mid-line
    #[error("Unexpected end of stream")]
    UnexpectedEof,
}

/// Runs one client connection to completion, swallowing the routine
/// disconnect cases.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    commands: CommandHandler,
    stats: Arc<ServerStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, commands, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
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
    use crate::storage::Keyspace;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn create_test_server() -> (SocketAddr, Arc<Keyspace>, Arc<ServerStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let keyspace = Arc::new(Keyspace::new());
        let stats = Arc::new(ServerStats::new());

        let keyspace_clone = Arc::clone(&keyspace);
        let stats_clone = Arc::clone(&stats);

        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let commands = CommandHandler::new(Arc::clone(&keyspace_clone));
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(stream, client_addr, commands, stats));
            }
        });

        (addr, keyspace, stats)
    }

    /// Sends one line and reads back exactly `expected.len()` reply bytes.
    async fn roundtrip(client: &mut TcpStream, line: &[u8], expected: &[u8]) {
        client.write_all(line).await.unwrap();
        let mut buf = vec![0u8; expected.len()];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(
            buf,
            expected,
            "sent {:?}, got {:?}",
            String::from_utf8_lossy(line),
            String::from_utf8_lossy(&buf)
        );
    }

    #[tokio::test]
    async fn ping_pong() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        roundtrip(&mut client, b"PING\r\n", b"+PONG\r\n").await;
        roundtrip(&mut client, b"PING hello\r\n", b"+hello\r\n").await;
    }

    #[tokio::test]
    async fn set_get_and_null() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        roundtrip(&mut client, b"SET key1 value1\r\n", b"+OK\r\n").await;
        roundtrip(&mut client, b"GET key1\r\n", b"+value1\r\n").await;
        roundtrip(&mut client, b"GET nonexistent\r\n", b"$-1\r\n").await;
    }

    #[tokio::test]
    async fn set_with_ex_expires_on_the_wire() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        roundtrip(&mut client, b"SET key1 value1 EX 1\r\n", b"+OK\r\n").await;
        roundtrip(&mut client, b"GET key1\r\n", b"+value1\r\n").await;

        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;

        roundtrip(&mut client, b"GET key1\r\n", b"$-1\r\n").await;
        roundtrip(&mut client, b"DBSIZE\r\n", b":0\r\n").await;
    }

    #[tokio::test]
    async fn zadd_zrange_withscores() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        roundtrip(&mut client, b"ZADD zset1 1 one 2 two 3 three\r\n", b":3\r\n").await;
        roundtrip(
            &mut client,
            b"ZRANGE zset1 0 1 WITHSCORES\r\n",
            b"*4\r\n+one\r\n+1.000000\r\n+two\r\n+2.000000\r\n",
        )
        .await;
        roundtrip(
            &mut client,
            b"ZRANGE zset1 0 -1\r\n",
            b"*3\r\n+one\r\n+two\r\n+three\r\n",
        )
        .await;
    }

    #[tokio::test]
    async fn zrangebyscore_inclusive_bounds() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        roundtrip(&mut client, b"ZADD zset1 1 one 2 two 3 three\r\n", b":3\r\n").await;
        roundtrip(
            &mut client,
            b"ZRANGEBYSCORE zset1 1 2\r\n",
            b"*2\r\n+one\r\n+two\r\n",
        )
        .await;
        roundtrip(&mut client, b"ZSCORE zset1 one\r\n", b"+1.000000\r\n").await;
        roundtrip(&mut client, b"ZRANK zset1 three\r\n", b":2\r\n").await;
        roundtrip(&mut client, b"ZRANK zset1 nope\r\n", b"$-1\r\n").await;
    }

    #[tokio::test]
    async fn pipelined_requests_reply_in_order() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"SET k1 v1\r\nSET k2 v2\r\nGET k1\r\nGET k2\r\n")
            .await
            .unwrap();

        let expected = b"+OK\r\n+OK\r\n+v1\r\n+v2\r\n";
        let mut buf = vec![0u8; expected.len()];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, expected);
    }

    #[tokio::test]
    async fn error_replies_keep_the_connection_alive() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        roundtrip(
            &mut client,
            b"BOGUS\r\n",
            b"-ERR unknown command 'bogus'\r\n",
        )
        .await;
        roundtrip(&mut client, b"GET\r\n", b"-ERR wrong number of arguments for 'get' command\r\n")
            .await;
        roundtrip(&mut client, b"\r\n", b"-ERR empty command\r\n").await;
        // Still alive after three errors.
        roundtrip(&mut client, b"PING\r\n", b"+PONG\r\n").await;
    }

    #[tokio::test]
    async fn concurrent_clients_fill_the_keyspace() {
        let (addr, keyspace, _) = create_test_server().await;

        let mut tasks = Vec::new();
        for i in 0..5 {
            tasks.push(tokio::spawn(async move {
                let mut client = TcpStream::connect(addr).await.unwrap();
                for j in 0..20 {
                    let line = format!("SET client{}:{} value:{}\r\n", i, j, j);
                    client.write_all(line.as_bytes()).await.unwrap();
                    let mut buf = [0u8; 5];
                    client.read_exact(&mut buf).await.unwrap();
                    assert_eq!(&buf, b"+OK\r\n");
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(keyspace.dbsize(), 100);

        let mut client = TcpStream::connect(addr).await.unwrap();
        roundtrip(&mut client, b"DBSIZE\r\n", b":100\r\n").await;
    }

    #[tokio::test]
    async fn peer_close_releases_the_connection() {
        let (addr, _, stats) = create_test_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(stats.accepted(), 1);
        assert_eq!(stats.active(), 1);

        client.write_all(b"PING\r\n").await.unwrap();
        let mut buf = [0u8; 7];
        client.read_exact(&mut buf).await.unwrap();

        drop(client);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(stats.active(), 0);
        assert!(stats.commands() >= 1);

        // The server keeps serving new connections.
        let mut client = TcpStream::connect(addr).await.unwrap();
        roundtrip(&mut client, b"PING\r\n", b"+PONG\r\n").await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(stats.accepted(), 2);
    }
}
