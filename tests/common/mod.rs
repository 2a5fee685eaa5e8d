//! Shared utilities for integration testing.
//!
//! A mock collector that parses POST requests, records them, and answers
//! according to a script, reachable either through in-memory duplex pipes
//! or a loopback TCP listener.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Read};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use flate2::read::ZlibDecoder;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::net::TcpListener;

use http_pipe::net::{ConnectFuture, Connector, Destination};
use http_pipe::PipeConfig;

/// How the collector answers the next request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// `200 OK` with an empty body.
    Ok,
    /// The given status with an empty body.
    Status(u16),
    /// Drop the connection without answering; the request is not recorded.
    Hangup,
    /// Write these bytes verbatim, then close.
    Raw(&'static str),
    /// `200 OK` without `Connection: close`, then close anyway once the
    /// connection is idle.
    OkThenClose,
}

/// One request as received by the collector.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub connection: usize,
    pub head: String,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.split("\r\n").skip(1).find_map(|line| {
            let (n, v) = line.split_once(':')?;
            n.trim().eq_ignore_ascii_case(name).then(|| v.trim())
        })
    }

    pub fn content_length(&self) -> usize {
        self.header("Content-Length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Body bytes as the sender saw them, inflated if compressed.
    pub fn payload(&self) -> Vec<u8> {
        if self.header("X-Pipe-Zip") == Some("1") {
            inflate(&self.body)
        } else {
            self.body.clone()
        }
    }
}

pub fn inflate(bytes: &[u8]) -> Vec<u8> {
    let mut decoded = Vec::new();
    ZlibDecoder::new(bytes).read_to_end(&mut decoded).unwrap();
    decoded
}

#[derive(Default)]
struct State {
    requests: Vec<Recorded>,
    script: VecDeque<Reply>,
    connections: usize,
}

/// Recording collector shared between the test and its connections.
#[derive(Clone, Default)]
pub struct Collector {
    state: Arc<Mutex<State>>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue replies for the next requests; `Reply::Ok` once exhausted.
    pub fn script(&self, replies: impl IntoIterator<Item = Reply>) {
        self.state.lock().unwrap().script.extend(replies);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    /// Concatenated payloads of every recorded request.
    pub fn payload(&self) -> Vec<u8> {
        self.requests().iter().flat_map(Recorded::payload).collect()
    }

    pub fn connections(&self) -> usize {
        self.state.lock().unwrap().connections
    }

    /// Serve requests on `stream` until the peer goes away.
    pub fn serve<S>(&self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let connection = {
            let mut state = self.state.lock().unwrap();
            state.connections += 1;
            state.connections
        };
        let collector = self.clone();
        tokio::spawn(async move {
            let _ = collector.handle(stream, connection).await;
        });
    }

    async fn handle<S>(&self, mut stream: S, connection: usize) -> io::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut pending = Vec::new();
        while let Some((head, body)) = read_request(&mut stream, &mut pending).await? {
            let reply = self.state.lock().unwrap().script.pop_front().unwrap_or(Reply::Ok);
            let recorded = Recorded {
                connection,
                head,
                body,
            };
            let close = recorded
                .header("Connection")
                .is_some_and(|v| v.eq_ignore_ascii_case("close"));

            match reply {
                Reply::Hangup => return Ok(()),
                Reply::Raw(raw) => {
                    self.state.lock().unwrap().requests.push(recorded);
                    stream.write_all(raw.as_bytes()).await?;
                    return stream.shutdown().await;
                }
                Reply::OkThenClose => {
                    self.state.lock().unwrap().requests.push(recorded);
                    stream
                        .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n")
                        .await?;
                    return stream.shutdown().await;
                }
                Reply::Ok | Reply::Status(_) => {
                    let status = match reply {
                        Reply::Status(code) => code,
                        _ => 200,
                    };
                    self.state.lock().unwrap().requests.push(recorded);
                    let response = format!(
                        "HTTP/1.1 {status} Status\r\nContent-Length: 0\r\n{}\r\n",
                        if close { "Connection: close\r\n" } else { "" }
                    );
                    stream.write_all(response.as_bytes()).await?;
                    if close {
                        return stream.shutdown().await;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Read one request (head and `Content-Length` body). `None` on clean EOF.
async fn read_request<S: AsyncRead + Unpin>(
    stream: &mut S,
    pending: &mut Vec<u8>,
) -> io::Result<Option<(String, Vec<u8>)>> {
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(end) = pending.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&pending[..end]).to_string();
            let length = head
                .split("\r\n")
                .find_map(|line| {
                    let (n, v) = line.split_once(':')?;
                    n.eq_ignore_ascii_case("Content-Length").then(|| v.trim().parse().ok())?
                })
                .unwrap_or(0usize);
            let total = end + 4 + length;
            while pending.len() < total {
                let n = stream.read(&mut chunk).await?;
                if n == 0 {
                    return Ok(None);
                }
                pending.extend_from_slice(&chunk[..n]);
            }
            let body = pending[end + 4..total].to_vec();
            pending.drain(..total);
            return Ok(Some((head, body)));
        }

        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        pending.extend_from_slice(&chunk[..n]);
    }
}

/// In-memory connector: refuses the first `failures` attempts, then hands
/// out duplex pipes served by the collector.
pub struct MockConnector {
    collector: Collector,
    failures: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new(collector: &Collector) -> Self {
        Self::failing(collector, 0)
    }

    pub fn failing(collector: &Collector, failures: usize) -> Self {
        Self {
            collector: collector.clone(),
            failures: Arc::new(AtomicUsize::new(failures)),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared attempt counter, readable after the connector is moved.
    pub fn attempts(&self) -> Arc<AtomicUsize> {
        self.attempts.clone()
    }
}

impl Connector for MockConnector {
    type Stream = DuplexStream;

    fn connect(&mut self, _destination: &Destination) -> ConnectFuture<DuplexStream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let refuse = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if refuse {
            return Box::pin(async {
                Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
            });
        }

        let (client, server) = tokio::io::duplex(64 * 1024);
        self.collector.serve(server);
        Box::pin(async move { Ok(client) })
    }
}

/// Loopback TCP collector.
pub async fn spawn_tcp_collector() -> (SocketAddr, Collector) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let collector = Collector::new();
    let accepting = collector.clone();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            accepting.serve(socket);
        }
    });

    (addr, collector)
}

/// Unpaced configuration with the given buffer capacity.
pub fn test_config(capacity: usize) -> PipeConfig {
    let mut config = PipeConfig {
        destination: "http://collector.test:8080/ingest".into(),
        device_id: Some("a0b1c2d3e4f5".into()),
        ..PipeConfig::default()
    };
    config.buffer.capacity = capacity;
    config.transfer.rate = 0;
    config
}

/// Same as [`test_config`] but admission never holds a batch back.
pub fn unthrottled_config(capacity: usize) -> PipeConfig {
    let mut config = test_config(capacity);
    config.admission.idle_limit = 1000;
    config.admission.busy_limit = 1000;
    config
}

/// Deterministic, mildly compressible input.
pub fn sample_input(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| b"temperature=21.5;humidity=40;\n"[i % 30] ^ ((i / 300) as u8 & 0x07))
        .collect()
}
