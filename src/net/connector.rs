//! Transport establishment.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::net::destination::Destination;

/// A connect attempt in progress. Owns everything it needs so it can be
/// parked across reactor iterations.
pub type ConnectFuture<S> = Pin<Box<dyn Future<Output = io::Result<S>>>>;

/// Opens byte streams to a destination.
///
/// The session only ever holds one stream at a time and performs a single
/// read or write on it per reactor iteration.
pub trait Connector {
    type Stream: AsyncRead + AsyncWrite + Unpin;

    fn connect(&mut self, destination: &Destination) -> ConnectFuture<Self::Stream>;
}

/// Plain TCP connector with a connect timeout.
///
/// When built with a resolved address it connects there directly; otherwise
/// the destination host is looked up on every attempt.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    timeout: Duration,
    address: Option<SocketAddr>,
}

impl TcpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            address: None,
        }
    }

    /// Pin every connect to an address resolved up front.
    pub fn with_address(mut self, address: SocketAddr) -> Self {
        self.address = Some(address);
        self
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&mut self, destination: &Destination) -> ConnectFuture<TcpStream> {
        let host = destination.host().to_string();
        let port = destination.port();
        let timeout = self.timeout;
        let address = self.address;

        Box::pin(async move {
            let connect = async {
                match address {
                    Some(address) => TcpStream::connect(address).await,
                    None => TcpStream::connect((host.as_str(), port)).await,
                }
            };
            let stream = tokio::time::timeout(timeout, connect)
                .await
                .map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("connect to {host}:{port} timed out after {timeout:?}"),
                    )
                })??;
            stream.set_nodelay(true)?;
            Ok(stream)
        })
    }
}
