//! Connection lifecycle: connect, retry, reuse, close.
//!
//! # States
//! ```text
//! Idle ──open()──▶ Connecting ──ok──▶ Open ──close()──▶ Idle
//!                      │                 │
//!                      └──err──┐   failure│
//!                              ▼          ▼
//!                 Waiting (backoff) ──due──▶ Connecting
//!                 or Idle when the retry budget is exhausted
//! ```
//!
//! The manager owns the only stream. The session borrows it for exactly one
//! operation per reactor iteration through [`ConnectionManager::next_event`].

use std::fmt;
use std::io::{self, IoSlice};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{sleep_until, Instant};

use crate::net::connector::{ConnectFuture, Connector};
use crate::net::destination::Destination;
use crate::resilience::{BackoffPolicy, RetryBudget, RetryDecision};

/// Identifier for one established connection, for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The one operation to perform on an open stream this iteration.
#[derive(Debug)]
pub enum SocketOp<'a> {
    /// Write the unsent header bytes followed by the unsent body bytes.
    Send { head: &'a [u8], body: &'a [u8] },
    /// Read into the given scratch space.
    Receive(&'a mut [u8]),
    /// Leave the stream alone (e.g. waiting for the pacing milestone).
    Hold,
}

/// What happened on the connection side.
#[derive(Debug)]
pub enum LinkEvent {
    /// A connect attempt succeeded.
    Established(ConnectionId),
    /// A connect attempt failed.
    ConnectFailed(io::Error),
    /// Backoff elapsed and a new connect attempt has started.
    RetryStarted,
    /// Result of the requested read or write.
    Transferred(io::Result<usize>),
}

enum LinkState<S> {
    Idle,
    Connecting(ConnectFuture<S>),
    Waiting(Instant),
    Open(ConnectionId, S),
}

/// Owns the destination connection and its retry budget.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    destination: Destination,
    state: LinkState<C::Stream>,
    retries: RetryBudget,
    backoff: BackoffPolicy,
    persistent: bool,
    next_id: u64,
    opened: u64,
    connect_failures: u64,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(
        connector: C,
        destination: Destination,
        retries: RetryBudget,
        backoff: BackoffPolicy,
        persistent: bool,
    ) -> Self {
        Self {
            connector,
            destination,
            state: LinkState::Idle,
            retries,
            backoff,
            persistent,
            next_id: 1,
            opened: 0,
            connect_failures: 0,
        }
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, LinkState::Open(..))
    }

    /// Neither open nor on the way to being open.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, LinkState::Idle)
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        match self.state {
            LinkState::Open(id, _) => Some(id),
            _ => None,
        }
    }

    /// Consecutive failures charged to the current transaction.
    pub fn retries_used(&self) -> u32 {
        self.retries.used()
    }

    /// Connections successfully established so far.
    pub fn connections_opened(&self) -> u64 {
        self.opened
    }

    /// Connect attempts that failed so far.
    pub fn connect_failures(&self) -> u64 {
        self.connect_failures
    }

    /// Start connecting if nothing is open or pending.
    pub fn open(&mut self) {
        if self.is_idle() {
            tracing::debug!(destination = %self.destination, "Connecting");
            self.state = LinkState::Connecting(self.connector.connect(&self.destination));
        }
    }

    /// Drop the stream (or abandon a pending attempt) without touching the
    /// retry budget.
    pub fn close(&mut self) {
        if let LinkState::Open(id, _) = self.state {
            tracing::debug!(connection_id = %id, "Closing connection");
        }
        self.state = LinkState::Idle;
    }

    /// Charge one failure to the current transaction and schedule the next
    /// attempt, or report exhaustion.
    ///
    /// The connection is always dropped. On exhaustion the budget resets and
    /// the manager stays idle until [`open`](Self::open) is called again.
    pub fn record_failure(&mut self, now: Instant) -> RetryDecision {
        self.state = LinkState::Idle;
        let decision = self.retries.record_failure();
        match decision {
            RetryDecision::Retry { failures } => {
                let delay = self.backoff.delay(failures);
                tracing::debug!(
                    failures,
                    limit = self.retries.limit(),
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling reconnect"
                );
                self.state = LinkState::Waiting(now + delay);
            }
            RetryDecision::Exhausted => {
                tracing::info!(
                    limit = self.retries.limit(),
                    destination = %self.destination,
                    "Retry budget exhausted"
                );
                self.retries.reset();
            }
        }
        decision
    }

    /// A transaction finished: clear the budget and apply the reuse policy.
    pub fn transaction_completed(&mut self, peer_keep_alive: bool) {
        self.retries.reset();
        if !(self.persistent && peer_keep_alive) {
            self.close();
        }
    }

    /// Wait for the next connection-side event, performing `op` if the
    /// stream is open. Never resolves while idle.
    ///
    /// Cancel-safe: a connect attempt in progress stays parked in the
    /// manager, and a single read or write either completes or has no effect.
    pub async fn next_event(&mut self, op: SocketOp<'_>) -> LinkEvent {
        match &mut self.state {
            LinkState::Idle => std::future::pending().await,
            LinkState::Waiting(at) => {
                sleep_until(*at).await;
                tracing::debug!(destination = %self.destination, "Reconnecting");
                self.state = LinkState::Connecting(self.connector.connect(&self.destination));
                LinkEvent::RetryStarted
            }
            LinkState::Connecting(attempt) => {
                let result = attempt.await;
                match result {
                    Ok(stream) => {
                        let id = ConnectionId(self.next_id);
                        self.next_id += 1;
                        self.opened += 1;
                        tracing::debug!(connection_id = %id, destination = %self.destination, "Connected");
                        self.state = LinkState::Open(id, stream);
                        LinkEvent::Established(id)
                    }
                    Err(e) => {
                        self.connect_failures += 1;
                        self.state = LinkState::Idle;
                        LinkEvent::ConnectFailed(e)
                    }
                }
            }
            LinkState::Open(_, stream) => match op {
                SocketOp::Send { head, body } => {
                    let bufs = [IoSlice::new(head), IoSlice::new(body)];
                    LinkEvent::Transferred(stream.write_vectored(&bufs).await)
                }
                SocketOp::Receive(buf) => LinkEvent::Transferred(stream.read(buf).await),
                SocketOp::Hold => std::future::pending().await,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::DuplexStream;

    /// Fails the first `failures` attempts, then hands out duplex streams.
    struct FlakyConnector {
        failures: usize,
        attempts: usize,
        peers: Vec<DuplexStream>,
    }

    impl Connector for FlakyConnector {
        type Stream = DuplexStream;

        fn connect(&mut self, _destination: &Destination) -> ConnectFuture<DuplexStream> {
            self.attempts += 1;
            if self.attempts <= self.failures {
                return Box::pin(async {
                    Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
                });
            }
            let (client, server) = tokio::io::duplex(64);
            self.peers.push(server);
            Box::pin(async move { Ok(client) })
        }
    }

    fn manager(failures: usize, persistent: bool) -> ConnectionManager<FlakyConnector> {
        ConnectionManager::new(
            FlakyConnector {
                failures,
                attempts: 0,
                peers: Vec::new(),
            },
            Destination::parse("http://collector/").unwrap(),
            RetryBudget::new(3),
            BackoffPolicy {
                base: Duration::from_millis(100),
                max: Duration::from_secs(1),
            },
            persistent,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_connected() {
        let mut link = manager(2, true);
        link.open();

        let mut failures = 0;
        loop {
            match link.next_event(SocketOp::Hold).await {
                LinkEvent::Established(id) => {
                    assert_eq!(id.as_u64(), 1);
                    break;
                }
                LinkEvent::ConnectFailed(_) => {
                    failures += 1;
                    assert!(matches!(
                        link.record_failure(Instant::now()),
                        RetryDecision::Retry { .. }
                    ));
                }
                LinkEvent::RetryStarted => {}
                LinkEvent::Transferred(_) => unreachable!(),
            }
        }

        assert_eq!(failures, 2);
        assert_eq!(link.retries_used(), 2);
        assert!(link.is_open());

        link.transaction_completed(true);
        assert_eq!(link.retries_used(), 0);
        assert!(link.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_leaves_manager_idle() {
        let mut link = manager(10, true);
        link.open();

        let mut decisions = Vec::new();
        while decisions.last() != Some(&RetryDecision::Exhausted) {
            if let LinkEvent::ConnectFailed(_) = link.next_event(SocketOp::Hold).await {
                decisions.push(link.record_failure(Instant::now()));
            }
        }

        assert_eq!(decisions.len(), 3);
        assert!(link.is_idle());
        assert_eq!(link.retries_used(), 0);
        assert_eq!(link.connect_failures(), 3);
    }

    #[tokio::test]
    async fn short_transactions_close_after_completion() {
        let mut link = manager(0, false);
        link.open();
        assert!(matches!(
            link.next_event(SocketOp::Hold).await,
            LinkEvent::Established(_)
        ));

        link.transaction_completed(true);
        assert!(link.is_idle());
    }

    #[tokio::test]
    async fn peer_close_request_is_honoured() {
        let mut link = manager(0, true);
        link.open();
        link.next_event(SocketOp::Hold).await;

        link.transaction_completed(false);
        assert!(!link.is_open());
    }

    #[tokio::test]
    async fn sends_head_then_body() {
        use tokio::io::AsyncReadExt;

        let mut link = manager(0, true);
        link.open();
        link.next_event(SocketOp::Hold).await;

        let mut sent = 0;
        let (head, body) = (b"HEAD".as_slice(), b"body".as_slice());
        while sent < 8 {
            let (h, b) = if sent < 4 {
                (&head[sent..], body)
            } else {
                (&[][..], &body[sent - 4..])
            };
            match link.next_event(SocketOp::Send { head: h, body: b }).await {
                LinkEvent::Transferred(Ok(n)) => sent += n,
                other => panic!("unexpected event {other:?}"),
            }
        }

        let mut peer = link.connector.peers.pop().unwrap();
        let mut received = [0u8; 8];
        peer.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"HEADbody");
    }
}
