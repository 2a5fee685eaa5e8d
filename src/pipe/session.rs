//! The transfer engine.
//!
//! # Data Flow
//! ```text
//! input ──read──▶ inbuf ──swap──▶ outbuf ──(zlib)──▶ scratch
//!                                    │                  │
//!                     header.render(body size) ─▶ hdrbuf│
//!                                    ▼                  ▼
//!                         write_vectored(hdrbuf, body) paced by RateLimiter
//!                                    │
//!                         read response head into scratch, discard body
//!                                    │
//!                         complete: clear cursors, keep or close connection
//! ```
//!
//! # Design Decisions
//! - One `select!` per iteration is the only suspension point
//! - Starting a transaction swaps buffers, so input keeps flowing during a send
//! - A full input buffer stops reads instead of overwriting buffered bytes
//! - Network failures roll back to the start of the batch and never end `serve`

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{sleep_until, Instant};

use crate::config::loader::validate;
use crate::config::{AdmissionConfig, PipeConfig};
use crate::error::PipeError;
use crate::http::{HeaderGenerator, COMPRESSION_FIELD, DEVICE_FIELD};
use crate::lifecycle::StopSignal;
use crate::net::{ConnectionManager, Connector, Destination, LinkEvent, SocketOp};
use crate::pacing::{AdmissionController, Allowance, RateLimiter};
use crate::pipe::buffer::ByteBuffer;
use crate::pipe::compression::{scratch_capacity, Compressor};
use crate::pipe::transaction::{BodySource, Flow, ResponseStep, Transaction};
use crate::resilience::{BackoffPolicy, RetryBudget, RetryDecision};

/// Totals accumulated over one call to [`Session::serve`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServeReport {
    /// Transactions delivered (including malformed responses).
    pub transactions: u64,
    /// Uncompressed input bytes delivered.
    pub body_bytes: u64,
    /// Header and body bytes written, resends included.
    pub wire_bytes: u64,
    pub connections_opened: u64,
    pub connect_failures: u64,
    /// Transactions rewound after a failure.
    pub rollbacks: u64,
    /// Transactions given up after the retry budget ran out.
    pub abandoned: u64,
    pub malformed: u64,
    /// Responses with a non-2xx status.
    pub rejected: u64,
}

/// The long-lived pipe: one input, one destination, four buffers.
pub struct Session<I, C: Connector> {
    input: I,
    input_done: bool,
    link: ConnectionManager<C>,
    header: Box<dyn HeaderGenerator>,
    compressor: Compressor,
    limiter: RateLimiter,
    admission: AdmissionController,
    admission_config: AdmissionConfig,
    unknown_length_timeout: Option<Duration>,
    inbuf: ByteBuffer,
    outbuf: ByteBuffer,
    hdrbuf: ByteBuffer,
    scratch: ByteBuffer,
    txn: Option<Transaction>,
    next_txn_id: u64,
    report: ServeReport,
}

impl<I, C> Session<I, C>
where
    I: AsyncRead + Unpin,
    C: Connector,
{
    /// Build a session from a complete configuration.
    ///
    /// Fails if the configuration does not validate or if the header for the
    /// largest possible body would not fit the header buffer.
    pub fn new(
        config: &PipeConfig,
        input: I,
        connector: C,
        mut header: Box<dyn HeaderGenerator>,
    ) -> Result<Self, PipeError> {
        validate(config)?;
        let destination = Destination::parse(&config.destination)?;
        let compressor = Compressor::new(config.compression.level)?;
        let persistent = config.connection.persistent;
        let capacity = config.buffer.capacity;
        let scratch_capacity = scratch_capacity(capacity);

        header.set_request("POST", destination.path(), "HTTP/1.1")?;
        header.set_field("Host", Some(destination.authority().as_str()))?;
        if let Some(device_id) = config.device_id.as_deref() {
            header.set_field(DEVICE_FIELD, Some(device_id))?;
        }
        if !persistent {
            header.set_field("Connection", Some("close"))?;
        }

        let worst_case = if compressor.is_enabled() {
            header.set_field(COMPRESSION_FIELD, Some("1"))?;
            let needed = header.render(scratch_capacity).len();
            header.set_field(COMPRESSION_FIELD, None)?;
            needed
        } else {
            header.render(capacity).len()
        };
        if worst_case > config.buffer.header_capacity {
            return Err(PipeError::HeaderTooLarge {
                needed: worst_case,
                capacity: config.buffer.header_capacity,
            });
        }

        let link = ConnectionManager::new(
            connector,
            destination,
            RetryBudget::new(config.retries.max_attempts),
            BackoffPolicy::from_config(&config.retries),
            persistent,
        );

        Ok(Self {
            input,
            input_done: false,
            link,
            header,
            compressor,
            limiter: RateLimiter::new(config.transfer.rate),
            admission: AdmissionController::new(&config.admission, Instant::now(), false),
            admission_config: config.admission.clone(),
            unknown_length_timeout: config.connection.unknown_length_timeout(),
            inbuf: ByteBuffer::with_capacity(capacity),
            outbuf: ByteBuffer::with_capacity(capacity),
            hdrbuf: ByteBuffer::with_capacity(config.buffer.header_capacity),
            scratch: ByteBuffer::with_capacity(scratch_capacity),
            txn: None,
            next_txn_id: 1,
            report: ServeReport::default(),
        })
    }

    pub fn destination(&self) -> &Destination {
        self.link.destination()
    }

    pub fn report(&self) -> &ServeReport {
        &self.report
    }

    /// Failures charged to the current transaction so far.
    pub fn retries_used(&self) -> u32 {
        self.link.retries_used()
    }

    /// Input bytes buffered but not yet part of a transaction.
    pub fn pending_input(&self) -> usize {
        self.inbuf.len()
    }

    pub fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }

    /// Run until the input is exhausted and fully delivered, or `stop` is
    /// raised.
    pub async fn serve(&mut self, mut stop: StopSignal) -> Result<ServeReport, PipeError> {
        self.admission =
            AdmissionController::new(&self.admission_config, Instant::now(), self.has_backlog());
        tracing::info!(
            destination = %self.link.destination(),
            persistent = self.link.is_persistent(),
            compression_level = self.compressor.level(),
            "Pipe started"
        );

        loop {
            if stop.is_set() {
                tracing::info!(
                    in_transaction = self.txn.is_some(),
                    pending = self.inbuf.len() + self.outbuf.len(),
                    "Stop requested, leaving serve loop"
                );
                break;
            }

            let now = Instant::now();
            self.admission.roll(now, self.has_backlog());
            self.expire_unknown_length(now);
            self.try_start(now)?;

            if self.is_finished() {
                tracing::info!("Input exhausted and delivered");
                break;
            }
            if self.txn.is_some() {
                self.link.open();
            }

            let deadline = self.next_deadline(now);
            let reading = !self.input_done && !self.inbuf.is_full();
            let op = socket_op(
                self.txn.as_ref(),
                self.limiter.allowance(now),
                &self.hdrbuf,
                &self.outbuf,
                &mut self.scratch,
            );

            tokio::select! {
                _ = stop.wait() => {}
                result = read_input(&mut self.input, &mut self.inbuf, reading) => self.on_input(result)?,
                event = self.link.next_event(op) => self.on_link_event(event)?,
                _ = sleep_until(deadline) => {}
            }
        }

        self.report.connections_opened = self.link.connections_opened();
        self.report.connect_failures = self.link.connect_failures();
        Ok(self.report.clone())
    }

    /// Buffered input or an undelivered batch.
    fn has_backlog(&self) -> bool {
        !self.inbuf.is_empty() || !self.outbuf.is_empty()
    }

    fn is_finished(&self) -> bool {
        self.input_done && self.txn.is_none() && !self.has_backlog()
    }

    fn next_deadline(&self, now: Instant) -> Instant {
        let mut deadline = self.admission.next_boundary();
        if let Some(txn) = &self.txn {
            if txn.flow() == Flow::Request {
                if let Allowance::Wait(at) = self.limiter.allowance(now) {
                    deadline = deadline.min(at);
                }
            }
            if let Some(at) = txn.deadline() {
                deadline = deadline.min(at);
            }
        }
        deadline
    }

    fn on_input(&mut self, result: io::Result<usize>) -> Result<(), PipeError> {
        match result {
            Ok(0) => {
                self.input_done = true;
                tracing::info!(buffered = self.inbuf.len(), "Input closed");
            }
            Ok(n) => self.inbuf.commit(n)?,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                self.input_done = true;
                tracing::warn!(error = %e, "Input read failed, treating as end of input");
            }
        }
        Ok(())
    }

    /// A fresh full buffer starts at once; partial flushes and batches left
    /// over from an abandoned transaction wait for admission.
    fn try_start(&mut self, now: Instant) -> Result<(), PipeError> {
        if self.txn.is_some() || !self.has_backlog() {
            return Ok(());
        }
        let full_batch = self.outbuf.is_empty() && self.inbuf.is_full();
        if !full_batch && !self.admission.admit(now, true) {
            return Ok(());
        }
        self.begin_transaction()
    }

    /// Frame the next batch: the undelivered one if a previous attempt was
    /// rolled back, otherwise everything buffered so far.
    fn begin_transaction(&mut self) -> Result<(), PipeError> {
        if self.outbuf.is_empty() {
            std::mem::swap(&mut self.inbuf, &mut self.outbuf);
            self.inbuf.clear();
        } else {
            self.outbuf.rewind();
        }
        let batch = self.outbuf.len();

        let body = if self.compressor.is_enabled() {
            match self.compressor.compress(self.outbuf.filled(), &mut self.scratch) {
                Ok(_) => BodySource::Scratch,
                Err(e) => {
                    tracing::debug!(error = %e, batch, "Compression failed, sending uncompressed");
                    BodySource::Outbound
                }
            }
        } else {
            BodySource::Outbound
        };
        if self.compressor.is_enabled() {
            let marker = (body == BodySource::Scratch).then_some("1");
            self.header.set_field(COMPRESSION_FIELD, marker)?;
        }

        let content_length = match body {
            BodySource::Outbound => batch,
            BodySource::Scratch => self.scratch.len(),
        };
        let capacity = self.hdrbuf.capacity();
        self.hdrbuf.clear();
        let rendered = self.header.render(content_length);
        let needed = rendered.len();
        self.hdrbuf
            .extend_from_slice(rendered)
            .map_err(|_| PipeError::HeaderTooLarge { needed, capacity })?;

        let id = self.next_txn_id;
        self.next_txn_id += 1;
        tracing::debug!(
            transaction = id,
            batch,
            content_length,
            compressed = body == BodySource::Scratch,
            "Transaction started"
        );
        self.txn = Some(Transaction::new(id, body, content_length, batch));
        Ok(())
    }

    /// Return the batch to pending and drop the transaction.
    fn rollback(&mut self) {
        if let Some(txn) = self.txn.take() {
            tracing::debug!(transaction = txn.id(), batch = txn.batch_len(), "Rolled back");
            self.report.rollbacks += 1;
        }
        self.outbuf.rewind();
        self.scratch.clear();
        self.hdrbuf.clear();
    }

    fn complete_transaction(&mut self, keep_alive: bool) {
        let Some(txn) = self.txn.take() else {
            return;
        };

        if let Some(status) = txn.status().filter(|_| !txn.is_success()) {
            tracing::warn!(
                transaction = txn.id(),
                status,
                destination = %self.link.destination(),
                "Collector answered with a non-success status"
            );
            self.report.rejected += 1;
        }

        self.report.transactions += 1;
        self.report.body_bytes += txn.batch_len() as u64;
        tracing::debug!(
            transaction = txn.id(),
            batch = txn.batch_len(),
            content_length = txn.content_length(),
            keep_alive,
            "Transaction complete"
        );

        self.link.transaction_completed(keep_alive);
        self.outbuf.clear();
        self.scratch.clear();
        self.hdrbuf.clear();
    }

    /// Charge a failure to the current transaction.
    ///
    /// `mid_transaction` failures happened on an open connection and may
    /// have sent part of the batch, so the transaction restarts from its
    /// first byte. Restarts inside the retry budget bypass admission.
    fn on_failure(&mut self, now: Instant, mid_transaction: bool) -> Result<(), PipeError> {
        if self.txn.is_none() {
            self.link.close();
            return Ok(());
        }

        match self.link.record_failure(now) {
            RetryDecision::Retry { .. } => {
                if mid_transaction {
                    self.rollback();
                    self.begin_transaction()?;
                }
            }
            RetryDecision::Exhausted => {
                self.rollback();
                self.report.abandoned += 1;
            }
        }
        Ok(())
    }

    fn expire_unknown_length(&mut self, now: Instant) {
        if self.txn.as_ref().is_some_and(|txn| txn.deadline_expired(now)) {
            tracing::debug!("Unknown-length response deadline reached, closing");
            self.complete_transaction(false);
        }
    }

    fn on_link_event(&mut self, event: LinkEvent) -> Result<(), PipeError> {
        let now = Instant::now();
        match event {
            LinkEvent::Established(id) => {
                tracing::debug!(connection_id = %id, "Connection ready");
            }
            LinkEvent::RetryStarted => {}
            LinkEvent::ConnectFailed(e) => {
                tracing::debug!(
                    error = %e,
                    destination = %self.link.destination(),
                    "Connect failed"
                );
                self.on_failure(now, false)?;
            }
            LinkEvent::Transferred(result) => match self.txn.as_ref().map(Transaction::flow) {
                None => self.on_idle_read(result),
                Some(Flow::Request) => self.on_sent(now, result)?,
                Some(Flow::Response) => self.on_received(now, result)?,
            },
        }
        Ok(())
    }

    fn on_sent(&mut self, now: Instant, result: io::Result<usize>) -> Result<(), PipeError> {
        let written = match result {
            Ok(0) => {
                tracing::debug!("Connection accepted no bytes");
                return self.on_failure(now, true);
            }
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(error = %e, "Send failed");
                return self.on_failure(now, true);
            }
        };
        self.limiter.record(now, written);
        self.report.wire_bytes += written as u64;

        let Some(txn) = self.txn.as_mut() else {
            return Ok(());
        };
        let body = match txn.body_source() {
            BodySource::Outbound => &mut self.outbuf,
            BodySource::Scratch => &mut self.scratch,
        };
        if txn.advance_request(written, &mut self.hdrbuf, body)? {
            tracing::debug!(transaction = txn.id(), "Request sent, awaiting response");
            // The compressed body is no longer needed; the response reuses scratch.
            self.scratch.clear();
        }
        Ok(())
    }

    fn on_received(&mut self, now: Instant, result: io::Result<usize>) -> Result<(), PipeError> {
        let Some(txn) = self.txn.as_mut() else {
            return Ok(());
        };
        let step = match result {
            Ok(0) => txn.on_response_eof(&self.scratch),
            Ok(n) => {
                self.scratch.commit(n)?;
                txn.on_response_data(now, n, &mut self.scratch, self.unknown_length_timeout)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Receive failed");
                ResponseStep::Resend
            }
        };

        match step {
            ResponseStep::Continue => {}
            ResponseStep::Complete { keep_alive } => self.complete_transaction(keep_alive),
            ResponseStep::Resend => {
                tracing::debug!("No response received, sending the batch again");
                self.on_failure(now, true)?;
            }
            ResponseStep::Malformed(e) => {
                tracing::info!(error = %e, "Malformed response, treating request as delivered");
                self.report.malformed += 1;
                self.complete_transaction(false);
            }
        }
        Ok(())
    }

    /// Activity on a persistent connection between transactions.
    fn on_idle_read(&mut self, result: io::Result<usize>) {
        match result {
            Ok(0) => {
                tracing::debug!(
                    connection_id = ?self.link.connection_id(),
                    "Peer closed idle connection"
                );
                self.link.close();
            }
            Ok(n) => tracing::debug!(bytes = n, "Discarding unsolicited bytes"),
            Err(e) => {
                tracing::debug!(
                    connection_id = ?self.link.connection_id(),
                    error = %e,
                    "Idle connection failed"
                );
                self.link.close();
            }
        }
        self.scratch.clear();
    }
}

/// Read from `input` into the free part of `buf`; pends forever when
/// reading is not wanted.
async fn read_input<I: AsyncRead + Unpin>(
    input: &mut I,
    buf: &mut ByteBuffer,
    enabled: bool,
) -> io::Result<usize> {
    if !enabled {
        return std::future::pending().await;
    }
    input.read(buf.spare_mut()).await
}

/// The socket operation for this iteration.
///
/// `scratch` always has free space when a receive is requested: head bytes
/// that fill it are rejected as malformed and body bytes are discarded after
/// every read.
fn socket_op<'a>(
    txn: Option<&Transaction>,
    allowance: Allowance,
    hdrbuf: &'a ByteBuffer,
    outbuf: &'a ByteBuffer,
    scratch: &'a mut ByteBuffer,
) -> SocketOp<'a> {
    match txn {
        Some(txn) if txn.flow() == Flow::Request => {
            if let Allowance::Wait(_) = allowance {
                return SocketOp::Hold;
            }
            let body = match txn.body_source() {
                BodySource::Outbound => outbuf.pending(),
                BodySource::Scratch => {
                    let scratch: &'a ByteBuffer = scratch;
                    scratch.pending()
                }
            };
            SocketOp::Send {
                head: hdrbuf.pending(),
                body,
            }
        }
        _ => SocketOp::Receive(scratch.spare_mut()),
    }
}
