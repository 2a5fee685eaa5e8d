//! Per-transaction state: request head/body, then response head/body.
//!
//! # Data Flow
//! ```text
//! Request  HEAD ─▶ BODY ─▶ (flow = Response)
//! Response HEAD ─▶ BODY ─▶ complete
//! ```
//!
//! Every step resumes from the exact byte offset held in the buffers, so any
//! number of partial reads and writes may separate two states. The session
//! owns the buffers and passes them in; this module only moves cursors and
//! decides what a chunk of bytes means.

use tokio::time::{Duration, Instant};

use crate::http::{ResponseError, ResponseHead};
use crate::pipe::buffer::{BufferError, ByteBuffer};

/// Which half of the exchange is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Request,
    Response,
}

/// Position within one half of the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Head,
    Body,
}

/// Where the request body bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySource {
    Outbound,
    /// Compressed copy of the outbound batch.
    Scratch,
}

/// Result of feeding response bytes or end-of-stream into a transaction.
#[derive(Debug, PartialEq, Eq)]
pub enum ResponseStep {
    /// More bytes are needed.
    Continue,
    /// Response fully consumed.
    Complete { keep_alive: bool },
    /// Nothing came back; the request must be sent again.
    Resend,
    /// The response cannot be framed; the request counts as delivered.
    Malformed(ResponseError),
}

/// One POST exchange.
#[derive(Debug)]
pub struct Transaction {
    id: u64,
    flow: Flow,
    request_state: Phase,
    response_state: Phase,
    body: BodySource,
    compressed: bool,
    /// Framed body length, as rendered into `Content-Length`.
    content_length: usize,
    /// Uncompressed batch length.
    backup: usize,
    status: Option<u16>,
    success: bool,
    /// Declared response body length.
    declared: Option<u64>,
    /// Response body bytes still expected; `None` while unknown.
    response_remaining: Option<u64>,
    keep_alive: bool,
    deadline: Option<Instant>,
}

impl Transaction {
    pub fn new(id: u64, body: BodySource, content_length: usize, backup: usize) -> Self {
        Self {
            id,
            flow: Flow::Request,
            request_state: Phase::Head,
            response_state: Phase::Head,
            body,
            compressed: body == BodySource::Scratch,
            content_length,
            backup,
            status: None,
            success: false,
            declared: None,
            response_remaining: None,
            keep_alive: true,
            deadline: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn flow(&self) -> Flow {
        self.flow
    }

    pub fn request_state(&self) -> Phase {
        self.request_state
    }

    pub fn response_state(&self) -> Phase {
        self.response_state
    }

    pub fn body_source(&self) -> BodySource {
        self.body
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn content_length(&self) -> usize {
        self.content_length
    }

    pub fn batch_len(&self) -> usize {
        self.backup
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// A 2xx head has been received.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Deadline for an unknown-length response body, if one applies.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Account for `written` bytes of a vectored head+body write.
    ///
    /// Returns `true` once both head and body are drained, at which point the
    /// flow switches to the response and `scratch` must be free for it.
    pub fn advance_request(
        &mut self,
        written: usize,
        head: &mut ByteBuffer,
        body: &mut ByteBuffer,
    ) -> Result<bool, BufferError> {
        let from_head = written.min(head.pending().len());
        head.consume(from_head)?;
        body.consume(written - from_head)?;

        if head.is_drained() {
            self.request_state = Phase::Body;
        }
        if head.is_drained() && body.is_drained() {
            self.flow = Flow::Response;
            self.request_state = Phase::Head;
            return Ok(true);
        }
        Ok(false)
    }

    /// Feed `received` bytes that were just committed to `scratch`.
    ///
    /// Head bytes accumulate in `scratch`; body bytes are discarded, so the
    /// caller may clear `scratch` whenever this returns.
    pub fn on_response_data(
        &mut self,
        now: Instant,
        received: usize,
        scratch: &mut ByteBuffer,
        unknown_length_timeout: Option<Duration>,
    ) -> ResponseStep {
        match self.response_state {
            Phase::Head => {
                let (head, used) = match ResponseHead::parse(scratch.filled()) {
                    Ok(Some(parsed)) => parsed,
                    Ok(None) if scratch.is_full() => {
                        return ResponseStep::Malformed(ResponseError::HeadTooLarge(
                            scratch.capacity(),
                        ))
                    }
                    Ok(None) => return ResponseStep::Continue,
                    Err(e) => return ResponseStep::Malformed(e),
                };

                let leftover = (scratch.len() - used) as u64;
                scratch.clear();
                self.response_state = Phase::Body;
                self.status = Some(head.status);
                self.success = head.is_success();
                self.declared = head.content_length;
                self.keep_alive = head.keep_alive;

                match head.content_length {
                    Some(length) => self.consume_body(length, leftover),
                    None => {
                        self.deadline = unknown_length_timeout.map(|timeout| now + timeout);
                        ResponseStep::Continue
                    }
                }
            }
            Phase::Body => {
                scratch.clear();
                match self.response_remaining {
                    Some(remaining) => self.consume_body(remaining, received as u64),
                    None => ResponseStep::Continue,
                }
            }
        }
    }

    fn consume_body(&mut self, remaining: u64, received: u64) -> ResponseStep {
        if received > remaining {
            return ResponseStep::Malformed(ResponseError::ConflictingLength);
        }
        let left = remaining - received;
        self.response_remaining = Some(left);
        if left == 0 {
            ResponseStep::Complete {
                keep_alive: self.keep_alive,
            }
        } else {
            ResponseStep::Continue
        }
    }

    /// The peer closed the connection during the response.
    pub fn on_response_eof(&self, scratch: &ByteBuffer) -> ResponseStep {
        match (self.response_state, self.response_remaining) {
            (Phase::Head, _) if scratch.is_empty() => ResponseStep::Resend,
            (Phase::Head, _) => ResponseStep::Malformed(ResponseError::IncompleteHead),
            (Phase::Body, None) => ResponseStep::Complete { keep_alive: false },
            (Phase::Body, Some(remaining)) => ResponseStep::Malformed(ResponseError::Truncated {
                received: self.received_of(remaining),
                expected: self.expected_length(remaining),
            }),
        }
    }

    /// The unknown-length deadline has passed: end the response here.
    pub fn deadline_expired(&self, now: Instant) -> bool {
        self.flow == Flow::Response
            && self.response_state == Phase::Body
            && self.response_remaining.is_none()
            && self.deadline.is_some_and(|deadline| deadline <= now)
    }

    fn expected_length(&self, remaining: u64) -> u64 {
        self.declared.unwrap_or(remaining)
    }

    fn received_of(&self, remaining: u64) -> u64 {
        self.expected_length(remaining) - remaining
    }
}
