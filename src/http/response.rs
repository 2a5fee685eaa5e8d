//! Minimal HTTP/1.x response head parsing.
//!
//! Only what the pipe needs to frame a response: the status code, the body
//! length if one is declared, and whether the peer wants the connection
//! closed. Bodies are counted and discarded by the session.

use thiserror::Error;

/// Longest head accepted before the response is declared malformed.
pub const MAX_HEAD_LEN: usize = 16 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    #[error("malformed status line: {0:?}")]
    StatusLine(String),

    #[error("malformed header line: {0:?}")]
    HeaderLine(String),

    #[error("invalid Content-Length: {0:?}")]
    ContentLength(String),

    #[error("conflicting Content-Length values")]
    ConflictingLength,

    #[error("response head exceeds {0} bytes")]
    HeadTooLarge(usize),

    #[error("connection closed {received} bytes into a {expected}-byte body")]
    Truncated { received: u64, expected: u64 },

    #[error("connection closed inside the response head")]
    IncompleteHead,
}

/// The parts of a response head the pipe acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    /// `None` when the length is unknown (absent or chunked).
    pub content_length: Option<u64>,
    /// The peer will keep the connection open afterwards.
    pub keep_alive: bool,
}

impl ResponseHead {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse a head from the start of `buf`.
    ///
    /// Returns `Ok(None)` while the terminating blank line has not arrived,
    /// otherwise the head and the number of bytes it occupied. Anything
    /// after that belongs to the body.
    pub fn parse(buf: &[u8]) -> Result<Option<(ResponseHead, usize)>, ResponseError> {
        let Some(end) = find_head_end(buf) else {
            if buf.len() >= MAX_HEAD_LEN {
                return Err(ResponseError::HeadTooLarge(MAX_HEAD_LEN));
            }
            return Ok(None);
        };

        let text = String::from_utf8_lossy(&buf[..end]);
        let mut lines = text.split("\r\n");
        let status_line = lines.next().unwrap_or_default();
        let (version, status) = parse_status_line(status_line)?;

        let mut keep_alive = version != "HTTP/1.0";
        let mut content_length: Option<u64> = None;
        let mut chunked = false;

        for line in lines.filter(|l| !l.is_empty()) {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ResponseError::HeaderLine(line.to_string()))?;
            let name = name.trim();
            let value = value.trim();

            if name.eq_ignore_ascii_case("Content-Length") {
                let parsed: u64 = value
                    .parse()
                    .map_err(|_| ResponseError::ContentLength(value.to_string()))?;
                if content_length.is_some_and(|existing| existing != parsed) {
                    return Err(ResponseError::ConflictingLength);
                }
                content_length = Some(parsed);
            } else if name.eq_ignore_ascii_case("Transfer-Encoding") {
                chunked |= value
                    .split(',')
                    .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"));
            } else if name.eq_ignore_ascii_case("Connection") {
                for token in value.split(',').map(str::trim) {
                    if token.eq_ignore_ascii_case("close") {
                        keep_alive = false;
                    } else if token.eq_ignore_ascii_case("keep-alive") {
                        keep_alive = true;
                    }
                }
            }
        }

        // No body is allowed for these regardless of headers.
        if status == 204 || status == 304 || (100..200).contains(&status) {
            content_length = Some(0);
        } else if chunked {
            content_length = None;
        }

        Ok(Some((
            ResponseHead {
                status,
                content_length,
                keep_alive,
            },
            end + 4,
        )))
    }
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_status_line(line: &str) -> Result<(&str, u16), ResponseError> {
    let malformed = || ResponseError::StatusLine(line.to_string());
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().ok_or_else(malformed)?;
    if !version.starts_with("HTTP/1.") {
        return Err(malformed());
    }
    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .filter(|code| (100..1000).contains(code))
        .ok_or_else(malformed)?;
    Ok((version, status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ok_with_length() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello";
        let (head, used) = ResponseHead::parse(raw).unwrap().unwrap();
        assert_eq!(head.status, 200);
        assert_eq!(head.content_length, Some(5));
        assert!(head.keep_alive);
        assert_eq!(&raw[used..], b"hello");
    }

    #[test]
    fn incomplete_head_needs_more() {
        assert_eq!(ResponseHead::parse(b"HTTP/1.1 200 OK\r\nContent-Le").unwrap(), None);
    }

    #[test]
    fn header_names_are_case_insensitive() {
        let raw = b"HTTP/1.1 201 Created\r\ncontent-length: 0\r\nCONNECTION: Close\r\n\r\n";
        let (head, _) = ResponseHead::parse(raw).unwrap().unwrap();
        assert_eq!(head.content_length, Some(0));
        assert!(!head.keep_alive);
    }

    #[test]
    fn chunked_and_absent_lengths_are_unknown() {
        let chunked = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: gzip, chunked\r\n\r\n";
        let (head, _) = ResponseHead::parse(chunked).unwrap().unwrap();
        assert_eq!(head.content_length, None);

        let absent = b"HTTP/1.1 200 OK\r\nServer: test\r\n\r\n";
        let (head, _) = ResponseHead::parse(absent).unwrap().unwrap();
        assert_eq!(head.content_length, None);
    }

    #[test]
    fn bodyless_statuses_have_zero_length() {
        let raw = b"HTTP/1.1 204 No Content\r\n\r\n";
        let (head, _) = ResponseHead::parse(raw).unwrap().unwrap();
        assert_eq!(head.content_length, Some(0));
    }

    #[test]
    fn http10_defaults_to_close() {
        let raw = b"HTTP/1.0 200 OK\r\nContent-Length: 0\r\n\r\n";
        let (head, _) = ResponseHead::parse(raw).unwrap().unwrap();
        assert!(!head.keep_alive);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            ResponseHead::parse(b"SMTP ready\r\n\r\n"),
            Err(ResponseError::StatusLine(_))
        ));
        assert!(matches!(
            ResponseHead::parse(b"HTTP/1.1 200 OK\r\nContent-Length: ten\r\n\r\n"),
            Err(ResponseError::ContentLength(_))
        ));
        assert_eq!(
            ResponseHead::parse(b"HTTP/1.1 200 OK\r\nContent-Length: 1\r\nContent-Length: 2\r\n\r\n"),
            Err(ResponseError::ConflictingLength)
        );
    }

    #[test]
    fn non_success_is_reported() {
        let raw = b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\n\r\n";
        let (head, _) = ResponseHead::parse(raw).unwrap().unwrap();
        assert!(!head.is_success());
    }
}
