//! Request header generation.
//!
//! The engine talks to a [`HeaderGenerator`] only; [`PostHeader`] is the
//! stock implementation. It renders everything up to and including
//! `Content-Length: ` once, caches that prefix, and on each render appends
//! only the body size and the blank line. Fields that change the layout
//! (compression marker, connection persistence, anything else set through
//! `set_field`) mark the prefix dirty; setting a field to the value it
//! already has does not.

use thiserror::Error;

/// Field carrying the device identifier.
pub const DEVICE_FIELD: &str = "X-Device-Mac";

/// Field marking a zlib-compressed body.
pub const COMPRESSION_FIELD: &str = "X-Pipe-Zip";

/// Problems with a requested header field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("header {0:?} contains a line break or is empty")]
    InvalidToken(String),

    #[error("header {0:?} is managed by the generator")]
    Reserved(String),
}

/// Renders the header bytes placed in front of each request body.
pub trait HeaderGenerator {
    /// Set the request line.
    fn set_request(&mut self, method: &str, uri: &str, version: &str) -> Result<(), HeaderError>;

    /// Set (`Some`) or remove (`None`) a header field.
    fn set_field(&mut self, name: &str, value: Option<&str>) -> Result<(), HeaderError>;

    /// Header bytes for a body of `body_size` bytes, ending with the blank
    /// line. Identical inputs produce identical bytes.
    fn render(&mut self, body_size: usize) -> &[u8];
}

fn check_token(token: &str) -> Result<(), HeaderError> {
    if token.bytes().any(|b| b == b'\r' || b == b'\n') {
        return Err(HeaderError::InvalidToken(token.to_string()));
    }
    Ok(())
}

/// The stock POST header.
#[derive(Debug, Clone)]
pub struct PostHeader {
    method: String,
    uri: String,
    version: String,
    host: String,
    user_agent: String,
    device_id: String,
    compressed: bool,
    persistent: bool,
    extra: Vec<(String, String)>,
    rendered: Vec<u8>,
    prefix_len: usize,
    dirty: bool,
    prefix_builds: u64,
}

impl Default for PostHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl PostHeader {
    pub fn new() -> Self {
        Self {
            method: "POST".to_string(),
            uri: "/".to_string(),
            version: "HTTP/1.1".to_string(),
            host: String::new(),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            device_id: String::new(),
            compressed: false,
            persistent: true,
            extra: Vec::new(),
            rendered: Vec::new(),
            prefix_len: 0,
            dirty: true,
            prefix_builds: 0,
        }
    }

    /// Number of times the cached prefix has been rebuilt.
    pub fn prefix_builds(&self) -> u64 {
        self.prefix_builds
    }

    fn update(slot: &mut String, value: &str, dirty: &mut bool) {
        if slot != value {
            *slot = value.to_string();
            *dirty = true;
        }
    }

    fn update_flag(slot: &mut bool, value: bool, dirty: &mut bool) {
        if *slot != value {
            *slot = value;
            *dirty = true;
        }
    }

    fn build_prefix(&mut self) {
        let mut prefix = format!("{} {} {}\r\n", self.method, self.uri, self.version);
        if !self.host.is_empty() {
            prefix.push_str(&format!("Host: {}\r\n", self.host));
        }
        prefix.push_str(&format!("User-Agent: {}\r\n", self.user_agent));
        prefix.push_str("Accept: */*\r\n");
        if !self.device_id.is_empty() {
            prefix.push_str(&format!("{DEVICE_FIELD}: {}\r\n", self.device_id));
        }
        if self.compressed {
            prefix.push_str(&format!("{COMPRESSION_FIELD}: 1\r\n"));
        }
        if !self.persistent {
            prefix.push_str("Connection: close\r\n");
        }
        for (name, value) in &self.extra {
            prefix.push_str(&format!("{name}: {value}\r\n"));
        }
        prefix.push_str("Content-Length: ");

        self.rendered.clear();
        self.rendered.extend_from_slice(prefix.as_bytes());
        self.prefix_len = self.rendered.len();
        self.dirty = false;
        self.prefix_builds += 1;
    }
}

impl HeaderGenerator for PostHeader {
    fn set_request(&mut self, method: &str, uri: &str, version: &str) -> Result<(), HeaderError> {
        for token in [method, uri, version] {
            check_token(token)?;
            if token.is_empty() || token.contains(' ') {
                return Err(HeaderError::InvalidToken(token.to_string()));
            }
        }
        Self::update(&mut self.method, method, &mut self.dirty);
        Self::update(&mut self.uri, uri, &mut self.dirty);
        Self::update(&mut self.version, version, &mut self.dirty);
        Ok(())
    }

    fn set_field(&mut self, name: &str, value: Option<&str>) -> Result<(), HeaderError> {
        if name.is_empty() || name.contains(':') {
            return Err(HeaderError::InvalidToken(name.to_string()));
        }
        check_token(name)?;
        if let Some(value) = value {
            check_token(value)?;
        }

        if name.eq_ignore_ascii_case("Content-Length") {
            return Err(HeaderError::Reserved(name.to_string()));
        } else if name.eq_ignore_ascii_case("Host") {
            Self::update(&mut self.host, value.unwrap_or(""), &mut self.dirty);
        } else if name.eq_ignore_ascii_case("User-Agent") {
            Self::update(&mut self.user_agent, value.unwrap_or(""), &mut self.dirty);
        } else if name.eq_ignore_ascii_case(DEVICE_FIELD) {
            Self::update(&mut self.device_id, value.unwrap_or(""), &mut self.dirty);
        } else if name.eq_ignore_ascii_case(COMPRESSION_FIELD) {
            Self::update_flag(&mut self.compressed, value.is_some(), &mut self.dirty);
        } else if name.eq_ignore_ascii_case("Connection") {
            let persistent = !value.is_some_and(|v| v.eq_ignore_ascii_case("close"));
            Self::update_flag(&mut self.persistent, persistent, &mut self.dirty);
        } else {
            let position = self
                .extra
                .iter()
                .position(|(n, _)| n.eq_ignore_ascii_case(name));
            match (position, value) {
                (Some(i), Some(v)) if self.extra[i].1 != v => {
                    self.extra[i].1 = v.to_string();
                    self.dirty = true;
                }
                (Some(_), Some(_)) => {}
                (Some(i), None) => {
                    self.extra.remove(i);
                    self.dirty = true;
                }
                (None, Some(v)) => {
                    self.extra.push((name.to_string(), v.to_string()));
                    self.dirty = true;
                }
                (None, None) => {}
            }
        }
        Ok(())
    }

    fn render(&mut self, body_size: usize) -> &[u8] {
        if self.dirty {
            self.build_prefix();
        }
        self.rendered.truncate(self.prefix_len);
        self.rendered
            .extend_from_slice(format!("{body_size}\r\n\r\n").as_bytes());
        &self.rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> PostHeader {
        let mut header = PostHeader::new();
        header.set_request("POST", "/ingest", "HTTP/1.1").unwrap();
        header.set_field("Host", Some("collector:8080")).unwrap();
        header.set_field(DEVICE_FIELD, Some("a0b1c2d3e4f5")).unwrap();
        header
    }

    #[test]
    fn renders_complete_header() {
        let mut header = header();
        let text = String::from_utf8(header.render(42).to_vec()).unwrap();
        assert!(text.starts_with("POST /ingest HTTP/1.1\r\nHost: collector:8080\r\n"));
        assert!(text.contains("X-Device-Mac: a0b1c2d3e4f5\r\n"));
        assert!(!text.contains(COMPRESSION_FIELD));
        assert!(!text.contains("Connection:"));
        assert!(text.ends_with("Content-Length: 42\r\n\r\n"));
    }

    #[test]
    fn render_is_idempotent() {
        let mut header = header();
        let first = header.render(1024).to_vec();
        let second = header.render(1024).to_vec();
        assert_eq!(first, second);
        assert_eq!(header.prefix_builds(), 1);

        let other = header.render(7).to_vec();
        assert!(other.ends_with(b"Content-Length: 7\r\n\r\n"));
        assert_eq!(header.prefix_builds(), 1);
    }

    #[test]
    fn framing_flags_invalidate_exactly_once() {
        let mut header = header();
        header.render(10);
        assert_eq!(header.prefix_builds(), 1);

        header.set_field(COMPRESSION_FIELD, Some("1")).unwrap();
        header.set_field(COMPRESSION_FIELD, Some("1")).unwrap();
        let text = String::from_utf8(header.render(10).to_vec()).unwrap();
        assert!(text.contains("X-Pipe-Zip: 1\r\n"));
        assert_eq!(header.prefix_builds(), 2);

        header.render(10);
        assert_eq!(header.prefix_builds(), 2);

        header.set_field("Connection", Some("close")).unwrap();
        let text = String::from_utf8(header.render(10).to_vec()).unwrap();
        assert!(text.contains("Connection: close\r\n"));
        assert_eq!(header.prefix_builds(), 3);

        // Unchanged values leave the cache alone.
        header.set_field("connection", Some("CLOSE")).unwrap();
        header.set_field(COMPRESSION_FIELD, Some("1")).unwrap();
        header.render(10);
        assert_eq!(header.prefix_builds(), 3);

        header.set_field(COMPRESSION_FIELD, None).unwrap();
        let text = String::from_utf8(header.render(10).to_vec()).unwrap();
        assert!(!text.contains(COMPRESSION_FIELD));
        assert_eq!(header.prefix_builds(), 4);
    }

    #[test]
    fn extra_fields_are_upserted() {
        let mut header = header();
        header.set_field("X-Source", Some("tv")).unwrap();
        header.set_field("x-source", Some("box")).unwrap();
        let text = String::from_utf8(header.render(0).to_vec()).unwrap();
        assert!(text.contains("X-Source: box\r\n"));
        assert!(!text.contains("tv"));

        header.set_field("X-Source", None).unwrap();
        let text = String::from_utf8(header.render(0).to_vec()).unwrap();
        assert!(!text.contains("X-Source"));
    }

    #[test]
    fn rejects_injection_and_reserved_fields() {
        let mut header = header();
        assert!(header.set_field("X-Evil", Some("a\r\nb: c")).is_err());
        assert!(header.set_field("Bad:Name", Some("v")).is_err());
        assert_eq!(
            header.set_field("content-length", Some("3")),
            Err(HeaderError::Reserved("content-length".into()))
        );
        assert!(header.set_request("POST", "/a b", "HTTP/1.1").is_err());
    }
}
