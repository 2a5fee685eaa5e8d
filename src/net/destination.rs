//! Destination URL parsing.

use std::fmt;

use thiserror::Error;
use url::Url;

/// Problems with a destination URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DestinationError {
    #[error("malformed URL {url:?}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("unsupported scheme {0:?}, only http is supported")]
    UnsupportedScheme(String),

    #[error("URL {0:?} has no host")]
    MissingHost(String),
}

/// Parsed `http://host[:port]/path` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    host: String,
    port: u16,
    path: String,
}

impl Destination {
    /// Parse a destination; a missing scheme means `http`.
    pub fn parse(input: &str) -> Result<Self, DestinationError> {
        let input = input.trim();
        let candidate = if input.contains("://") {
            input.to_string()
        } else {
            format!("http://{input}")
        };

        let url = Url::parse(&candidate).map_err(|e| DestinationError::Malformed {
            url: input.to_string(),
            reason: e.to_string(),
        })?;

        if !url.scheme().eq_ignore_ascii_case("http") {
            return Err(DestinationError::UnsupportedScheme(url.scheme().to_string()));
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| DestinationError::MissingHost(input.to_string()))?
            .to_string();
        let port = url.port_or_known_default().unwrap_or(80);

        let mut path = url.path().to_string();
        if path.is_empty() {
            path.push('/');
        }
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self { host, port, path })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Request target (path plus query).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Value for the `Host` header; the port is omitted when it is the default.
    pub fn authority(&self) -> String {
        if self.port == 80 {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}:{}{}", self.host, self.port, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_url() {
        let d = Destination::parse("http://collector.local:8080/ingest?src=tv").unwrap();
        assert_eq!(d.host(), "collector.local");
        assert_eq!(d.port(), 8080);
        assert_eq!(d.path(), "/ingest?src=tv");
        assert_eq!(d.authority(), "collector.local:8080");
    }

    #[test]
    fn defaults_port_and_path() {
        let d = Destination::parse("http://collector.local").unwrap();
        assert_eq!(d.port(), 80);
        assert_eq!(d.path(), "/");
        assert_eq!(d.authority(), "collector.local");
    }

    #[test]
    fn scheme_is_optional() {
        let d = Destination::parse("10.0.0.7:9000/logs").unwrap();
        assert_eq!(d.host(), "10.0.0.7");
        assert_eq!(d.port(), 9000);
        assert_eq!(d.path(), "/logs");
    }

    #[test]
    fn rejects_other_schemes() {
        assert_eq!(
            Destination::parse("https://collector.local/"),
            Err(DestinationError::UnsupportedScheme("https".into()))
        );
        assert!(Destination::parse("ftp://collector.local/").is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            Destination::parse("http://"),
            Err(DestinationError::Malformed { .. })
        ));
    }
}
