//! Startup orchestration.
//!
//! # Responsibilities
//! - Merge the config file and command-line flags, then validate
//! - Discover the device identifier when none is configured
//! - Resolve the destination host once
//! - Build the session over standard input and TCP
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Nothing touches the network until the configuration is known good

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use tokio::io::Stdin;

use crate::cli::Cli;
use crate::config::loader::{load_config, validate};
use crate::config::PipeConfig;
use crate::error::PipeError;
use crate::http::PostHeader;
use crate::net::{Destination, TcpConnector};
use crate::pipe::Session;

/// Where Linux exposes network interfaces.
pub const SYS_CLASS_NET: &str = "/sys/class/net";

/// Device identifier used when no interface address can be found.
pub const FALLBACK_DEVICE_ID: &str = "000000000000";

/// Build the effective configuration: file (if any), then flags, then the
/// device identifier, then validation.
pub fn resolve_config(cli: &Cli) -> Result<PipeConfig, PipeError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => PipeConfig::default(),
    };
    cli.apply(&mut config);

    if config.device_id.is_none() {
        let discovered = discover_device_id(Path::new(SYS_CLASS_NET));
        if discovered.is_none() {
            tracing::debug!("No interface address found, using fallback device id");
        }
        config.device_id = Some(discovered.unwrap_or_else(|| FALLBACK_DEVICE_ID.to_string()));
    }

    validate(&config)?;
    Ok(config)
}

/// First non-loopback interface hardware address under `net_root`, as 12
/// lowercase hex digits.
pub fn discover_device_id(net_root: &Path) -> Option<String> {
    let mut interfaces: Vec<_> = fs::read_dir(net_root)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .collect();
    interfaces.sort();

    interfaces
        .iter()
        .filter(|path| path.file_name().is_some_and(|name| name != "lo"))
        .filter_map(|path| fs::read_to_string(path.join("address")).ok())
        .find_map(|raw| normalize_mac(&raw))
}

/// `aa:bb:cc:dd:ee:ff` → `aabbccddeeff`. Rejects anything that is not six
/// octets and the all-zero address.
pub fn normalize_mac(raw: &str) -> Option<String> {
    let hex: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ':' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect();

    let valid = hex.len() == 12
        && hex.chars().all(|c| c.is_ascii_hexdigit())
        && hex.chars().any(|c| c != '0');
    valid.then_some(hex)
}

/// Resolve the destination host to a socket address.
pub async fn resolve_destination(destination: &Destination) -> Result<SocketAddr, PipeError> {
    let host = destination.host();
    let resolve_error = |source| PipeError::Resolve {
        host: host.to_string(),
        source,
    };

    let mut addresses = tokio::net::lookup_host((host, destination.port()))
        .await
        .map_err(resolve_error)?;
    addresses.next().ok_or_else(|| {
        resolve_error(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no addresses returned",
        ))
    })
}

/// Build the production session: stdin in, TCP out.
pub async fn build_session(config: &PipeConfig) -> Result<Session<Stdin, TcpConnector>, PipeError> {
    let destination = Destination::parse(&config.destination)?;
    let address = resolve_destination(&destination).await?;
    tracing::debug!(host = destination.host(), %address, "Destination resolved");

    let connector = TcpConnector::new(config.connection.connect_timeout()).with_address(address);
    Session::new(
        config,
        tokio::io::stdin(),
        connector,
        Box::new(PostHeader::new()),
    )
}
