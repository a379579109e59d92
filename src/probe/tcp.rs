//! TCP connect probe implementation.

use std::time::Duration;
use tokio::net::TcpStream;
use super::ProbeError;

/// Run a TCP connect probe against a `host:port` address.
///
/// Succeeds once the connection is established; the stream is closed
/// immediately.
pub async fn run_tcp_probe(address: &str, timeout: Duration) -> Result<(), ProbeError> {
    let addr = address.strip_prefix("tcp://").unwrap_or(address);
    if !has_port(addr) {
        return Err(ProbeError::InvalidAddress(format!(
            "expected host:port, got {}",
            address
        )));
    }

    let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| ProbeError::Timeout(timeout))?
        .map_err(|e| ProbeError::Network(format!("failed to connect: {}", e)))?;

    drop(stream);
    Ok(())
}

/// `host:port` with a numeric port; IPv6 hosts in brackets.
pub(crate) fn has_port(addr: &str) -> bool {
    match addr.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}
