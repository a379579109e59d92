//! HTTP probe implementation.

use std::time::Duration;
use super::ProbeError;

/// Longest body excerpt carried in an unexpected-status error.
const BODY_EXCERPT_CHARS: usize = 200;

/// Run an HTTP GET probe against the given address.
///
/// Returns the response status when it equals `expected_status`.
pub async fn run_http_probe(
    client: &reqwest::Client,
    address: &str,
    expected_status: u16,
    timeout: Duration,
) -> Result<u16, ProbeError> {
    let url = if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    };

    let response = client
        .get(&url)
        .header(reqwest::header::ACCEPT, "application/json,text/plain,*/*")
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| classify(e, timeout))?;

    let status = response.status().as_u16();

    // Read the full body to measure complete transfer time
    let body = response.text().await.map_err(|e| classify(e, timeout))?;

    if status != expected_status {
        return Err(ProbeError::UnexpectedStatus {
            expected: expected_status,
            actual: status,
            body: excerpt(&body),
        });
    }

    Ok(status)
}

fn classify(e: reqwest::Error, timeout: Duration) -> ProbeError {
    if e.is_timeout() {
        ProbeError::Timeout(timeout)
    } else if e.is_builder() {
        ProbeError::InvalidAddress(e.to_string())
    } else {
        ProbeError::Network(e.to_string())
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(BODY_EXCERPT_CHARS).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `response` verbatim to every connection.
    async fn serve(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { break };
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        addr.to_string()
    }

    #[tokio::test]
    async fn test_http_probe_expected_status() {
        let addr = serve("HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok").await;
        let client = reqwest::Client::new();

        let status = run_http_probe(&client, &addr, 200, Duration::from_secs(2)).await;
        assert_eq!(status.unwrap(), 200);
    }

    #[tokio::test]
    async fn test_http_probe_unexpected_status() {
        let addr = serve(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 4\r\nConnection: close\r\n\r\ndown",
        )
        .await;
        let client = reqwest::Client::new();

        let err = run_http_probe(&client, &format!("http://{}/health", addr), 200, Duration::from_secs(2))
            .await
            .unwrap_err();
        match err {
            ProbeError::UnexpectedStatus { expected, actual, body } => {
                assert_eq!(expected, 200);
                assert_eq!(actual, 503);
                assert_eq!(body, "down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_http_probe_timeout() {
        // Accepts but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = reqwest::Client::new();
        let err = run_http_probe(&client, &addr.to_string(), 200, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Timeout(_)), "got {err}");
    }

    #[tokio::test]
    async fn test_http_probe_invalid_url() {
        let client = reqwest::Client::new();
        let result = run_http_probe(&client, "http://256.256.256.256", 200, Duration::from_millis(100)).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(500);
        let cut = excerpt(&long);
        assert_eq!(cut.len(), BODY_EXCERPT_CHARS + 3);
        assert!(cut.ends_with("..."));
        assert_eq!(excerpt("  short \n"), "short");
    }
}
