// Server loop module
// Accepts connections until shutdown, then drains active ones

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

use super::connection::accept_connection;
use super::signal::SignalHandler;
use crate::config;
use crate::logger;

const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Accept loop
///
/// Returns once shutdown was requested and either every connection has
/// finished or `performance.shutdown_grace_secs` has passed. The result is
/// the number of connections still open at that point. Open connections are
/// told to finish their current request and close.
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<config::AppState>,
    signals: Arc<SignalHandler>,
) -> usize {
    let active_connections = Arc::new(AtomicUsize::new(0));
    let (drain_tx, drain_rx) = watch::channel(false);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections, &drain_rx);
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            () = signals.shutdown.notified() => break,
        }
    }

    // Stop accepting before draining
    drop(listener);
    drain_tx.send_replace(true);
    logger::log_shutdown_started(active_connections.load(Ordering::SeqCst));

    let grace = Duration::from_secs(state.config.performance.shutdown_grace_secs);
    let drained = tokio::time::timeout(grace, async {
        while active_connections.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(DRAIN_POLL).await;
        }
    })
    .await;

    let remaining = if drained.is_ok() {
        0
    } else {
        active_connections.load(Ordering::SeqCst)
    };
    logger::log_shutdown_complete(remaining);
    remaining
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppState, Config};
    use crate::error::TransportError;
    use crate::gateway::{routes, FallbackCatalog, FetchOutcome, Gateway, Upstream, UpstreamRequest};
    use crate::server::create_listener;
    use async_trait::async_trait;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    struct Unreachable;

    #[async_trait]
    impl Upstream for Unreachable {
        async fn fetch(&self, _request: UpstreamRequest) -> FetchOutcome {
            FetchOutcome::TransportError(TransportError::Connect("refused".to_string()))
        }
    }

    fn state(grace_secs: u64) -> Arc<AppState> {
        let gateway = Gateway::new(
            routes::site_routes(),
            Arc::new(Unreachable),
            Arc::new(FallbackCatalog::bundled().unwrap()),
        )
        .unwrap();
        let mut config = Config::load_from("does-not-exist-gateway-config").unwrap();
        config.performance.shutdown_grace_secs = grace_secs;
        Arc::new(AppState::new(config, Arc::new(gateway)))
    }

    #[tokio::test]
    async fn serves_fallback_over_tcp_then_shuts_down() {
        let listener = create_listener("127.0.0.1:0".parse().unwrap(), 16).unwrap();
        let addr = listener.local_addr().unwrap();
        let signals = Arc::new(SignalHandler::new());
        let server = tokio::spawn(start_server_loop(listener, state(1), Arc::clone(&signals)));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /api/solutions.json HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let text = String::from_utf8_lossy(&raw).to_lowercase();

        assert!(text.starts_with("http/1.1 200"));
        assert!(text.contains("x-using-fallback: true"));
        assert!(text.contains("content-type: application/json"));

        signals.trigger();
        let remaining = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn idle_keep_alive_connection_does_not_hold_shutdown() {
        let listener = create_listener("127.0.0.1:0".parse().unwrap(), 16).unwrap();
        let addr = listener.local_addr().unwrap();
        let signals = Arc::new(SignalHandler::new());
        let server = tokio::spawn(start_server_loop(listener, state(5), Arc::clone(&signals)));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /healthz HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut raw = Vec::new();
        let mut chunk = [0u8; 1024];
        while !String::from_utf8_lossy(&raw).contains(r#"{"status":"ok"}"#) {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before the response was complete");
            raw.extend_from_slice(&chunk[..n]);
        }

        // The client keeps the connection open and idle
        let started = std::time::Instant::now();
        signals.trigger();
        let remaining = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(remaining, 0);
        assert!(started.elapsed() < Duration::from_secs(2));

        // Server side closed the connection
        let n = tokio::time::timeout(Duration::from_secs(1), stream.read(&mut chunk))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }
}
