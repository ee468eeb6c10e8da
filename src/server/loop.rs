// Server loop module
// Accepts connections until shutdown is requested, then drains

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{watch, Notify};

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// Upper bound on waiting for in-flight connections after shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Accept loop. Returns once `shutdown` is notified and open connections
/// have closed or `DRAIN_TIMEOUT` elapsed. Idle keep-alive connections are
/// closed right away; in-flight responses are finished first.
#[allow(clippy::ignored_unit_patterns)]
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: Arc<Notify>,
) -> std::io::Result<()> {
    let active_connections = Arc::new(AtomicUsize::new(0));
    let (closing_tx, closing_rx) = watch::channel(false);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections, &closing_rx);
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            _ = shutdown.notified() => {
                logger::log_shutdown(active_connections.load(Ordering::SeqCst));
                break;
            }
        }
    }

    // Stop accepting, then ask open connections to finish and close
    drop(listener);
    closing_tx.send_replace(true);
    drain_connections(&active_connections).await;
    Ok(())
}

async fn drain_connections(active_connections: &AtomicUsize) {
    let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
    while active_connections.load(Ordering::SeqCst) > 0 {
        if tokio::time::Instant::now() >= deadline {
            logger::log_warning(&format!(
                "Drain timeout, {} connections still active",
                active_connections.load(Ordering::SeqCst)
            ));
            return;
        }
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
    logger::log_info("All connections closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::server::create_reusable_listener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn quiet_state(keep_alive_timeout: u64) -> Arc<AppState> {
        let mut cfg = Config::from_defaults().unwrap();
        cfg.performance.keep_alive_timeout = keep_alive_timeout;
        let state = AppState::new(&cfg);
        state.set_access_log(false);
        Arc::new(state)
    }

    /// Send one keep-alive request and read exactly its response
    async fn keep_alive_health(stream: &mut tokio::net::TcpStream) -> String {
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut buf = vec![0u8; 4096];
        let n = stream.read(&mut buf).await.unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    #[tokio::test]
    async fn test_serves_over_tcp_and_stops_on_shutdown() {
        let state = quiet_state(75);
        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());

        let server = tokio::spawn(start_server_loop(listener, state, Arc::clone(&shutdown)));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();
        assert!(raw.starts_with("HTTP/1.1 200 OK"), "{raw}");
        assert!(raw.contains("\"status\":\"healthy\""));

        shutdown.notify_one();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_closes_idle_keep_alive_connections() {
        let state = quiet_state(75);
        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());

        let server = tokio::spawn(start_server_loop(listener, state, Arc::clone(&shutdown)));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let raw = keep_alive_health(&mut stream).await;
        assert!(raw.starts_with("HTTP/1.1 200 OK"), "{raw}");

        let started = std::time::Instant::now();
        shutdown.notify_one();
        server.await.unwrap().unwrap();
        assert!(started.elapsed() < DRAIN_TIMEOUT, "drain waited on an idle connection");

        let mut rest = Vec::new();
        assert_eq!(stream.read_to_end(&mut rest).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_idle_keep_alive_connection_times_out() {
        let state = quiet_state(1);
        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());

        let server = tokio::spawn(start_server_loop(listener, state, Arc::clone(&shutdown)));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let raw = keep_alive_health(&mut stream).await;
        assert!(raw.starts_with("HTTP/1.1 200 OK"), "{raw}");

        let mut rest = Vec::new();
        let closed = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut rest)).await;
        assert_eq!(closed.unwrap().unwrap(), 0);

        shutdown.notify_one();
        server.await.unwrap().unwrap();
    }
}
