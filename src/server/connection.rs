// Connection handling module
// Accepts a single TCP connection and serves it with hyper's HTTP/1 driver

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::AppState;
use crate::handler;
use crate::logger;

/// Accept and process a connection, enforcing `max_connections`.
///
/// # Arguments
///
/// * `stream` - The TCP stream to handle
/// * `peer_addr` - The peer's socket address
/// * `state` - Shared application state
/// * `conn_counter` - Active connection counter
/// * `shutdown` - Flips to `true` when the server stops accepting
pub fn accept_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
    conn_counter: &Arc<AtomicUsize>,
    shutdown: &watch::Receiver<bool>,
) {
    // Increment first, then check, so concurrent accepts cannot both slip under the limit
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected."
            ));
            drop(stream);
            return;
        }
    }

    logger::log_connection_accepted(&peer_addr);

    handle_connection(
        stream,
        peer_addr,
        Arc::clone(state),
        Arc::clone(conn_counter),
        shutdown.clone(),
    );
}

/// Request activity on one connection, used to detect keep-alive idleness
struct Activity {
    opened: Instant,
    in_flight: AtomicUsize,
    // Milliseconds after `opened` at which the last request finished
    last_done_ms: AtomicU64,
}

impl Activity {
    fn new() -> Self {
        Self {
            opened: Instant::now(),
            in_flight: AtomicUsize::new(0),
            last_done_ms: AtomicU64::new(0),
        }
    }

    fn begin(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    fn end(&self) {
        let elapsed = u64::try_from(self.opened.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_done_ms.store(elapsed, Ordering::SeqCst);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    /// When the connection becomes idle; `None` while a request is being served
    fn idle_deadline(&self, keep_alive: Duration) -> Option<Instant> {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            return None;
        }
        let last_done = Duration::from_millis(self.last_done_ms.load(Ordering::SeqCst));
        Some(self.opened + last_done + keep_alive)
    }
}

/// Serve one connection in a spawned task.
///
/// Header reads are bounded by `read_timeout`. A keep-alive connection with
/// no request for `keep_alive_timeout` seconds is closed, as is every
/// connection once shutdown begins; in both cases an in-flight response is
/// finished first, for at most `write_timeout` seconds. The counter is
/// decremented when the task ends.
fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
    conn_counter: Arc<AtomicUsize>,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);

        let performance = &state.config.performance;
        let keep_alive = Duration::from_secs(performance.keep_alive_timeout);
        let write_timeout = Duration::from_secs(performance.write_timeout);

        let mut builder = http1::Builder::new();
        builder.keep_alive(!keep_alive.is_zero());
        if performance.read_timeout > 0 {
            builder.timer(TokioTimer::new());
            builder.header_read_timeout(Duration::from_secs(performance.read_timeout));
        }

        let activity = Arc::new(Activity::new());
        let service_state = Arc::clone(&state);
        let service_activity = Arc::clone(&activity);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req| {
                let state = Arc::clone(&service_state);
                let activity = Arc::clone(&service_activity);
                async move {
                    activity.begin();
                    let response = handler::handle_request(req, state, peer_addr).await;
                    activity.end();
                    response
                }
            }),
        );
        let mut conn = std::pin::pin!(conn);

        let mut closing_since: Option<Instant> = None;
        let mut shutdown_seen = *shutdown.borrow();
        if shutdown_seen {
            conn.as_mut().graceful_shutdown();
            closing_since = Some(Instant::now());
        }

        loop {
            let idle_check = activity
                .idle_deadline(keep_alive)
                .unwrap_or_else(|| Instant::now() + keep_alive);
            let force_close = closing_since.map_or_else(Instant::now, |t| t + write_timeout);

            tokio::select! {
                result = conn.as_mut() => {
                    if let Err(err) = result {
                        logger::log_connection_error(&err);
                    }
                    break;
                }

                changed = shutdown.changed(), if !shutdown_seen => {
                    shutdown_seen = true;
                    if changed.is_ok() && closing_since.is_none() {
                        conn.as_mut().graceful_shutdown();
                        closing_since = Some(Instant::now());
                    }
                }

                () = tokio::time::sleep_until(idle_check), if closing_since.is_none() && !keep_alive.is_zero() => {
                    if activity.idle_deadline(keep_alive).is_some_and(|d| d <= Instant::now()) {
                        logger::log_debug(&format!(
                            "Closing idle connection from {peer_addr} after {} seconds",
                            keep_alive.as_secs()
                        ));
                        conn.as_mut().graceful_shutdown();
                        closing_since = Some(Instant::now());
                    }
                }

                () = tokio::time::sleep_until(force_close), if closing_since.is_some() => {
                    logger::log_debug(&format!(
                        "Connection from {peer_addr} dropped after {} seconds of closing",
                        write_timeout.as_secs()
                    ));
                    break;
                }
            }
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}
