// Server loop module
// Accepts connections until the shutdown future resolves, then drains

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Run the accept loop on the current `LocalSet`.
///
/// Once `shutdown` resolves the listener is closed, open connections are told
/// to finish, and the call returns when they are gone or the grace period
/// (`performance.shutdown_grace`) has elapsed.
pub async fn start_server_loop<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F)
where
    F: Future<Output = ()>,
{
    let active_connections = Arc::new(AtomicUsize::new(0));
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections, &stop_rx);
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }
            () = &mut shutdown => break,
        }
    }

    drop(listener);
    // Receivers live in the connection tasks; none left is fine
    let _ = stop_tx.send(true);

    let grace = Duration::from_secs(state.config.performance.shutdown_grace);
    let deadline = tokio::time::Instant::now() + grace;
    loop {
        let remaining = active_connections.load(Ordering::SeqCst);
        if remaining == 0 {
            logger::log_info("All connections closed");
            break;
        }
        if tokio::time::Instant::now() >= deadline {
            logger::log_warning(&format!(
                "Shutdown grace period elapsed with {remaining} connection(s) still open"
            ));
            break;
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendKind, Config};
    use crate::persist::{MemoryBackend, SharedBackend};
    use crate::server::create_listener;
    use crate::store::Registry;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn test_state() -> Arc<AppState> {
        let mut config = Config::load_from("no/such/config").unwrap();
        config.storage.backend = BackendKind::Memory;
        config.logging.access_log = false;
        let backend: SharedBackend = Arc::new(MemoryBackend::new());
        let registry = Registry::build(&config.resources, Default::default(), &backend).unwrap();
        Arc::new(AppState::new(config, registry, backend))
    }

    async fn roundtrip(addr: std::net::SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    fn post(path: &str, body: &str) -> String {
        format!(
            "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    #[tokio::test]
    async fn test_serves_requests_and_shuts_down() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let listener = create_listener("127.0.0.1:0".parse().unwrap(), 16).unwrap();
                let addr = listener.local_addr().unwrap();
                let (tx, rx) = tokio::sync::oneshot::channel::<()>();
                let server = tokio::task::spawn_local(start_server_loop(
                    listener,
                    test_state(),
                    async {
                        let _ = rx.await;
                    },
                ));

                let created = roundtrip(addr, &post("/users", r#"{"name":"A","email":"a@x.com"}"#)).await;
                assert!(created.starts_with("HTTP/1.1 201"), "{created}");
                assert!(created.contains(r#""message":"User added""#));
                assert!(created.to_ascii_lowercase().contains("server: crud-server/0.1"));

                let broken = roundtrip(addr, &post("/users", "{oops")).await;
                assert!(broken.starts_with("HTTP/1.1 400"), "{broken}");

                let listed = roundtrip(
                    addr,
                    "GET /users HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
                )
                .await;
                assert!(listed.starts_with("HTTP/1.1 200"), "{listed}");
                assert!(listed.contains(r#""email":"a@x.com""#));

                let missing = roundtrip(
                    addr,
                    "GET /nothing HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
                )
                .await;
                assert!(missing.starts_with("HTTP/1.1 404"));
                assert!(missing.ends_with("404 Not Found"));

                tx.send(()).unwrap();
                server.await.unwrap();
                assert!(TcpStream::connect(addr).await.is_err());
            })
            .await;
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let mut config = Config::load_from("no/such/config").unwrap();
                config.http.max_body_size = 16;
                config.logging.access_log = false;
                let backend: SharedBackend = Arc::new(MemoryBackend::new());
                let registry =
                    Registry::build(&config.resources, Default::default(), &backend).unwrap();
                let state = Arc::new(AppState::new(config, registry, backend));

                let listener = create_listener("127.0.0.1:0".parse().unwrap(), 16).unwrap();
                let addr = listener.local_addr().unwrap();
                let (tx, rx) = tokio::sync::oneshot::channel::<()>();
                let server = tokio::task::spawn_local(start_server_loop(listener, state, async {
                    let _ = rx.await;
                }));

                // Rejected on the declared length alone, before any body is sent
                let response = roundtrip(
                    addr,
                    "POST /users HTTP/1.1\r\nHost: localhost\r\nContent-Length: 4096\r\n\
                     Connection: close\r\n\r\n",
                )
                .await;
                assert!(response.starts_with("HTTP/1.1 413"), "{response}");
                assert!(response.contains("Payload too large"));

                tx.send(()).unwrap();
                server.await.unwrap();
            })
            .await;
    }
}
