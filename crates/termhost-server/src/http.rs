//! HTTP dispatch for the terminal slot.
//!
//! Three GET routes map onto the slot operations. Every response carries
//! `Content-Type: text/plain; charset=utf-8` and
//! `X-Content-Type-Options: nosniff`; bodies are either empty, a short
//! error message, or the encoded screen snapshot.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{error, info};

use termhost::codec;
use termhost::term::{Key, TermSlot};
use termhost::vterm::Modifier;
use termhost::Error;

/// Serve the slot on 127.0.0.1 until SIGINT/SIGTERM.
pub async fn serve(port: u16, slot: Arc<TermSlot>) -> std::io::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let listener = TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router(slot))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

fn router(slot: Arc<TermSlot>) -> Router {
    Router::new()
        .route("/keyboard", get(keyboard))
        .route("/screen", get(screen))
        .route("/stop", get(stop))
        .with_state(slot)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

/// A reply with the fixed header set of this service.
struct ServiceResponse {
    status: StatusCode,
    body: Vec<u8>,
}

impl ServiceResponse {
    fn ok(body: Vec<u8>) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    fn text(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: message.into().into_bytes(),
        }
    }

    fn internal_error() -> Self {
        Self::text(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }
}

impl IntoResponse for ServiceResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response.headers_mut().insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
        response
    }
}

async fn keyboard(
    State(slot): State<Arc<TermSlot>>,
    Query(params): Query<HashMap<String, String>>,
) -> ServiceResponse {
    let key = match params.get("key").filter(|token| !token.is_empty()) {
        Some(token) => Key::new(token.clone()),
        None => {
            return ServiceResponse::text(StatusCode::BAD_REQUEST, r#"missing parameter "key""#)
        }
    };

    let modifier = match params.get("mod").filter(|raw| !raw.is_empty()) {
        None => Modifier::empty(),
        Some(raw) => match raw.parse::<u8>() {
            Ok(bits) => Modifier::from_bits_truncate(bits),
            Err(err) => {
                return ServiceResponse::text(
                    StatusCode::BAD_REQUEST,
                    format!(r#"failed to parse parameter "mod": {err}"#),
                )
            }
        },
    };

    match run_blocking(move || slot.keyboard(&key, modifier)).await {
        Ok(()) => ServiceResponse::ok(Vec::new()),
        Err(err @ Error::InvalidKey) => {
            ServiceResponse::text(StatusCode::BAD_REQUEST, err.to_string())
        }
        Err(err) => {
            error!("keyboard request failed: {err}");
            ServiceResponse::internal_error()
        }
    }
}

async fn screen(State(slot): State<Arc<TermSlot>>) -> ServiceResponse {
    match run_blocking(move || slot.capture()).await {
        Ok(shot) => ServiceResponse::ok(codec::encode_screen_body(&shot)),
        Err(err) => {
            error!("screen request failed: {err}");
            ServiceResponse::internal_error()
        }
    }
}

async fn stop(State(slot): State<Arc<TermSlot>>) -> ServiceResponse {
    run_blocking(move || slot.stop()).await;
    ServiceResponse::ok(Vec::new())
}

/// Slot operations block (they may start a process); keep them off the
/// async workers. Panics in the slot are fatal and propagate.
async fn run_blocking<T: Send + 'static>(task: impl FnOnce() -> T + Send + 'static) -> T {
    match tokio::task::spawn_blocking(task).await {
        Ok(value) => value,
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => panic!("blocking task failed: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termhost::pty::{Cmd, MockTerminal, Size};
    use termhost::term::TermConfig;

    fn mock_slot() -> (Arc<TermSlot>, MockTerminal) {
        let mock = MockTerminal::new();
        let slot = Arc::new(TermSlot::new(TermConfig {
            open: mock.opener(),
            size: Size::new(3, 4),
            cmd: Cmd {
                path: "shell".to_string(),
                args: Vec::new(),
            },
        }));
        (slot, mock)
    }

    fn query(pairs: &[(&str, &str)]) -> Query<HashMap<String, String>> {
        Query(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    #[tokio::test]
    async fn keyboard_requires_key_parameter() {
        let (slot, _mock) = mock_slot();
        let response = keyboard(State(slot), query(&[])).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body, br#"missing parameter "key""#);
    }

    #[tokio::test]
    async fn keyboard_rejects_unparseable_mod() {
        let (slot, _mock) = mock_slot();
        let response = keyboard(State(slot), query(&[("key", "a"), ("mod", "x")])).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert!(response.body.starts_with(br#"failed to parse parameter "mod""#));
    }

    #[tokio::test]
    async fn keyboard_rejects_unknown_key() {
        let (slot, _mock) = mock_slot();
        let response = keyboard(State(slot), query(&[("key", "NoSuchKey")])).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body, b"invalid key");
    }

    #[tokio::test]
    async fn keyboard_accepts_named_key() {
        let (slot, mock) = mock_slot();
        let response = keyboard(State(Arc::clone(&slot)), query(&[("key", "Enter")])).await;
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.body.is_empty());

        // The encoded key reaches the mock PTY through the output pump.
        let computer = mock.computer();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(1);
        let mut got = Vec::new();
        while got.is_empty() && std::time::Instant::now() < deadline {
            got = computer.take_output();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(got, b"\r");
        slot.stop();
    }

    #[tokio::test]
    async fn keyboard_reports_start_failures() {
        let mock = MockTerminal::with_failures(termhost::pty::MockFailures {
            open: true,
            ..Default::default()
        });
        let slot = Arc::new(TermSlot::new(TermConfig {
            open: mock.opener(),
            size: Size::new(3, 4),
            cmd: Cmd::default(),
        }));

        let response = keyboard(State(slot), query(&[("key", "a")])).await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body, b"internal server error");
    }

    #[tokio::test]
    async fn screen_returns_signed_snapshot() {
        let (slot, _mock) = mock_slot();
        let response = screen(State(Arc::clone(&slot))).await;
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.body.starts_with(b"%SWTSCRN"));
        slot.stop();
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (slot, _mock) = mock_slot();
        let first = stop(State(Arc::clone(&slot))).await;
        assert_eq!(first.status, StatusCode::OK);
        let second = stop(State(slot)).await;
        assert_eq!(second.status, StatusCode::OK);
    }

    #[test]
    fn responses_carry_plaintext_headers() {
        let response = ServiceResponse::ok(b"body".to_vec()).into_response();
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).map(|v| v.as_bytes()),
            Some(b"text/plain; charset=utf-8".as_slice())
        );
        assert_eq!(
            response
                .headers()
                .get(header::X_CONTENT_TYPE_OPTIONS)
                .map(|v| v.as_bytes()),
            Some(b"nosniff".as_slice())
        );
    }
}
