//! The axum `Router` for the streamable-HTTP transport (spec.md §4.E):
//! one endpoint, `POST` to send a message in and (optionally) get its
//! response back synchronously, `GET` with `Accept: text/event-stream`
//! to open the upstream SSE channel a session's server-initiated traffic
//! rides on.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::Stream;
use serde_json::Value;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use mcprt_engine::Engine;

use crate::config::HttpConfig;
use crate::error::HttpTransportError;
use crate::session::{HttpSessionTransport, SessionTable};

const SESSION_ID_HEADER: &str = "mcp-session-id";
const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

/// Builds the per-session [`Engine`] the first time a session is created
/// (on `initialize`), registering whatever handlers the role layer
/// (`mcprt-client`/`mcprt-server`) needs before the engine starts reading.
pub type SessionFactory =
    Arc<dyn Fn(Arc<HttpSessionTransport>) -> Arc<Engine> + Send + Sync>;

#[derive(Clone)]
pub struct HttpAppState {
    pub config: Arc<HttpConfig>,
    pub sessions: Arc<SessionTable>,
    pub factory: SessionFactory,
}

/// Build the router and spawn the idle-session eviction sweep.
pub fn build_router(state: HttpAppState) -> Router {
    let endpoint = state.config.endpoint_path.clone();
    let max_body_size = state.config.max_body_size;
    let sweep_interval = state.config.session_idle_timeout / 4;
    let sweep_sessions = state.sessions.clone();
    let sweep_timeout = state.config.session_idle_timeout;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval.max(Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            sweep_sessions.evict_idle(sweep_timeout).await;
        }
    });

    Router::new()
        .route(&endpoint, post(post_handler).get(get_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(max_body_size)),
        )
        .with_state(state)
}

fn host_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(axum::http::header::HOST).and_then(|v| v.to_str().ok())
}

fn check_host(config: &HttpConfig, headers: &HeaderMap) -> Result<(), Response> {
    if config.host_allowed(host_header(headers)) {
        Ok(())
    } else {
        warn!("rejecting request: Host header not in the configured allow-list");
        Err(error_response(
            StatusCode::FORBIDDEN,
            &HttpTransportError::HostNotAllowed,
        ))
    }
}

fn error_response(status: StatusCode, err: &HttpTransportError) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": err.to_string() })),
    )
        .into_response()
}

fn is_initialize_request(message: &Value) -> bool {
    message.get("method").and_then(Value::as_str) == Some("initialize")
        && message.get("id").is_some()
}

/// `POST {endpoint}`: deliver one JSON-RPC message. Requests wait up to
/// `sync_response_timeout` for their own response before falling back to
/// `202 Accepted`, letting the SSE channel carry the eventual reply
/// (spec.md §4.E "POST semantics").
async fn post_handler(
    State(state): State<HttpAppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    if let Err(resp) = check_host(&state.config, &headers) {
        return resp;
    }

    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !content_type.starts_with("application/json") {
        return error_response(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            &HttpTransportError::UnsupportedContentType,
        );
    }

    let message: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(err) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &HttpTransportError::MalformedBody(err.to_string()),
            )
        }
    };

    let session_id_header = headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let (transport, session_id, newly_created) = match session_id_header {
        Some(id) => match state.sessions.get(&id) {
            Some(transport) => (transport, id, false),
            None => {
                return error_response(
                    StatusCode::NOT_FOUND,
                    &HttpTransportError::UnknownSession(id),
                )
            }
        },
        None if is_initialize_request(&message) => {
            let transport = state.sessions.create();
            let id = transport.session_id().expect("http transport always has a session id");
            let engine = (state.factory)(transport.clone());
            if let Err(err) = engine.start().await {
                warn!(%err, "failed to start engine for new streamable-HTTP session");
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &HttpTransportError::MalformedBody(err.to_string()),
                );
            }
            debug!(session_id = %id, "opened new streamable-HTTP session");
            (transport, id, true)
        }
        None => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &HttpTransportError::UnknownSession("missing Mcp-Session-Id".to_string()),
            )
        }
    };

    if let Some(negotiated) = transport.negotiated_protocol_version() {
        if let Some(got) = headers
            .get(PROTOCOL_VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            if got != negotiated {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    &HttpTransportError::ProtocolVersionMismatch {
                        negotiated,
                        got: got.to_string(),
                    },
                );
            }
        }
    }

    let mut response = if let Some(id_value) = message.get("id").cloned() {
        let key = id_value.to_string();
        let waiter = transport.await_response(key.clone());
        transport.deliver_inbound(message);

        match tokio::time::timeout(state.config.sync_response_timeout, waiter).await {
            Ok(Ok(reply)) => (StatusCode::OK, Json(reply)).into_response(),
            Ok(Err(_)) | Err(_) => {
                transport.cancel_wait(&key);
                StatusCode::ACCEPTED.into_response()
            }
        }
    } else {
        transport.deliver_inbound(message);
        StatusCode::ACCEPTED.into_response()
    };

    if newly_created {
        if let Ok(value) = HeaderValue::from_str(&session_id) {
            response.headers_mut().insert(SESSION_ID_HEADER, value);
        }
    }
    if let Some(version) = transport.negotiated_protocol_version() {
        if let Ok(value) = HeaderValue::from_str(&version) {
            response.headers_mut().insert(PROTOCOL_VERSION_HEADER, value);
        }
    }
    response
}

/// `GET {endpoint}` with `Accept: text/event-stream`: the upstream channel
/// server-initiated requests, notifications, and off-band responses ride
/// on (spec.md §4.E "SSE channel").
async fn get_handler(State(state): State<HttpAppState>, headers: HeaderMap) -> Response {
    if let Err(resp) = check_host(&state.config, &headers) {
        return resp;
    }

    let accepts_sse = headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/event-stream"));
    if !accepts_sse {
        return error_response(
            StatusCode::NOT_ACCEPTABLE,
            &HttpTransportError::UnacceptableAccept,
        );
    }

    let Some(session_id) = headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
    else {
        return error_response(
            StatusCode::BAD_REQUEST,
            &HttpTransportError::UnknownSession("missing Mcp-Session-Id".to_string()),
        );
    };

    let Some(transport) = state.sessions.get(&session_id) else {
        return error_response(
            StatusCode::NOT_FOUND,
            &HttpTransportError::UnknownSession(session_id),
        );
    };

    let receiver = transport.subscribe();
    let stream = sse_stream(receiver);
    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(state.config.sse_keepalive))
        .into_response()
}

/// Turns a broadcast receiver into an SSE event stream without needing the
/// `async_stream` macro: each poll drives one `recv()` future and folds the
/// receiver back in for the next iteration.
fn sse_stream(
    receiver: broadcast::Receiver<String>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(text) => return Some((Ok(Event::default().event("message").data(text)), receiver)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "SSE client lagged, some messages were dropped");
                    let payload = serde_json::json!({ "skipped": skipped }).to_string();
                    return Some((Ok(Event::default().event("error").data(payload)), receiver));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[test]
    fn recognizes_initialize_requests() {
        assert!(is_initialize_request(
            &json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"})
        ));
        assert!(!is_initialize_request(
            &json!({"jsonrpc": "2.0", "method": "initialize"})
        ));
        assert!(!is_initialize_request(
            &json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})
        ));
    }

    #[tokio::test]
    async fn sse_stream_yields_a_message_event_per_broadcast() {
        let (tx, rx) = broadcast::channel(4);
        tx.send("{\"hello\":true}".to_string()).unwrap();
        let mut stream = Box::pin(sse_stream(rx));
        assert!(stream.next().await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn sse_stream_ends_once_sender_is_dropped() {
        let (tx, rx) = broadcast::channel::<String>(4);
        drop(tx);
        let mut stream = Box::pin(sse_stream(rx));
        assert!(stream.next().await.is_none());
    }
}
