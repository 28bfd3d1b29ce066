//! Response tracking.
//!
//! # Responsibilities
//! - Register every request's connection and response in the registry
//! - Mark the response finished once its body has been fully produced
//! - Record request count and latency metrics
//!
//! # Design Decisions
//! - Installed as the outermost layer so even rejected requests are tracked
//! - A body dropped mid-stream counts as finished
//! - Requests without a socket carry a stand-in connection inside the body

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use hyper::body::{Body as HttpBody, Frame, SizeHint};

use crate::health::{ResponseRegistry, ResponseStatus};
use crate::net::{ClientConn, ConnectionStatus};
use crate::observability::metrics;

/// Response body that flips its [`ResponseStatus`] at end of stream.
pub struct TrackedBody {
    inner: Body,
    status: Arc<ResponseStatus>,
    /// Stand-in connection for requests that did not arrive over a socket.
    detached: Option<Arc<ConnectionStatus>>,
}

impl TrackedBody {
    pub fn new(inner: Body, status: Arc<ResponseStatus>) -> Self {
        Self {
            inner,
            status,
            detached: None,
        }
    }

    /// Keep `connection` alive for as long as the body, then mark it destroyed.
    fn detached(inner: Body, status: Arc<ResponseStatus>, connection: Arc<ConnectionStatus>) -> Self {
        Self {
            inner,
            status,
            detached: Some(connection),
        }
    }
}

impl HttpBody for TrackedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(None) | Poll::Ready(Some(Err(_))) => this.status.mark_finished(),
            Poll::Ready(Some(Ok(_))) if this.inner.is_end_stream() => this.status.mark_finished(),
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for TrackedBody {
    fn drop(&mut self) {
        self.status.mark_finished();
        if let Some(connection) = &self.detached {
            connection.mark_destroyed();
        }
    }
}

/// Outermost middleware: track the response until it is written out.
pub async fn track_responses(
    State(registry): State<Arc<ResponseRegistry>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();

    // In-process callers have no socket; the body stands in for the connection.
    let socket = request
        .extensions()
        .get::<ConnectInfo<ClientConn>>()
        .map(|ConnectInfo(conn)| Arc::clone(&conn.status));
    let detached = socket.is_none();
    let connection = socket.unwrap_or_else(ConnectionStatus::new);

    let status = ResponseStatus::new();
    let id = registry.track(&connection, &status);
    tracing::trace!(response_id = %id, connection = %connection.id(), "Tracking response");

    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), start);

    response.map(|body| {
        let tracked = if detached {
            TrackedBody::detached(body, status, connection)
        } else {
            TrackedBody::new(body, status)
        };
        Body::new(tracked)
    })
}
