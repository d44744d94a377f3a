/// Axum middleware that records qualifying exchanges.
///
/// Installed into a host application's router; it never alters the
/// status or body the original caller sees, and recording failures are
/// logged instead of propagating into request handling: an exchange
/// that cannot be captured (oversized or unreadable body) is forwarded
/// untouched and simply not recorded. Recording work is spawned off
/// the request path.
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use futures::{stream, StreamExt};
use tracing::{debug, error, warn};

use super::{Batcher, BatchSink, RecordFilter, RecorderSink};
use crate::ledger::Visibility;
use crate::record::{Exchange, Recorder};

/// Largest request/response body the interceptor will buffer.
const CAPTURE_BODY_LIMIT: usize = 8 * 1024 * 1024;

/// Middleware configuration.
#[derive(Debug, Clone, Default)]
pub struct InterceptConfig {
    /// Include patterns; empty means everything not excluded.
    pub patterns: Vec<String>,
    /// Exclude patterns, checked first.
    pub exclude_patterns: Vec<String>,
    /// When set, exchanges are queued and flushed as batches on this
    /// interval (and on `batch_size`). When unset, each exchange is
    /// recorded immediately.
    pub batch_interval: Option<Duration>,
    /// Queue size that triggers an immediate flush in batched mode.
    pub batch_size: usize,
    /// Visibility applied to recorded exchanges; default PUBLIC.
    pub visibility: Option<Visibility>,
}

enum Mode {
    Immediate {
        recorder: Arc<Recorder>,
        visibility: Option<Visibility>,
    },
    Batched(Arc<Batcher>),
}

/// Shared state for the interception middleware.
pub struct Interceptor {
    filter: RecordFilter,
    mode: Mode,
}

impl Interceptor {
    /// Build an interceptor from configuration.
    ///
    /// With a `batch_interval` the internal batcher's timer is started
    /// here; call `shutdown` to stop it deterministically.
    pub fn new(recorder: Arc<Recorder>, config: InterceptConfig) -> Arc<Self> {
        let filter = RecordFilter::new(config.patterns, config.exclude_patterns);
        let mode = match config.batch_interval {
            Some(interval) => {
                let sink: Arc<dyn BatchSink> = Arc::new(RecorderSink {
                    recorder,
                    visibility: config.visibility,
                });
                let batcher = Arc::new(Batcher::new(
                    sink,
                    if config.batch_size == 0 {
                        10
                    } else {
                        config.batch_size
                    },
                    interval,
                ));
                batcher.start();
                Mode::Batched(batcher)
            }
            None => Mode::Immediate {
                recorder,
                visibility: config.visibility,
            },
        };
        Arc::new(Self { filter, mode })
    }

    /// Batched interceptor over an arbitrary sink (tests inject fakes).
    pub fn batched(filter: RecordFilter, batcher: Arc<Batcher>) -> Arc<Self> {
        Arc::new(Self {
            filter,
            mode: Mode::Batched(batcher),
        })
    }

    /// Stop the flush timer (if batching) and flush what remains.
    pub async fn shutdown(&self) {
        if let Mode::Batched(batcher) = &self.mode {
            batcher.shutdown().await;
        }
    }

    fn dispatch(self: &Arc<Self>, exchange: Exchange) {
        match &self.mode {
            Mode::Immediate {
                recorder,
                visibility,
            } => {
                let recorder = Arc::clone(recorder);
                let visibility = *visibility;
                tokio::spawn(async move {
                    if let Err(e) = recorder.record_exchange(&exchange, visibility).await {
                        error!(url = %exchange.url, error = %e, "Exchange recording failed");
                    }
                });
            }
            Mode::Batched(batcher) => {
                let batcher = Arc::clone(batcher);
                tokio::spawn(async move {
                    batcher.push(exchange).await;
                });
            }
        }
    }
}

/// Outcome of trying to buffer a body for capture.
enum Captured {
    /// Fully buffered within the limit; the body must be rebuilt from
    /// these bytes.
    Complete(Bytes),
    /// The body exceeded the limit or failed mid-read. The returned
    /// body replays whatever was consumed plus the rest of the stream,
    /// byte-identical to the original; the exchange is not recorded.
    Passthrough(Body),
}

/// Whether the declared Content-Length already exceeds the limit.
fn declared_too_large(headers: &HeaderMap, limit: usize) -> bool {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_some_and(|len| len > limit)
}

/// Buffer a body up to `limit` bytes without ever losing traffic.
///
/// On overflow the already-consumed bytes are chained back in front of
/// the untouched remainder of the stream.
async fn buffer_up_to(body: Body, limit: usize) -> Captured {
    let mut upstream = body.into_data_stream();
    let mut buffered: Vec<u8> = Vec::new();

    loop {
        match upstream.next().await {
            None => return Captured::Complete(Bytes::from(buffered)),
            Some(Ok(chunk)) => {
                if buffered.len() + chunk.len() > limit {
                    let replay = stream::iter([Ok(Bytes::from(buffered)), Ok(chunk)])
                        .chain(upstream);
                    return Captured::Passthrough(Body::from_stream(replay));
                }
                buffered.extend_from_slice(&chunk);
            }
            Some(Err(e)) => {
                // Hand the error to whoever was going to read the body.
                let replay =
                    stream::iter([Ok(Bytes::from(buffered))]).chain(stream::once(async { Err(e) }));
                return Captured::Passthrough(Body::from_stream(replay));
            }
        }
    }
}

fn headers_to_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// The middleware function; install with
/// `axum::middleware::from_fn_with_state(interceptor, record_exchanges)`.
pub async fn record_exchanges(
    State(interceptor): State<Arc<Interceptor>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !interceptor.filter.should_record(&path) {
        return next.run(request).await;
    }

    if declared_too_large(request.headers(), CAPTURE_BODY_LIMIT) {
        warn!(path = %path, "Request body exceeds capture limit, not recording");
        return next.run(request).await;
    }

    let method = request.method().to_string();
    let url = request.uri().to_string();
    let request_headers = headers_to_pairs(request.headers());

    let (parts, body) = request.into_parts();
    let request_bytes = match buffer_up_to(body, CAPTURE_BODY_LIMIT).await {
        Captured::Complete(bytes) => bytes,
        Captured::Passthrough(body) => {
            warn!(path = %path, "Request body not capturable, not recording");
            return next.run(Request::from_parts(parts, body)).await;
        }
    };
    let request_timestamp = Utc::now();
    let request = Request::from_parts(parts, Body::from(request_bytes.clone()));

    let response = next.run(request).await;
    let response_timestamp = Utc::now();

    let status = response.status().as_u16();
    if declared_too_large(response.headers(), CAPTURE_BODY_LIMIT) {
        warn!(path = %path, status, "Response body exceeds capture limit, not recording");
        return response;
    }

    let response_headers = headers_to_pairs(response.headers());
    let (parts, body) = response.into_parts();
    let response_bytes = match buffer_up_to(body, CAPTURE_BODY_LIMIT).await {
        Captured::Complete(bytes) => bytes,
        Captured::Passthrough(body) => {
            warn!(path = %path, status, "Response body not capturable, not recording");
            return Response::from_parts(parts, body);
        }
    };

    let exchange = Exchange {
        url,
        method,
        headers: request_headers,
        body: if request_bytes.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&request_bytes).into_owned())
        },
        request_timestamp,
        status,
        response_headers,
        response_body: if response_bytes.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&response_bytes).into_owned())
        },
        response_timestamp,
    };
    debug!(path = %path, status, "Exchange captured");
    interceptor.dispatch(exchange);

    Response::from_parts(parts, Body::from(response_bytes))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::routing::get;
    use axum::Router;
    use tower::util::ServiceExt;

    use axum::body::to_bytes;
    use axum::http::StatusCode;

    use super::*;
    use crate::error::Result;
    use crate::intercept::DEFAULT_BATCH_INTERVAL;

    #[derive(Default)]
    struct CapturingSink {
        batches: Mutex<Vec<Vec<Exchange>>>,
    }

    #[async_trait]
    impl BatchSink for CapturingSink {
        async fn submit(&self, exchanges: Vec<Exchange>) -> Result<()> {
            self.batches.lock().unwrap().push(exchanges);
            Ok(())
        }
    }

    fn test_app(sink: Arc<CapturingSink>, batch_size: usize) -> Router {
        let filter = RecordFilter::new(vec!["/api/*".into()], vec!["/health".into()]);
        let batcher = Arc::new(Batcher::new(sink, batch_size, DEFAULT_BATCH_INTERVAL));
        let interceptor = Interceptor::batched(filter, batcher);

        Router::new()
            .route("/api/users", get(|| async { r#"{"users":[]}"# }))
            .route("/health", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(
                interceptor,
                record_exchanges,
            ))
    }

    async fn get_body(app: &Router, path: &str) -> (StatusCode, String) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(path)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn test_response_is_unaltered() {
        let sink = Arc::new(CapturingSink::default());
        let app = test_app(sink, 1);

        let (status, body) = get_body(&app, "/api/users").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"users":[]}"#);
    }

    #[tokio::test]
    async fn test_qualifying_exchange_is_captured() {
        let sink = Arc::new(CapturingSink::default());
        let app = test_app(sink.clone(), 1);

        get_body(&app, "/api/users").await;
        // Dispatch is spawned off the request path.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let batches = sink.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        let exchange = &batches[0][0];
        assert_eq!(exchange.url, "/api/users");
        assert_eq!(exchange.method, "GET");
        assert_eq!(exchange.status, 200);
        assert_eq!(exchange.response_body.as_deref(), Some(r#"{"users":[]}"#));
    }

    #[tokio::test]
    async fn test_excluded_path_is_not_captured() {
        let sink = Arc::new(CapturingSink::default());
        let app = test_app(sink.clone(), 1);

        let (status, body) = get_body(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sink.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversize_response_reaches_caller_intact() {
        let sink = Arc::new(CapturingSink::default());
        let filter = RecordFilter::new(vec![], vec![]);
        let batcher = Arc::new(Batcher::new(sink.clone(), 1, DEFAULT_BATCH_INTERVAL));
        let interceptor = Interceptor::batched(filter, batcher);

        let big = vec![b'x'; CAPTURE_BODY_LIMIT + 1024 * 1024];
        let expected_len = big.len();
        let app = Router::new()
            .route("/api/export", get(move || async move { big.clone() }))
            .layer(axum::middleware::from_fn_with_state(
                interceptor,
                record_exchanges,
            ));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/export")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        // The caller sees the original status and full body; the
        // exchange is simply not recorded.
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.len(), expected_len);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sink.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_buffer_overflow_replays_body_byte_identical() {
        // Chunked stream with no Content-Length, larger than the limit.
        let chunks: Vec<std::result::Result<Bytes, std::io::Error>> = (0u8..8)
            .map(|i| Ok(Bytes::from(vec![i; 100])))
            .collect();
        let body = Body::from_stream(stream::iter(chunks));

        match buffer_up_to(body, 250).await {
            Captured::Complete(_) => panic!("expected overflow"),
            Captured::Passthrough(body) => {
                let replayed = to_bytes(body, usize::MAX).await.unwrap();
                let expected: Vec<u8> =
                    (0u8..8).flat_map(|i| std::iter::repeat_n(i, 100)).collect();
                assert_eq!(replayed.as_ref(), expected.as_slice());
            }
        }
    }

    #[tokio::test]
    async fn test_buffer_within_limit_is_complete() {
        let body = Body::from("small body");
        match buffer_up_to(body, 1024).await {
            Captured::Complete(bytes) => assert_eq!(bytes.as_ref(), b"small body"),
            Captured::Passthrough(_) => panic!("expected complete capture"),
        }
    }

    #[tokio::test]
    async fn test_exchanges_accumulate_until_batch_size() {
        let sink = Arc::new(CapturingSink::default());
        let app = test_app(sink.clone(), 3);

        for _ in 0..3 {
            get_body(&app, "/api/users").await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let batches = sink.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
    }
}
