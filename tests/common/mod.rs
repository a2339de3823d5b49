//! Shared in-process HTTP fixture for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use m3u_prober::config::HttpConfig;
use m3u_prober::utils::{FetchClient, RetryPolicy};

pub struct TestServer {
    base_url: String,
    request_counts: Arc<Mutex<HashMap<String, usize>>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    /// Serve `app` on an ephemeral local port, counting requests per path
    pub async fn start(app: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://127.0.0.1:{}", addr.port());

        let request_counts = Arc::new(Mutex::new(HashMap::new()));
        let request_counts_clone = request_counts.clone();

        let app = app.layer(axum::middleware::from_fn(move |req: axum::extract::Request, next: axum::middleware::Next| {
            let counts = request_counts_clone.clone();
            async move {
                let path = req.uri().path().to_string();
                if let Ok(mut counts) = counts.lock() {
                    *counts.entry(path).or_insert(0) += 1;
                }
                next.run(req).await
            }
        }));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            base_url,
            request_counts,
            shutdown: Some(shutdown_tx),
        }
    }

    /// Server with the standard stream fixture routes
    pub async fn streams() -> Self {
        Self::start(stream_router()).await
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn host(&self) -> String {
        self.base_url.trim_start_matches("http://").to_string()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.request_counts
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(0)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Fetch client with short timeouts and no backoff
pub fn test_client() -> FetchClient {
    FetchClient::new(
        &HttpConfig::default(),
        Duration::from_secs(2),
        RetryPolicy::immediate(),
    )
    .unwrap()
}

const SEGMENT_BYTES: &[u8] = &[0x47; 188 * 4];

async fn media_segment(headers: HeaderMap) -> Response {
    let status = if headers.contains_key(header::RANGE) {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    (status, SEGMENT_BYTES).into_response()
}

fn playlist(body: &'static str) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/vnd.apple.mpegurl")],
        body,
    )
        .into_response()
}

/// Absolute links back to this server, built from the request's Host header
async fn channel_list(headers: HeaderMap) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("127.0.0.1");
    let body = format!(
        "#EXTM3U\n#EXTINF:-1,Movie\nhttp://{host}/movie.mp4\n#EXTINF:-1,Gone\nhttp://{host}/gone.mp4\n"
    );
    (StatusCode::OK, body).into_response()
}

/// Routes covering every probe outcome
///
/// | path | behavior |
/// |------|----------|
/// | `/live/index.m3u8` | media playlist listing `seg1.ts` |
/// | `/master.m3u8` | master playlist, first variant `low/index.m3u8` |
/// | `/redirect.m3u8` | 307 to `/nested/dir/index.m3u8` |
/// | `/header-only.m3u8` | `#EXTM3U` without media |
/// | `/html.m3u8` | HTML body |
/// | `/always500.m3u8` | HTTP 500 |
/// | `/bad-variant.m3u8` | variant answering 404 |
/// | `/empty-variant.m3u8` | variant without media lines |
/// | `/dead-segment.m3u8` | segment answering 403 |
/// | `/movie.mp4` | ranged media |
/// | `/gone.mp4` | HTTP 404 |
/// | `/list.m3u` | M3U list of `/movie.mp4` and `/gone.mp4` |
/// | `/slow.m3u8` | answers after 5 seconds |
pub fn stream_router() -> Router {
    Router::new()
        .route(
            "/live/index.m3u8",
            get(|| async {
                playlist("#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\nseg1.ts\n#EXTINF:6.0,\nseg2.ts\n")
            }),
        )
        .route("/live/seg1.ts", get(media_segment))
        .route("/live/seg2.ts", get(media_segment))
        .route(
            "/master.m3u8",
            get(|| async {
                playlist(
                    "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000\nlow/index.m3u8\n#EXT-X-STREAM-INF:BANDWIDTH=4000000\nhi/index.m3u8\n",
                )
            }),
        )
        .route(
            "/low/index.m3u8",
            get(|| async { playlist("#EXTM3U\n#EXT-X-MAP:URI=\"init.mp4\"\n#EXTINF:4.0,\nchunk-1.m4s\n") }),
        )
        .route("/low/chunk-1.m4s", get(media_segment))
        .route(
            "/redirect.m3u8",
            get(|| async { Redirect::temporary("/nested/dir/index.m3u8") }),
        )
        .route(
            "/nested/dir/index.m3u8",
            get(|| async { playlist("#EXTM3U\n#EXTINF:6.0,\nseg.ts?token=1\n") }),
        )
        .route("/nested/dir/seg.ts", get(media_segment))
        .route(
            "/header-only.m3u8",
            get(|| async { playlist("#EXTM3U\n#EXT-X-ENDLIST\n") }),
        )
        .route(
            "/html.m3u8",
            get(|| async { (StatusCode::OK, "<html><body>blocked</body></html>") }),
        )
        .route(
            "/always500.m3u8",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route(
            "/bad-variant.m3u8",
            get(|| async { playlist("#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\nmissing/index.m3u8\n") }),
        )
        .route(
            "/empty-variant.m3u8",
            get(|| async { playlist("#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\n/empty/index.m3u8\n") }),
        )
        .route(
            "/empty/index.m3u8",
            get(|| async { playlist("#EXTM3U\n#EXT-X-ENDLIST\n") }),
        )
        .route(
            "/dead-segment.m3u8",
            get(|| async { playlist("#EXTM3U\n#EXTINF:6.0,\ndead.ts\n") }),
        )
        .route("/dead.ts", get(|| async { StatusCode::FORBIDDEN }))
        .route("/movie.mp4", get(media_segment))
        .route("/gone.mp4", get(|| async { StatusCode::NOT_FOUND }))
        .route("/list.m3u", get(channel_list))
        .route(
            "/slow.m3u8",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                playlist("#EXTM3U\n")
            }),
        )
}
