//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use forward_gateway::{GatewayConfig, GatewayServer, Shutdown};
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral local port.
pub async fn spawn_backend(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Counts requests reaching a backend.
#[derive(Clone, Default)]
pub struct Hits(Arc<AtomicUsize>);

impl Hits {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Backend answering everything with `status` and its own `name` as body.
pub async fn spawn_fixed_backend(name: &'static str, status: u16) -> (SocketAddr, Hits) {
    let hits = Hits::default();
    let router = Router::new()
        .fallback(move |State(hits): State<Hits>, uri: Uri| async move {
            hits.0.fetch_add(1, Ordering::SeqCst);
            let mut headers = HeaderMap::new();
            headers.insert("x-backend", HeaderValue::from_static(name));
            headers.insert("x-seen-uri", HeaderValue::from_str(&uri.to_string()).unwrap());
            (StatusCode::from_u16(status).unwrap(), headers, name)
        })
        .with_state(hits.clone());
    (spawn_backend(router).await, hits)
}

/// Backend reflecting what it received.
///
/// Response headers: `x-seen-method`, `x-seen-uri`, `x-seen-host`,
/// `x-seen-forwarded-for`, every `x-token` value as `x-seen-token`, and two
/// `set-cookie` values. The body is the request body.
pub async fn spawn_echo_backend() -> SocketAddr {
    let router = Router::new().fallback(echo);
    spawn_backend(router).await
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let mut out = HeaderMap::new();
    out.insert("x-seen-method", HeaderValue::from_str(method.as_str()).unwrap());
    out.insert("x-seen-uri", HeaderValue::from_str(&uri.to_string()).unwrap());
    if let Some(host) = headers.get("host") {
        out.insert("x-seen-host", host.clone());
    }
    if let Some(xff) = headers.get("x-forwarded-for") {
        out.insert("x-seen-forwarded-for", xff.clone());
    }
    for token in headers.get_all("x-token") {
        out.append("x-seen-token", token.clone());
    }
    out.append("set-cookie", HeaderValue::from_static("session=abc"));
    out.append("set-cookie", HeaderValue::from_static("theme=dark"));
    (StatusCode::OK, out, body).into_response()
}

/// Start a gateway on an ephemeral port. Keep the `Shutdown` alive for the
/// lifetime of the test.
pub async fn spawn_gateway(mut config: GatewayConfig) -> (SocketAddr, Shutdown) {
    config.listener.bind_address = "127.0.0.1:0".into();
    let server = GatewayServer::new(config).unwrap();
    let listener = TcpListener::bind(&server.config().listener.bind_address)
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, stop).await.unwrap();
    });
    (addr, shutdown)
}

/// Client that talks to the gateway directly and never follows redirects itself.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

pub fn origin(addr: SocketAddr) -> String {
    format!("http://{addr}")
}
