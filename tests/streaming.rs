//! Response bodies stream through the gateway and stop when the client leaves.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    http::StatusCode,
    routing::get,
    Router,
};
use forward_gateway::config::GatewayConfig;

mod common;
use common::{client, origin, spawn_backend, spawn_gateway};

/// Sets its flag when the backend's response stream is dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Sends "first", then stalls for `stall` before sending "second".
fn stalling_body(stall: Duration, guard: DropFlag) -> Body {
    let stream = futures_util::stream::unfold((0u8, guard), move |(step, guard)| async move {
        match step {
            0 => Some((Ok::<_, std::io::Error>(Bytes::from_static(b"first")), (1, guard))),
            1 => {
                tokio::time::sleep(stall).await;
                Some((Ok(Bytes::from_static(b"second")), (2, guard)))
            }
            _ => None,
        }
    });
    Body::from_stream(stream)
}

async fn spawn_stalling_backend(stall: Duration) -> (std::net::SocketAddr, Arc<AtomicBool>) {
    let dropped = Arc::new(AtomicBool::new(false));
    let flag = dropped.clone();
    let router = Router::new().route(
        "/stream",
        get(move || {
            let guard = DropFlag(flag.clone());
            async move { stalling_body(stall, guard) }
        }),
    );
    (spawn_backend(router).await, dropped)
}

async fn gateway_for(backend: std::net::SocketAddr) -> (std::net::SocketAddr, forward_gateway::Shutdown) {
    let mut config = GatewayConfig::default();
    config.routing.default_host = Some(origin(backend));
    spawn_gateway(config).await
}

#[tokio::test]
async fn first_chunk_arrives_before_upstream_finishes() {
    let (backend, _) = spawn_stalling_backend(Duration::from_secs(3)).await;
    let (gateway, _shutdown) = gateway_for(backend).await;

    let start = Instant::now();
    let mut response = client()
        .get(format!("{}/stream", origin(gateway)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let first = response.chunk().await.unwrap();
    assert_eq!(first.as_deref(), Some(&b"first"[..]));
    assert!(start.elapsed() < Duration::from_secs(2));

    let rest = response.chunk().await.unwrap();
    assert_eq!(rest.as_deref(), Some(&b"second"[..]));
}

#[tokio::test]
async fn client_disconnect_drops_upstream_stream() {
    let (backend, dropped) = spawn_stalling_backend(Duration::from_secs(60)).await;
    let (gateway, _shutdown) = gateway_for(backend).await;

    let mut response = client()
        .get(format!("{}/stream", origin(gateway)))
        .send()
        .await
        .unwrap();
    let first = response.chunk().await.unwrap();
    assert_eq!(first.as_deref(), Some(&b"first"[..]));
    assert!(!dropped.load(Ordering::SeqCst));

    drop(response);

    let deadline = Instant::now() + Duration::from_secs(5);
    while !dropped.load(Ordering::SeqCst) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(dropped.load(Ordering::SeqCst));
}
