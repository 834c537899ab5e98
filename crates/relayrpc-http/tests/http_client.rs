//! `HttpPeerClient` against an in-process axum peer.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, Query};
use axum::http::{header, Response, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use relayrpc_core::error::TransportError;
use relayrpc_core::peer::Peer;
use relayrpc_core::transport::{PeerRequest, PeerTransport};
use relayrpc_http::{HttpClientConfig, HttpPeerClient};

async fn echo_query(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!({ "data": [], "query": q }))
}

async fn block(Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    if id == "123" {
        (StatusCode::OK, Json(json!({ "data": { "id": id } })))
    } else {
        (StatusCode::NOT_FOUND, Json(json!({ "error": "Not Found" })))
    }
}

/// Sends headers and the first bytes of a body, then stalls.
async fn stalled_body() -> Response<Body> {
    let chunks = futures::stream::unfold(0u8, |sent| async move {
        if sent == 0 {
            Some((Ok::<_, std::io::Error>("{\"data\":"), 1))
        } else {
            tokio::time::sleep(Duration::from_secs(5)).await;
            None
        }
    });
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from_stream(chunks))
        .unwrap()
}

async fn spawn_peer() -> SocketAddr {
    let app = Router::new()
        .route("/api/blocks", get(echo_query))
        .route("/api/blocks/:id", get(block))
        .route("/api/broken", get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "oops") }))
        .route("/api/empty", get(|| async { StatusCode::NO_CONTENT }))
        .route("/api/stalled", get(stalled_body))
        .route(
            "/api/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({ "data": null }))
            }),
        );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn peer(addr: SocketAddr) -> Peer {
    Peer::new(addr.ip().to_string(), addr.port(), addr.port())
}

#[tokio::test]
async fn query_is_encoded_in_order() {
    let addr = spawn_peer().await;
    let client = HttpPeerClient::with_defaults().unwrap();
    let req = PeerRequest::get("blocks")
        .query("orderBy", "height:desc")
        .query("limit", 1);

    let resp = client.get(&peer(addr), &req).await.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body["query"]["orderBy"], "height:desc");
    assert_eq!(resp.body["query"]["limit"], "1");
}

#[tokio::test]
async fn statuses_are_returned_not_raised() {
    let addr = spawn_peer().await;
    let client = HttpPeerClient::with_defaults().unwrap();

    let ok = client.get(&peer(addr), &PeerRequest::get("blocks/123")).await.unwrap();
    assert_eq!(ok.status, 200);
    assert_eq!(ok.body["data"]["id"], "123");

    let missing = client.get(&peer(addr), &PeerRequest::get("blocks/999")).await.unwrap();
    assert_eq!(missing.status, 404);

    let unrouted = client.get(&peer(addr), &PeerRequest::get("nowhere")).await.unwrap();
    assert_eq!(unrouted.status, 404);
}

#[tokio::test]
async fn non_json_and_empty_bodies_become_null() {
    let addr = spawn_peer().await;
    let client = HttpPeerClient::with_defaults().unwrap();

    let broken = client.get(&peer(addr), &PeerRequest::get("broken")).await.unwrap();
    assert_eq!(broken.status, 500);
    assert_eq!(broken.body, Value::Null);

    let empty = client.get(&peer(addr), &PeerRequest::get("empty")).await.unwrap();
    assert_eq!(empty.status, 204);
    assert_eq!(empty.body, Value::Null);
}

#[tokio::test]
async fn closed_port_is_a_retryable_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = HttpPeerClient::with_defaults().unwrap();
    let err = client
        .get(&Peer::new("127.0.0.1", port, port), &PeerRequest::get("blocks"))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Http(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn slow_peer_times_out() {
    let addr = spawn_peer().await;
    let client = HttpPeerClient::new(HttpClientConfig {
        request_timeout: Duration::from_millis(200),
        ..Default::default()
    })
    .unwrap();
    let err = client.get(&peer(addr), &PeerRequest::get("slow")).await.unwrap_err();
    assert!(matches!(err, TransportError::Timeout { ms: 200 }));
}

#[tokio::test]
async fn body_stall_is_a_timeout() {
    let addr = spawn_peer().await;
    let client = HttpPeerClient::new(HttpClientConfig {
        request_timeout: Duration::from_millis(300),
        ..Default::default()
    })
    .unwrap();
    let err = client.get(&peer(addr), &PeerRequest::get("stalled")).await.unwrap_err();
    assert!(matches!(err, TransportError::Timeout { ms: 300 }), "{err:?}");
    assert!(err.is_retryable());
}
