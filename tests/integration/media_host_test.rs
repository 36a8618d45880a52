// HttpMediaHost against a local HTTP server

use crate::common::{generic_punch, private_key, shift, test_now, FixedClock, PHOTO};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::StatusCode,
    routing::get,
    Router,
};
use flowexchange::{
    attendance::{MemoryAttendanceStore, NatureOfTime},
    media::HttpMediaHost,
    platform, Error, ExchangeConfig, ExchangeOrchestratorBuilder, MediaHost, ScreenResponse,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

// Serves `blob` at /media/blob (with a length) and /media/stream (chunked)
async fn serve_blob(blob: Vec<u8>) -> SocketAddr {
    async fn media(State(blob): State<Arc<Vec<u8>>>) -> Vec<u8> {
        blob.as_ref().clone()
    }

    async fn stream(State(blob): State<Arc<Vec<u8>>>) -> Body {
        let chunks: Vec<std::io::Result<Bytes>> = blob
            .chunks(16)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        Body::from_stream(futures::stream::iter(chunks))
    }

    let app = Router::new()
        .route("/media/blob", get(media))
        .route("/media/stream", get(stream))
        .route("/media/missing", get(|| async { StatusCode::NOT_FOUND }))
        .with_state(Arc::new(blob));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_fetch_streams_blob_and_cleans_up() {
    let (blob, _) = platform::seal_media(PHOTO).unwrap();
    let addr = serve_blob(blob.as_bytes().to_vec()).await;
    let media_dir = tempfile::tempdir().unwrap();
    let host = HttpMediaHost::new(media_dir.path(), Duration::from_secs(5)).unwrap();

    let fetched = host
        .fetch(&format!("http://{}/media/blob", addr))
        .await
        .expect("Failed to fetch blob");

    assert_eq!(fetched, blob);
    assert_eq!(std::fs::read_dir(media_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_fetch_reports_http_errors() {
    let addr = serve_blob(Vec::new()).await;
    let media_dir = tempfile::tempdir().unwrap();
    let host = HttpMediaHost::new(media_dir.path(), Duration::from_secs(5)).unwrap();

    let result = host.fetch(&format!("http://{}/media/missing", addr)).await;

    assert!(matches!(result, Err(Error::MediaDownload(_))));
    assert_eq!(std::fs::read_dir(media_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_fetch_rejects_oversized_blob() {
    let (blob, _) = platform::seal_media(&[7_u8; 200]).unwrap();
    let addr = serve_blob(blob.as_bytes().to_vec()).await;
    let media_dir = tempfile::tempdir().unwrap();
    let host = HttpMediaHost::new(media_dir.path(), Duration::from_secs(5))
        .unwrap()
        .with_max_bytes(64);

    for path in ["blob", "stream"] {
        let result = host.fetch(&format!("http://{}/media/{}", addr, path)).await;
        assert!(matches!(result, Err(Error::MediaDownload(_))), "{}: {:?}", path, result);
    }
    assert_eq!(std::fs::read_dir(media_dir.path()).unwrap().count(), 0);

    let roomy = host.with_max_bytes(blob.len() as u64);
    let fetched = roomy
        .fetch(&format!("http://{}/media/stream", addr))
        .await
        .expect("Failed to fetch blob at the size limit");
    assert_eq!(fetched, blob);
}

#[tokio::test]
async fn test_check_in_with_default_media_host() {
    let (blob, metadata) = platform::seal_media(PHOTO).unwrap();
    let addr = serve_blob(blob.as_bytes().to_vec()).await;
    let media_dir = tempfile::tempdir().unwrap();
    let artifact_dir = tempfile::tempdir().unwrap();

    let store = MemoryAttendanceStore::new();
    store.insert_employee(shift(NatureOfTime::Flexible)).unwrap();

    let key = private_key();
    let public_key = key.public_key();
    let orchestrator = ExchangeOrchestratorBuilder::new()
        .with_private_key(key)
        .with_config(
            ExchangeConfig::new()
                .with_media_dir(media_dir.path())
                .with_artifact_dir(artifact_dir.path()),
        )
        .with_store(Arc::new(store.clone()))
        .with_clock(Arc::new(FixedClock(test_now())))
        .build()
        .unwrap();

    let images = json!([{
        "file_name": "selfie.jpg",
        "cdn_url": format!("http://{}/media/blob", addr),
        "encryption_metadata": metadata,
    }]);
    let sealed =
        platform::seal_request(&public_key, &generic_punch("in", "09:03", images)).unwrap();
    let body = serde_json::to_vec(&sealed.envelope.to_wire()).unwrap();

    let reply = orchestrator.handle(&body).await.unwrap();
    let response: ScreenResponse =
        platform::open_response(&reply, &sealed.session_key, &sealed.iv).unwrap();

    assert_eq!(response.get_str("responseText"), Some("✅️ Check In Success - Lena"));
    assert_eq!(std::fs::read(artifact_dir.path().join("selfie.jpg")).unwrap(), PHOTO);
    assert_eq!(std::fs::read_dir(media_dir.path()).unwrap().count(), 0);

    let records = store.attendance_for("5").unwrap();
    assert_eq!(records[0].status.as_str(), "onTime");
}
