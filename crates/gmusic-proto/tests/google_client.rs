//! GoogleMusicClient against a local mock of the three endpoints.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use gmusic_proto::google::{GoogleEndpoints, GoogleMusicClient};
use gmusic_proto::service::{MusicService, ServiceError};
use gmusic_proto::track::TrackId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const TOKEN: &str = "token-123";
const DEVICE_ID: &str = "3e4e2ed2cd90976f";

#[derive(Clone, Default)]
struct Mock {
    stream_queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    let expected = format!("GoogleLogin auth={}", TOKEN);
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(expected.as_str())
}

async fn login(Form(form): Form<HashMap<String, String>>) -> (StatusCode, String) {
    let ok = form.get("Email").map(String::as_str) == Some("me@example.com")
        && form.get("Passwd").map(String::as_str) == Some("right")
        && form.get("service").map(String::as_str) == Some("sj");
    if ok {
        (StatusCode::OK, format!("SID=s\nLSID=l\nAuth={}\n", TOKEN))
    } else {
        (StatusCode::FORBIDDEN, "Error=BadAuthentication\n".to_string())
    }
}

async fn fetch_track(
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match query.get("nid").map(String::as_str) {
        Some("Tabc123") => Json(serde_json::json!({
            "title": "Song",
            "artist": "Band",
            "album": "Record",
            "year": 2020,
            "trackNumber": 3,
            "nid": "abc123",
            "storeId": "Tabc123"
        }))
        .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn mplay(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if headers.get("X-Device-ID").and_then(|v| v.to_str().ok()) != Some(DEVICE_ID) {
        return StatusCode::FORBIDDEN.into_response();
    }
    mock.stream_queries.lock().unwrap().push(query);
    (
        StatusCode::FOUND,
        [(header::LOCATION, "https://streams.example/signed.mp3")],
    )
        .into_response()
}

async fn start_mock() -> (String, Mock) {
    let mock = Mock::default();
    let app = Router::new()
        .route("/login", post(login))
        .route("/fetchtrack", get(fetch_track))
        .route("/mplay", get(mplay))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), mock)
}

async fn logged_in_client(base: &str) -> GoogleMusicClient {
    let mut client =
        GoogleMusicClient::with_endpoints(GoogleEndpoints::rooted_at(base), None).unwrap();
    client.login("me@example.com", "right").await.unwrap();
    client
}

#[tokio::test]
async fn login_rejects_bad_password() {
    let (base, _) = start_mock().await;
    let mut client =
        GoogleMusicClient::with_endpoints(GoogleEndpoints::rooted_at(&base), None).unwrap();

    let err = client.login("me@example.com", "wrong").await.unwrap_err();
    match err {
        ServiceError::AuthRejected(reason) => assert_eq!(reason, "BadAuthentication"),
        other => panic!("expected AuthRejected, got {other:?}"),
    }
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn track_info_maps_fields() {
    let (base, _) = start_mock().await;
    let client = logged_in_client(&base).await;
    assert!(client.is_authenticated());

    let info = client.track_info(&TrackId::new("Tabc123")).await.unwrap();
    assert_eq!(info.title, "Song");
    assert_eq!(info.artist, "Band");
    assert_eq!(info.album, "Record");
    assert_eq!(info.year, Some(2020));
    assert_eq!(info.track_number, Some(3));
    assert_eq!(info.nid, "Tabc123");
}

#[tokio::test]
async fn track_info_unknown_track_is_not_found() {
    let (base, _) = start_mock().await;
    let client = logged_in_client(&base).await;

    let err = client.track_info(&TrackId::new("Tnope")).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(id) if id.as_str() == "Tnope"));
}

#[tokio::test]
async fn stream_url_is_taken_from_redirect() {
    let (base, mock) = start_mock().await;
    let client = logged_in_client(&base).await;

    let url = client.mp3_stream_url("Tabc123", DEVICE_ID).await.unwrap();
    assert_eq!(url, "https://streams.example/signed.mp3");

    let queries = mock.stream_queries.lock().unwrap();
    let query = &queries[0];
    assert_eq!(query.get("mjck").map(String::as_str), Some("Tabc123"));
    assert!(!query.contains_key("songid"));
    assert_eq!(query.get("opt").map(String::as_str), Some("hi"));
    assert!(query.get("slt").is_some_and(|s| s.parse::<i64>().is_ok()));
    assert_eq!(query.get("sig").map(String::len), Some(27));
}

#[tokio::test]
async fn stream_url_uses_songid_for_library_tracks() {
    let (base, mock) = start_mock().await;
    let client = logged_in_client(&base).await;

    client
        .mp3_stream_url("0b8a7c3e-library", DEVICE_ID)
        .await
        .unwrap();
    let queries = mock.stream_queries.lock().unwrap();
    assert_eq!(
        queries[0].get("songid").map(String::as_str),
        Some("0b8a7c3e-library")
    );
}

#[tokio::test]
async fn stream_url_wrong_device_is_status_error() {
    let (base, _) = start_mock().await;
    let client = logged_in_client(&base).await;

    let err = client
        .mp3_stream_url("Tabc123", "ffffffffffffffff")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Status { endpoint: "mplay", status } if status == reqwest::StatusCode::FORBIDDEN
    ));
}
