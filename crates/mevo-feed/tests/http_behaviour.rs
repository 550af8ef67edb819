//! HTTP behaviour of the feed client and icon fetcher.
//!
//! Each test runs against a local `wiremock` server so status codes, bodies,
//! and delays can be scripted without a live Mevo endpoint.

#![allow(clippy::unwrap_used)]

use std::io::Cursor;
use std::time::Duration;

use image::{ImageFormat, Rgba, RgbaImage};
use mevo_feed::{FeedClient, FetchError, IconFetcher, ParseError, parse};
use mevo_types::{CollectionContents, FeedType};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VEHICLES: &str = r#"{"data":{"type":"FeatureCollection","features":[
    {"type":"Feature","geometry":{"type":"Point","coordinates":[174.78,-41.29]},"properties":{"iconUrl":"https://x/icon.png"}},
    {"type":"Feature","geometry":{"type":"Point","coordinates":[174.77,-41.28]},"properties":{"iconUrl":"https://x/icon2.png"}}
]}}"#;

fn png_bytes() -> Vec<u8> {
    let img = RgbaImage::from_pixel(4, 4, Rgba([200, 0, 0, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn feed_client(server: &MockServer) -> FeedClient {
    FeedClient::new(&server.uri(), Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn fetches_and_parses_vehicle_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vehicles/Wellington"))
        .respond_with(ResponseTemplate::new(200).set_body_string(VEHICLES))
        .expect(1)
        .mount(&server)
        .await;

    let payload = feed_client(&server)
        .fetch(FeedType::Vehicle, "Wellington")
        .await
        .unwrap();
    assert_eq!(payload.feed, FeedType::Vehicle);
    assert!(payload.url.ends_with("/vehicles/Wellington"));

    let collection = parse(&payload).unwrap();
    assert_eq!(collection.contents(), CollectionContents::Populated(2));
}

#[tokio::test]
async fn server_error_is_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/parking/Wellington"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = feed_client(&server)
        .fetch(FeedType::Parking, "Wellington")
        .await
        .err();
    assert!(matches!(err, Some(FetchError::Http { status: 500, .. })));
}

#[tokio::test]
async fn blank_body_is_empty_body_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("  \n"))
        .mount(&server)
        .await;

    let err = feed_client(&server)
        .fetch(FeedType::Vehicle, "Wellington")
        .await
        .err();
    assert!(matches!(err, Some(FetchError::EmptyBody { .. })));
}

#[tokio::test]
async fn slow_server_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(VEHICLES)
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = FeedClient::new(&server.uri(), Duration::from_millis(100)).unwrap();
    let err = client.fetch(FeedType::Vehicle, "Wellington").await.err();
    assert!(matches!(err, Some(FetchError::Transport { .. })));
}

#[tokio::test]
async fn unreachable_server_is_transport_error() {
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };
    let client = FeedClient::new(&uri, Duration::from_secs(1)).unwrap();
    let err = client.fetch(FeedType::Vehicle, "Wellington").await.err();
    assert!(matches!(err, Some(FetchError::Transport { .. })));
}

#[tokio::test]
async fn html_error_page_fails_to_parse() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let payload = feed_client(&server)
        .fetch(FeedType::Vehicle, "Wellington")
        .await
        .unwrap();
    assert!(matches!(parse(&payload), Err(ParseError::MalformedJson { .. })));
}

#[tokio::test]
async fn icon_fetch_decodes_png() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/icon.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes()))
        .mount(&server)
        .await;

    let fetcher = IconFetcher::new(Duration::from_secs(2), 64 * 1024).unwrap();
    let icon = fetcher
        .fetch_icon(&format!("{}/icon.png", server.uri()))
        .await
        .unwrap();
    assert_eq!((icon.width(), icon.height()), (4, 4));
}

#[tokio::test]
async fn icon_failures_yield_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/corrupt.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x89PNG garbage".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/huge.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0_u8; 4096]))
        .mount(&server)
        .await;

    let fetcher = IconFetcher::new(Duration::from_secs(2), 1024).unwrap();
    for name in ["missing.png", "corrupt.png", "huge.png"] {
        let icon = fetcher
            .fetch_icon(&format!("{}/{name}", server.uri()))
            .await;
        assert!(icon.is_none(), "expected no icon for {name}");
    }
    assert!(fetcher.fetch_icon("not a url").await.is_none());
}
