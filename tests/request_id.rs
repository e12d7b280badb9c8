use axum::{body::Body, http::Request};
use foodgram_api::middleware::request_id::{REQUEST_ID_HEADER, request_id};

#[test]
fn reads_the_request_id_header() {
    let request = Request::builder()
        .uri("/api/recipes")
        .header(REQUEST_ID_HEADER, "3f1c9a52-0000-4000-8000-000000000001")
        .body(Body::empty())
        .expect("request");
    assert_eq!(request_id(&request), "3f1c9a52-0000-4000-8000-000000000001");
}

#[test]
fn missing_request_id_is_a_dash() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("request");
    assert_eq!(request_id(&request), "-");
}
