use sentinel_httpd::http::request::{Method, Request, RequestBuilder, Version};
use std::collections::HashMap;

fn request_with(headers: &[(&str, &str)], version: Version) -> Request {
    Request {
        method: Method::GET,
        path: "/".to_string(),
        version,
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>(),
        body: vec![],
    }
}

#[test]
fn test_request_header_retrieval() {
    let req = request_with(
        &[("Host", "example.com"), ("Content-Type", "application/json")],
        Version::Http11,
    );

    assert_eq!(req.header("Host"), Some("example.com"));
    assert_eq!(req.header("Content-Type"), Some("application/json"));
    assert_eq!(req.header("host"), None);
    assert_eq!(req.header("Missing"), None);
}

#[test]
fn test_request_content_length_parsing() {
    assert_eq!(request_with(&[("Content-Length", "42")], Version::Http11).content_length(), 42);
    assert_eq!(request_with(&[], Version::Http11).content_length(), 0);
    assert_eq!(
        request_with(&[("Content-Length", "not-a-number")], Version::Http11).content_length(),
        0
    );
}

#[test]
fn test_request_keep_alive_http11_default() {
    assert!(request_with(&[], Version::Http11).keep_alive());
}

#[test]
fn test_request_keep_alive_close_any_case() {
    for value in ["close", "Close", "CLOSE"] {
        let req = request_with(&[("Connection", value)], Version::Http11);
        assert!(req.wants_close());
        assert!(!req.keep_alive());
    }
}

#[test]
fn test_request_http10_never_keeps_alive() {
    assert!(!request_with(&[], Version::Http10).keep_alive());
    assert!(!request_with(&[("Connection", "keep-alive")], Version::Http10).keep_alive());
}

#[test]
fn test_method_tokens() {
    let methods = [
        ("HEAD", Method::HEAD),
        ("GET", Method::GET),
        ("POST", Method::POST),
        ("PUT", Method::PUT),
        ("DELETE", Method::DELETE),
        ("OPTIONS", Method::OPTIONS),
    ];

    for (token, method) in methods {
        assert_eq!(Method::from_token(token), Some(method));
        assert_eq!(method.as_str(), token);
    }
    assert_eq!(Method::from_token("Get"), None);
    assert_eq!(Method::from_token("PATCH"), None);
}

#[test]
fn test_version_tokens() {
    assert_eq!(Version::from_token("HTTP/1.0"), Some(Version::Http10));
    assert_eq!(Version::from_token("HTTP/1.1"), Some(Version::Http11));
    assert_eq!(Version::from_token("HTTP/2"), None);
    assert_eq!(Version::from_token("http/1.1"), None);
}

#[test]
fn test_request_builder() {
    let req = RequestBuilder::new()
        .method(Method::POST)
        .path("/submit")
        .header("Content-Type", "text/plain")
        .body(b"data".to_vec())
        .build()
        .unwrap();

    assert_eq!(req.method, Method::POST);
    assert_eq!(req.version, Version::Http11);
    assert_eq!(req.body, b"data".to_vec());
}

#[test]
fn test_request_builder_requires_method_and_path() {
    assert!(RequestBuilder::new().path("/").build().is_err());
    assert!(RequestBuilder::new().method(Method::GET).build().is_err());
}
