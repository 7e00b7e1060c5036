use sentinel_httpd::config::RequestLimits;
use sentinel_httpd::http::parser::read_request;
use sentinel_httpd::http::request::Version;
use sentinel_httpd::http::response::{ResponseBuilder, StatusCode};
use sentinel_httpd::http::writer::{ResponseWriter, serialize_request, serialize_response};

#[tokio::test]
async fn test_request_parse_serialize_round_trip() {
    let samples: [&[u8]; 3] = [
        b"GET /index.html HTTP/1.1\r\nHost: example.com\r\nAccept: */*\r\n\r\n",
        b"POST /form?x=1 HTTP/1.0\r\nContent-Type: text/plain\r\nContent-Length: 11\r\n\r\nhello world",
        b"OPTIONS * HTTP/1.1\r\nOrigin: http://a.example\r\n\r\n",
    ];

    for sample in samples {
        let mut input = sample;
        let parsed = read_request(&mut input, &RequestLimits::default())
            .await
            .unwrap()
            .unwrap();

        let bytes = serialize_request(&parsed);
        let mut again = bytes.as_slice();
        let reparsed = read_request(&mut again, &RequestLimits::default())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(parsed, reparsed);
    }
}

#[test]
fn test_serialize_response_layout() {
    let response = ResponseBuilder::new(StatusCode::NotFound)
        .version(Version::Http10)
        .header("X-Trace", "abc")
        .body(b"gone".to_vec())
        .build();

    let text = String::from_utf8(serialize_response(&response).unwrap()).unwrap();
    let (head, body) = text.split_once("\r\n\r\n").unwrap();
    let mut lines = head.split("\r\n");

    assert_eq!(lines.next(), Some("HTTP/1.0 404 Not Found"));
    let mut headers: Vec<&str> = lines.collect();
    headers.sort();
    assert_eq!(headers, vec!["Content-Length: 4", "X-Trace: abc"]);
    assert_eq!(body, "gone");
}

#[tokio::test]
async fn test_response_writer_writes_everything() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .body(vec![b'z'; 100_000])
        .build();
    let mut writer = ResponseWriter::new(&response).unwrap();
    let expected = writer.bytes().to_vec();

    let (mut client, mut server) = tokio::io::duplex(1024);
    let reader = tokio::spawn(async move {
        let mut out = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut client, &mut out)
            .await
            .unwrap();
        out
    });

    writer.write_to_stream(&mut server).await.unwrap();
    drop(server);

    assert_eq!(reader.await.unwrap(), expected);
}
