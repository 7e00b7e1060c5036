use std::path::PathBuf;

use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::request::Request;
use crate::http::response::{Body, Response};

const CRLF: &[u8] = b"\r\n";

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("response still references unresolved resource {0:?}")]
    UnresolvedResource(PathBuf),
    #[error("connection closed while writing")]
    Closed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn write_header(buf: &mut Vec<u8>, key: &str, value: &str) {
    buf.extend_from_slice(key.as_bytes());
    buf.extend_from_slice(b": ");
    buf.extend_from_slice(value.as_bytes());
    buf.extend_from_slice(CRLF);
}

/// Serializes a response: status line, headers, blank line, body.
///
/// `Content-Length` always reflects the actual body length, whatever the
/// header map says.
pub fn serialize_response(resp: &Response) -> Result<Vec<u8>, WriteError> {
    if let Body::Resource(location) = &resp.body {
        return Err(WriteError::UnresolvedResource(location.clone()));
    }
    let body = resp.body.as_bytes();

    let mut buf = Vec::with_capacity(128 + body.len());

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        resp.version,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    for (k, v) in &resp.headers {
        if k == "Content-Length" {
            continue;
        }
        write_header(&mut buf, k, v);
    }
    write_header(&mut buf, "Content-Length", &body.len().to_string());

    buf.extend_from_slice(CRLF);
    buf.extend_from_slice(body);

    Ok(buf)
}

/// Serializes a request in the same framing the parser reads.
///
/// A non-empty body always gets a matching `Content-Length`.
pub fn serialize_request(req: &Request) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128 + req.body.len());

    let start_line = format!("{} {} {}\r\n", req.method, req.path, req.version);
    buf.extend_from_slice(start_line.as_bytes());

    let has_body = !req.body.is_empty();
    for (k, v) in &req.headers {
        if has_body && k == "Content-Length" {
            continue;
        }
        write_header(&mut buf, k, v);
    }
    if has_body {
        write_header(&mut buf, "Content-Length", &req.body.len().to_string());
    }

    buf.extend_from_slice(CRLF);
    buf.extend_from_slice(&req.body);

    buf
}

/// A serialized response and how much of it has reached the peer.
pub struct ResponseWriter {
    buffer: Vec<u8>,
    written: usize,
}

impl ResponseWriter {
    pub fn new(response: &Response) -> Result<Self, WriteError> {
        Ok(Self {
            buffer: serialize_response(response)?,
            written: 0,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub async fn write_to_stream<W>(&mut self, stream: &mut W) -> Result<(), WriteError>
    where
        W: AsyncWrite + Unpin,
    {
        while self.written < self.buffer.len() {
            let n = stream.write(&self.buffer[self.written..]).await?;

            if n == 0 {
                return Err(WriteError::Closed);
            }

            self.written += n;
        }

        stream.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::{ResponseBuilder, StatusCode};

    #[test]
    fn stale_content_length_is_overwritten() {
        let mut response = ResponseBuilder::new(StatusCode::Ok)
            .body(b"abc".to_vec())
            .build();
        response
            .headers
            .insert("Content-Length".to_string(), "999".to_string());

        let bytes = serialize_response(&response).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 3\r\n"));
        assert!(!text.contains("999"));
        assert!(text.ends_with("\r\n\r\nabc"));
    }

    #[test]
    fn empty_body_gets_zero_length() {
        let response = Response::empty(StatusCode::NoContent);
        let text = String::from_utf8(serialize_response(&response).unwrap()).unwrap();

        assert_eq!(text, "HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n");
    }

    #[test]
    fn unresolved_resource_is_refused() {
        let response = Response::resource("/srv/www/index.html");
        assert!(matches!(
            serialize_response(&response),
            Err(WriteError::UnresolvedResource(_))
        ));
    }
}
