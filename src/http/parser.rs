use std::collections::HashMap;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::config::RequestLimits;
use crate::http::request::{Method, Request, Version};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed request: {0}")]
    MalformedRequest(&'static str),
    #[error("line exceeds {0} bytes")]
    LineTooLong(usize),
    #[error("more than {0} headers")]
    TooManyHeaders(usize),
    #[error("body of {0} bytes exceeds the configured limit")]
    BodyTooLarge(usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// Whether the peer sent bytes we can answer with 400.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ParseError::Io(_))
    }
}

/// Reads one request off the stream.
///
/// Returns `Ok(None)` when the stream ends before the first byte of a
/// start-line, which is how a client closes a kept-alive connection.
///
/// A body shorter than its Content-Length (peer closed early) is returned
/// as-is rather than failing.
pub async fn read_request<R>(
    reader: &mut R,
    limits: &RequestLimits,
) -> Result<Option<Request>, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let Some(start_line) = read_line(reader, limits.max_line_length).await? else {
        return Ok(None);
    };
    let (method, path, version) = parse_start_line(&start_line)?;

    let mut headers = HashMap::new();
    let mut count = 0usize;
    // EOF inside the header block ends it.
    while let Some(line) = read_line(reader, limits.max_line_length).await? {
        if line.is_empty() {
            break;
        }
        count += 1;
        if count > limits.max_headers {
            return Err(ParseError::TooManyHeaders(limits.max_headers));
        }
        let (key, value) = parse_header_line(&line)?;
        headers.insert(key, value);
    }

    let content_length = headers
        .get("Content-Length")
        .map(|v: &String| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| ParseError::MalformedRequest("invalid Content-Length"))
        })
        .transpose()?
        .unwrap_or(0);

    if content_length > limits.max_body_size {
        return Err(ParseError::BodyTooLarge(content_length));
    }

    let mut body = Vec::with_capacity(content_length);
    if content_length > 0 {
        (&mut *reader)
            .take(content_length as u64)
            .read_to_end(&mut body)
            .await?;
    }

    Ok(Some(Request {
        method,
        path,
        version,
        headers,
        body,
    }))
}

/// Reads bytes up to and excluding a CRLF.
///
/// A bare LF is ordinary content. If the stream ends mid-line, whatever was
/// buffered is returned as the final line; `None` means nothing was buffered.
pub async fn read_line<R>(reader: &mut R, max_len: usize) -> Result<Option<String>, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let cap = max_len + 2;
    let mut line = Vec::new();

    loop {
        let budget = (cap - line.len()) as u64;
        let n = (&mut *reader)
            .take(budget)
            .read_until(b'\n', &mut line)
            .await?;

        if n == 0 {
            if line.is_empty() {
                return Ok(None);
            }
            break;
        }
        if line.ends_with(b"\r\n") {
            line.truncate(line.len() - 2);
            break;
        }
        if line.len() >= cap {
            return Err(ParseError::LineTooLong(max_len));
        }
        if !line.ends_with(b"\n") {
            // EOF mid-line
            break;
        }
    }

    String::from_utf8(line)
        .map(Some)
        .map_err(|_| ParseError::MalformedRequest("line is not valid UTF-8"))
}

/// Splits `METHOD SP target SP version` into its parts.
pub fn parse_start_line(line: &str) -> Result<(Method, String, Version), ParseError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let &[method, path, version] = parts.as_slice() else {
        return Err(ParseError::MalformedRequest("start-line needs three tokens"));
    };

    let method =
        Method::from_token(method).ok_or(ParseError::MalformedRequest("unknown method"))?;
    let version =
        Version::from_token(version).ok_or(ParseError::MalformedRequest("unsupported version"))?;

    Ok((method, path.to_string(), version))
}

/// Splits a header line on its first colon and trims the value.
pub fn parse_header_line(line: &str) -> Result<(String, String), ParseError> {
    let (key, value) = line
        .split_once(':')
        .ok_or(ParseError::MalformedRequest("header without colon"))?;

    Ok((key.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parse_simple_get() {
        let mut input: &[u8] = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";

        let parsed = read_request(&mut input, &RequestLimits::default())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(parsed.path, "/");
        assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
        assert!(input.is_empty());
    }

    #[tokio::test]
    async fn bare_lf_does_not_end_a_line() {
        let mut input: &[u8] = b"abc\ndef\r\nrest";

        let line = read_line(&mut input, 64).await.unwrap().unwrap();

        assert_eq!(line, "abc\ndef");
        assert_eq!(input, b"rest");
    }

    #[tokio::test]
    async fn eof_mid_line_yields_buffered_bytes() {
        let mut input: &[u8] = b"partial";

        assert_eq!(read_line(&mut input, 64).await.unwrap().unwrap(), "partial");
        assert!(read_line(&mut input, 64).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn overlong_line_is_rejected() {
        let mut input: &[u8] = b"0123456789\r\n";

        let result = read_line(&mut input, 4).await;

        assert!(matches!(result, Err(ParseError::LineTooLong(4))));
    }

    #[test]
    fn start_line_with_extra_tokens_is_malformed() {
        let result = parse_start_line("GET /a b HTTP/1.1");
        assert!(matches!(result, Err(ParseError::MalformedRequest(_))));
    }
}
