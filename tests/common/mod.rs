//! Helpers shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use sentinel_httpd::http::request::Request;
use sentinel_httpd::http::response::Response;
use sentinel_httpd::routing::{ResourceError, ResourceProvider};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// A response as seen by a client.
#[derive(Debug)]
pub struct RawResponse {
    pub status_line: String,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|v| v.as_str())
    }
}

/// Reads one Content-Length framed response. `None` means the peer closed.
pub async fn read_response<R: AsyncBufRead + Unpin>(reader: &mut R) -> Option<RawResponse> {
    let mut status_line = String::new();
    if reader.read_line(&mut status_line).await.ok()? == 0 {
        return None;
    }
    let status_line = status_line.trim_end().to_string();
    let status = status_line.split(' ').nth(1)?.parse().ok()?;

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await.ok()?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        let (k, v) = line.split_once(':')?;
        headers.insert(k.to_string(), v.trim().to_string());
    }

    let len: usize = headers.get("Content-Length")?.parse().ok()?;
    let mut body = vec![0; len];
    reader.read_exact(&mut body).await.ok()?;

    Some(RawResponse {
        status_line,
        status,
        headers,
        body,
    })
}

/// Resources kept in memory, keyed by location.
#[derive(Default)]
pub struct MemoryResources {
    pub files: HashMap<PathBuf, Vec<u8>>,
    pub broken: Vec<PathBuf>,
}

impl MemoryResources {
    pub fn with_file(mut self, location: &str, bytes: &[u8]) -> Self {
        self.files.insert(PathBuf::from(location), bytes.to_vec());
        self
    }

    pub fn with_broken(mut self, location: &str) -> Self {
        self.broken.push(PathBuf::from(location));
        self
    }
}

impl ResourceProvider for MemoryResources {
    async fn fetch(&self, location: &Path) -> Result<Vec<u8>, ResourceError> {
        if self.broken.iter().any(|b| b == location) {
            return Err(ResourceError::Io(std::io::Error::other("disk on fire")));
        }
        self.files
            .get(location)
            .cloned()
            .ok_or(ResourceError::NotFound)
    }
}

/// Echoes the target back, and counts how often it ran.
pub struct EchoPolicy {
    pub calls: AtomicUsize,
}

impl EchoPolicy {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl sentinel_httpd::routing::RoutingPolicy for EchoPolicy {
    fn resolve(&self, request: &Request) -> Response {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match request.path.as_str() {
            "/file" => Response::resource("/mem/page.html"),
            "/missing" => Response::resource("/mem/nope.html"),
            "/broken" => Response::resource("/mem/broken.bin"),
            "/close" => {
                let mut response = Response::ok("bye");
                response
                    .headers
                    .insert("Connection".to_string(), "close".to_string());
                response
            }
            path => {
                let mut body = format!("{} {}", request.method, path).into_bytes();
                body.extend_from_slice(&request.body);
                Response::ok(body)
            }
        }
    }
}

/// A fresh directory under the system temp dir.
pub fn scratch_dir(tag: &str) -> PathBuf {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    let dir = std::env::temp_dir().join(format!(
        "sentinel-httpd-{}-{}-{}",
        tag,
        std::process::id(),
        NEXT.fetch_add(1, Ordering::SeqCst)
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
