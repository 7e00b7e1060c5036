//! Routing boundary.
//!
//! The connection worker knows nothing about URLs or files. It hands each
//! GET/POST request to a [`RoutingPolicy`], and when the returned response
//! names a resource, asks a [`ResourceProvider`] for the bytes.

pub mod handler;
pub mod static_files;

use std::future::Future;
use std::path::Path;

use thiserror::Error;

use crate::http::mime;
use crate::http::request::Request;
use crate::http::response::Response;

pub use handler::RequestHandler;
pub use static_files::{FsResources, StaticRoutes};

/// Maps a parsed request to a response.
///
/// Implementations never fail: routing problems are expressed as a
/// well-formed error response (400, 403, 404, 500).
///
/// Called directly on the connection task, so it must not do more than
/// brief blocking work such as a metadata lookup. Reading contents belongs
/// to the [`ResourceProvider`].
pub trait RoutingPolicy: Send + Sync + 'static {
    fn resolve(&self, request: &Request) -> Response;
}

impl<F> RoutingPolicy for F
where
    F: Fn(&Request) -> Response + Send + Sync + 'static,
{
    fn resolve(&self, request: &Request) -> Response {
        self(request)
    }
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource not found")]
    NotFound,
    #[error("failed to read resource: {0}")]
    Io(#[source] std::io::Error),
}

impl From<std::io::Error> for ResourceError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => ResourceError::NotFound,
            _ => ResourceError::Io(e),
        }
    }
}

/// Resolves a resource location to its bytes.
pub trait ResourceProvider: Send + Sync + 'static {
    fn fetch(&self, location: &Path)
    -> impl Future<Output = Result<Vec<u8>, ResourceError>> + Send;

    /// MIME type for an extension; unknown extensions map to octet-stream.
    fn content_type_for(&self, extension: &str) -> &'static str {
        mime::content_type_for(extension)
    }
}
