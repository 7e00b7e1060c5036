//! Static site routes backed by a resource directory.

use std::path::{Component, Path, PathBuf};

use crate::http::request::{Method, Request};
use crate::http::response::{Response, ResponseBuilder, StatusCode};
use crate::routing::{ResourceError, ResourceProvider, RoutingPolicy};

/// Maps request targets onto files under a resource root.
///
/// - `/` serves `index.html`
/// - `/assets/<rest>` serves `<rest>` from the root
/// - any other target naming an existing file serves that file
/// - everything else is a 404 carrying `404.html`
///
/// No POST routes exist, so every POST is a 400.
#[derive(Debug, Clone)]
pub struct StaticRoutes {
    root: PathBuf,
}

impl StaticRoutes {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn route_get(&self, target: &str) -> Response {
        if target == "/" {
            return Response::resource(self.root.join("index.html"));
        }

        if let Some(rest) = target.strip_prefix("/assets/") {
            return Response::resource(self.root.join(rest));
        }

        // `resolve` is synchronous, so this is a blocking stat on the worker
        // task. Only metadata is touched; contents are read by the provider.
        let candidate = self.root.join(target.trim_start_matches('/'));
        if candidate.is_file() {
            return Response::resource(candidate);
        }

        tracing::warn!(path = %target, "There is no GET route");
        ResponseBuilder::new(StatusCode::NotFound)
            .resource(self.root.join("404.html"))
            .build()
    }
}

impl RoutingPolicy for StaticRoutes {
    fn resolve(&self, request: &Request) -> Response {
        let target = request.path_without_query();

        if escapes_root(target) {
            tracing::warn!(path = %request.path, "Rejected target outside resource root");
            return Response::status_page(StatusCode::Forbidden);
        }

        match request.method {
            Method::GET => self.route_get(target),
            _ => {
                tracing::warn!(method = %request.method, path = %request.path, "There is no route");
                Response::status_page(StatusCode::BadRequest)
            }
        }
    }
}

fn escapes_root(target: &str) -> bool {
    Path::new(target.trim_start_matches('/'))
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Reads resources from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsResources;

impl ResourceProvider for FsResources {
    async fn fetch(&self, location: &Path) -> Result<Vec<u8>, ResourceError> {
        let metadata = tokio::fs::metadata(location).await?;
        if !metadata.is_file() {
            return Err(ResourceError::NotFound);
        }
        Ok(tokio::fs::read(location).await?)
    }
}
