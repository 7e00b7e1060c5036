use crate::http::mime;
use crate::http::request::{Method, Request};
use crate::http::response::{Body, Response, StatusCode};
use crate::routing::{ResourceError, ResourceProvider, RoutingPolicy};

pub const DEFAULT_SERVER_NAME: &str = concat!("Sentinel/", env!("CARGO_PKG_VERSION"));

/// Turns one request into one finished response.
///
/// Shared by every connection of a server behind an `Arc`; it holds no
/// per-connection state.
pub struct RequestHandler<P, R> {
    policy: P,
    resources: R,
    server_name: String,
}

impl<P, R> RequestHandler<P, R>
where
    P: RoutingPolicy,
    R: ResourceProvider,
{
    pub fn new(policy: P, resources: R) -> Self {
        Self {
            policy,
            resources,
            server_name: DEFAULT_SERVER_NAME.to_string(),
        }
    }

    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Produces the response for `request`.
    ///
    /// OPTIONS answers 200 without consulting the policy. GET and POST go
    /// through the policy and then resource resolution. Other methods get 405.
    pub async fn handle(&self, request: &Request) -> Response {
        let mut response = match request.method {
            Method::OPTIONS => Response::empty(StatusCode::Ok),
            Method::GET | Method::POST => {
                let response = self.policy.resolve(request);
                self.resolve_resource(response).await
            }
            Method::HEAD | Method::PUT | Method::DELETE => {
                tracing::debug!(method = %request.method, path = %request.path, "Method not routed");
                Response::status_page(StatusCode::MethodNotAllowed)
            }
        };

        response.version = request.version;
        response
    }

    /// Replaces a resource reference with the resource's bytes.
    ///
    /// The policy's status is kept on success; a missing resource becomes 404
    /// and any other read failure 500.
    pub async fn resolve_resource(&self, mut response: Response) -> Response {
        let Body::Resource(location) = &response.body else {
            return response;
        };
        let location = location.clone();

        match self.resources.fetch(&location).await {
            Ok(bytes) => {
                let content_type = location
                    .to_str()
                    .and_then(mime::extension_of)
                    .map(|ext| self.resources.content_type_for(ext))
                    .unwrap_or(mime::OCTET_STREAM);
                response
                    .headers
                    .insert("Content-Type".to_string(), content_type.to_string());
                response.set_body(bytes);
            }
            Err(ResourceError::NotFound) => {
                tracing::warn!(resource = %location.display(), "Unable to find resource");
                replace_with_status_page(&mut response, StatusCode::NotFound);
            }
            Err(e) => {
                tracing::error!(resource = %location.display(), error = %e, "Unable to read resource");
                replace_with_status_page(&mut response, StatusCode::InternalServerError);
            }
        }

        response
    }
}

fn replace_with_status_page(response: &mut Response, status: StatusCode) {
    let page = Response::status_page(status);
    response.status = status;
    response.headers.extend(page.headers);
    response.body = page.body;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::{RequestBuilder, Version};
    use std::path::Path;

    struct Missing;

    impl ResourceProvider for Missing {
        async fn fetch(&self, _location: &Path) -> Result<Vec<u8>, ResourceError> {
            Err(ResourceError::NotFound)
        }
    }

    #[tokio::test]
    async fn options_skips_the_policy() {
        let handler = RequestHandler::new(
            |_: &Request| -> Response { panic!("policy must not run for OPTIONS") },
            Missing,
        );
        let request = RequestBuilder::new()
            .method(Method::OPTIONS)
            .path("*")
            .build()
            .unwrap();

        let response = handler.handle(&request).await;

        assert_eq!(response.status, StatusCode::Ok);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn missing_resource_becomes_not_found() {
        let handler = RequestHandler::new(|_: &Request| Response::resource("/x/index.html"), Missing);
        let request = RequestBuilder::new()
            .method(Method::GET)
            .path("/")
            .build()
            .unwrap();

        let response = handler.handle(&request).await;

        assert_eq!(response.status, StatusCode::NotFound);
        assert_eq!(response.body, Body::Bytes(b"404 Not Found".to_vec()));
    }

    #[tokio::test]
    async fn policy_error_status_survives() {
        let handler = RequestHandler::new(
            |_: &Request| Response::status_page(StatusCode::BadRequest),
            Missing,
        );
        let request = RequestBuilder::new()
            .method(Method::POST)
            .path("/nowhere")
            .version(Version::Http10)
            .build()
            .unwrap();

        let response = handler.handle(&request).await;

        assert_eq!(response.status, StatusCode::BadRequest);
        assert_eq!(response.version, Version::Http10);
    }
}
