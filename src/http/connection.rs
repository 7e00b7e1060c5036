use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::{Config, RequestLimits};
use crate::http::parser::{ParseError, read_request};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::writer::ResponseWriter;
use crate::routing::{RequestHandler, ResourceProvider, RoutingPolicy};

pub const CORS_ALLOW_ORIGIN: (&str, &str) = ("Access-Control-Allow-Origin", "*");
pub const CORS_ALLOW_HEADERS: (&str, &str) = (
    "Access-Control-Allow-Headers",
    "Origin, X-Requested-With, Content-Type, Accept",
);

/// Per-connection knobs taken from the server configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionSettings {
    pub limits: RequestLimits,
    pub read_timeout: Option<Duration>,
}

impl From<&Config> for ConnectionSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            limits: cfg.limits,
            read_timeout: cfg.server.read_timeout(),
        }
    }
}

/// One accepted connection, plain or TLS.
///
/// Requests are served strictly one at a time: the next request is not read
/// until the previous response has been written.
///
/// With a pool attached, every exchange takes its own permit, from awaiting
/// the request until the response is written. A kept-alive connection then
/// queues behind connections that were already waiting.
pub struct Connection<S, P, R> {
    stream: BufReader<S>,
    handler: Arc<RequestHandler<P, R>>,
    settings: ConnectionSettings,
    pool: Option<Arc<Semaphore>>,
    state: ConnectionState,
}

pub enum ConnectionState {
    AwaitRequest,
    Dispatching(Request),
    Sending { response: Response, keep_alive: bool },
    Closed,
}

impl<S, P, R> Connection<S, P, R>
where
    S: AsyncRead + AsyncWrite + Unpin,
    P: RoutingPolicy,
    R: ResourceProvider,
{
    pub fn new(stream: S, handler: Arc<RequestHandler<P, R>>, settings: ConnectionSettings) -> Self {
        Self {
            stream: BufReader::new(stream),
            handler,
            settings,
            pool: None,
            state: ConnectionState::AwaitRequest,
        }
    }

    pub fn with_pool(mut self, pool: Arc<Semaphore>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mut slot: Option<OwnedSemaphorePermit> = None;

        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::AwaitRequest => {
                    if let Some(pool) = &self.pool {
                        match Arc::clone(pool).acquire_owned().await {
                            Ok(permit) => slot = Some(permit),
                            Err(_) => {
                                tracing::debug!("Pool closed, closing connection");
                                continue;
                            }
                        }
                    }

                    self.state = match self.next_request().await {
                        Ok(Some(req)) => ConnectionState::Dispatching(req),
                        Ok(None) => ConnectionState::Closed,
                        Err(e) if e.is_client_error() => {
                            tracing::warn!(error = %e, "Rejecting malformed request");
                            ConnectionState::Sending {
                                response: Response::bad_request(),
                                keep_alive: false,
                            }
                        }
                        Err(e) => {
                            tracing::debug!(error = %e, "Read failed, closing connection");
                            ConnectionState::Closed
                        }
                    };
                }

                ConnectionState::Dispatching(req) => {
                    let response = self.handler.handle(&req).await;
                    let keep_alive = should_keep_alive(&req, &response);

                    tracing::debug!(
                        method = %req.method,
                        path = %req.path,
                        status = response.status.as_u16(),
                        keep_alive,
                        "Request handled"
                    );

                    self.state = ConnectionState::Sending {
                        response,
                        keep_alive,
                    };
                }

                ConnectionState::Sending {
                    mut response,
                    keep_alive,
                } => {
                    self.prepare(&mut response, keep_alive);

                    let mut writer = ResponseWriter::new(&response)?;
                    writer.write_to_stream(self.stream.get_mut()).await?;
                    drop(slot.take());

                    if keep_alive {
                        self.state = ConnectionState::AwaitRequest;
                    } else {
                        if let Err(e) = self.stream.get_mut().shutdown().await {
                            tracing::debug!(error = %e, "Shutdown failed");
                        }
                        self.state = ConnectionState::Closed;
                    }
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        Ok(())
    }

    async fn next_request(&mut self) -> Result<Option<Request>, ParseError> {
        let limits = self.settings.limits;
        let Some(limit) = self.settings.read_timeout else {
            return read_request(&mut self.stream, &limits).await;
        };

        match tokio::time::timeout(limit, read_request(&mut self.stream, &limits)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(timeout = ?limit, "Idle connection timed out");
                Ok(None)
            }
        }
    }

    /// Headers every response leaves with.
    fn prepare(&self, response: &mut Response, keep_alive: bool) {
        for (key, value) in [CORS_ALLOW_ORIGIN, CORS_ALLOW_HEADERS] {
            response.headers.insert(key.to_string(), value.to_string());
        }
        response
            .headers
            .entry("Server".to_string())
            .or_insert_with(|| self.handler.server_name().to_string());

        if !keep_alive && !response.wants_close() {
            response
                .headers
                .insert("Connection".to_string(), "close".to_string());
        }
    }
}

/// Keep-alive decision for one exchange.
///
/// A response carrying `Connection: close` always closes. Otherwise HTTP/1.1
/// stays open unless the request asked to close, and HTTP/1.0 closes.
pub fn should_keep_alive(request: &Request, response: &Response) -> bool {
    if response.wants_close() {
        return false;
    }
    request.keep_alive()
}
