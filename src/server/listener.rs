use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{Instrument, info};

use crate::config::{Config, Scheme, ShutdownPolicy};
use crate::http::connection::{Connection, ConnectionSettings};
use crate::routing::{RequestHandler, ResourceProvider, RoutingPolicy};
use crate::server::{ServerError, StartupError, Transport, tls};

/// Pause after a failed accept so a persistent error (e.g. EMFILE) does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Owns the listening socket and the worker pool.
///
/// `start` spawns the acceptance loop; `stop` ends it, closes the pool and
/// releases the socket. A stopped server cannot be restarted.
pub struct Server<P, R> {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    transport: Transport,
    handler: Arc<RequestHandler<P, R>>,
    settings: ConnectionSettings,
    shutdown_policy: ShutdownPolicy,
    shutdown_grace: Option<Duration>,
    running: Arc<AtomicBool>,
    pool: Arc<Semaphore>,
    shutdown_tx: watch::Sender<bool>,
    accept_task: Option<JoinHandle<()>>,
}

impl<P, R> Server<P, R>
where
    P: RoutingPolicy,
    R: ResourceProvider,
{
    /// Binds the variant selected by `server.scheme`, loading TLS material for https.
    pub async fn bind(cfg: &Config, handler: RequestHandler<P, R>) -> Result<Self, StartupError> {
        let transport = match cfg.server.scheme {
            Scheme::Http => Transport::Plain,
            Scheme::Https => {
                let material = cfg
                    .tls
                    .as_ref()
                    .ok_or_else(|| StartupError::Config("https requires a tls section".into()))?;
                Transport::Tls(tls::load_acceptor(material)?)
            }
        };
        Self::bind_with(cfg, transport, handler).await
    }

    pub async fn bind_with(
        cfg: &Config,
        transport: Transport,
        handler: RequestHandler<P, R>,
    ) -> Result<Self, StartupError> {
        let workers = cfg.server.workers;
        if workers == 0 {
            return Err(StartupError::Config("server.workers must be at least 1".into()));
        }

        let addr = cfg.server.listen_addr.clone();
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(source) => return Err(StartupError::Bind { addr, source }),
        };
        let local_addr = match listener.local_addr() {
            Ok(local) => local,
            Err(source) => return Err(StartupError::Bind { addr, source }),
        };

        info!(
            address = %local_addr,
            scheme = transport.scheme(),
            workers,
            "Listener bound"
        );

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            listener: Some(listener),
            local_addr,
            transport,
            handler: Arc::new(handler),
            settings: ConnectionSettings::from(cfg),
            shutdown_policy: cfg.server.shutdown,
            shutdown_grace: cfg.server.shutdown_grace(),
            running: Arc::new(AtomicBool::new(false)),
            pool: Arc::new(Semaphore::new(workers)),
            shutdown_tx,
            accept_task: None,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts accepting connections on a background task.
    pub fn start(&mut self) -> Result<(), ServerError> {
        let Some(listener) = self.listener.take() else {
            return Err(ServerError::AlreadyStarted);
        };

        self.running.store(true, Ordering::SeqCst);

        let accept_loop = AcceptLoop {
            listener,
            transport: self.transport.clone(),
            handler: Arc::clone(&self.handler),
            settings: self.settings,
            pool: Arc::clone(&self.pool),
            shutdown: self.shutdown_tx.subscribe(),
            shutdown_policy: self.shutdown_policy,
            shutdown_grace: self.shutdown_grace,
        };
        self.accept_task = Some(tokio::spawn(accept_loop.run()));

        info!(
            "Webserver started: {}://{}",
            self.transport.scheme(),
            self.local_addr
        );
        Ok(())
    }

    /// Stops accepting, closes the pool and releases the listening socket.
    ///
    /// Connections still being served are drained or aborted according to
    /// the configured [`ShutdownPolicy`]; this returns once that is done.
    pub async fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.pool.close();
        self.shutdown_tx.send_replace(true);

        // Never started: drop the socket here.
        self.listener.take();

        if let Some(task) = self.accept_task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Acceptance loop ended abnormally");
            }
        }

        info!("The server has been shut down");
    }
}

struct AcceptLoop<P, R> {
    listener: TcpListener,
    transport: Transport,
    handler: Arc<RequestHandler<P, R>>,
    settings: ConnectionSettings,
    pool: Arc<Semaphore>,
    shutdown: watch::Receiver<bool>,
    shutdown_policy: ShutdownPolicy,
    shutdown_grace: Option<Duration>,
}

impl<P, R> AcceptLoop<P, R>
where
    P: RoutingPolicy,
    R: ResourceProvider,
{
    async fn run(self) {
        let AcceptLoop {
            listener,
            transport,
            handler,
            settings,
            pool,
            mut shutdown,
            shutdown_policy,
            shutdown_grace,
        } = self;

        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!(error = %e, "Connection task panicked");
                        }
                    }
                }

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(peer = %peer, "Accepted connection");
                        let work = serve(
                            stream,
                            peer,
                            transport.clone(),
                            Arc::clone(&handler),
                            settings,
                            Arc::clone(&pool),
                        );
                        tasks.spawn(work.instrument(tracing::debug_span!("connection", %peer)));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Error while accepting a connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        drop(listener);

        match shutdown_policy {
            ShutdownPolicy::Abandon => tasks.shutdown().await,
            ShutdownPolicy::Drain => {
                let in_flight = tasks.len();
                if in_flight > 0 {
                    info!(in_flight, "Draining connections");
                }

                let drain = async {
                    while tasks.join_next().await.is_some() {}
                };
                match shutdown_grace {
                    None => drain.await,
                    Some(grace) => {
                        if tokio::time::timeout(grace, drain).await.is_err() {
                            tracing::warn!(grace = ?grace, "Grace period elapsed, aborting connections");
                            tasks.shutdown().await;
                        }
                    }
                }
            }
        }
    }
}

/// Serves one accepted socket.
///
/// The TLS handshake and every exchange each take their own pool permit, so
/// a kept-alive connection goes back in line after each response.
async fn serve<P, R>(
    stream: TcpStream,
    peer: SocketAddr,
    transport: Transport,
    handler: Arc<RequestHandler<P, R>>,
    settings: ConnectionSettings,
    pool: Arc<Semaphore>,
) where
    P: RoutingPolicy,
    R: ResourceProvider,
{
    let result = match transport {
        Transport::Plain => {
            Connection::new(stream, handler, settings)
                .with_pool(pool)
                .run()
                .await
        }
        Transport::Tls(acceptor) => {
            let Ok(permit) = Arc::clone(&pool).acquire_owned().await else {
                tracing::debug!("Pool closed before the handshake");
                return;
            };
            let tls_stream = match acceptor.accept(stream).await {
                Ok(tls_stream) => tls_stream,
                Err(e) => {
                    tracing::debug!(error = %e, "TLS handshake failed");
                    return;
                }
            };
            drop(permit);

            Connection::new(tls_stream, handler, settings)
                .with_pool(pool)
                .run()
                .await
        }
    };

    if let Err(e) = result {
        tracing::error!("Connection error from {}: {}", peer, e);
    }
}
