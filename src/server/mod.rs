//! Listening socket, acceptance loop and worker pool.
//!
//! The plain and TLS variants share everything except the handshake: a
//! [`Transport`] decides whether an accepted socket is wrapped before the
//! connection worker sees it.

pub mod listener;
pub mod tls;

use thiserror::Error;
use tokio_rustls::TlsAcceptor;

pub use listener::Server;

/// Conditions that stop a server from being built. Always fatal.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("TLS setup failed: {0}")]
    Tls(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server was already started")]
    AlreadyStarted,
}

/// How accepted sockets are prepared before HTTP framing begins.
#[derive(Clone)]
pub enum Transport {
    Plain,
    Tls(TlsAcceptor),
}

impl Transport {
    pub fn scheme(&self) -> &'static str {
        match self {
            Transport::Plain => "http",
            Transport::Tls(_) => "https",
        }
    }
}
