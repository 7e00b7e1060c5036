//! Server configuration.
//!
//! Loaded once at startup from YAML and passed by value into the server and
//! routing constructors.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use serde::Deserialize;

use crate::routing::handler::DEFAULT_SERVER_NAME;

pub const CONFIG_ENV: &str = "SENTINEL_CONFIG";
pub const LISTEN_ENV: &str = "LISTEN";
pub const DEFAULT_CONFIG_FILE: &str = "sentinel.yaml";
pub const DEFAULT_LOG_DATE_FORMAT: &str = "[year]-[month]-[day] [hour].[minute].[second]";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub tls: Option<TlsConfig>,
    pub static_files: StaticFilesConfig,
    pub limits: RequestLimits,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

/// What `stop()` does with connections that are still being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownPolicy {
    /// Wait for in-flight connections, up to the grace period if one is set.
    #[default]
    Drain,
    /// Abort in-flight connections immediately.
    Abandon,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub scheme: Scheme,
    /// Number of connections served concurrently.
    pub workers: usize,
    pub server_name: String,
    /// Idle limit while waiting for a request. Unset means wait forever.
    pub read_timeout_secs: Option<u64>,
    pub shutdown: ShutdownPolicy,
    pub shutdown_grace_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            scheme: Scheme::Http,
            workers: 16,
            server_name: DEFAULT_SERVER_NAME.to_string(),
            read_timeout_secs: None,
            shutdown: ShutdownPolicy::Drain,
            shutdown_grace_secs: Some(30),
        }
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }

    pub fn shutdown_grace(&self) -> Option<Duration> {
        self.shutdown_grace_secs.map(Duration::from_secs)
    }
}

/// PEM certificate chain and private key for the HTTPS variant.
#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    pub root: PathBuf,
    pub create_dirs: bool,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("public"),
            create_dirs: true,
        }
    }
}

/// Upper bounds applied while parsing a request.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RequestLimits {
    pub max_line_length: usize,
    pub max_headers: usize,
    pub max_body_size: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_line_length: 8 * 1024,
            max_headers: 100,
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

/// Kinds of record written to the log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogKind {
    /// Informational and debug records.
    Log,
    Warning,
    Error,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive for all output, overridden by `RUST_LOG`.
    pub level: String,
    /// Directory for the log file. Unset means console only.
    pub path: Option<PathBuf>,
    /// `time` format description used to name the file, e.g. `[year]-[month]-[day]`.
    pub file_date_format: String,
    pub file_kinds: Vec<LogKind>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            path: None,
            file_date_format: DEFAULT_LOG_DATE_FORMAT.to_string(),
            file_kinds: vec![LogKind::Log, LogKind::Warning, LogKind::Error],
        }
    }
}

impl Config {
    /// Loads the configuration file named by `SENTINEL_CONFIG`, falling back
    /// to `sentinel.yaml`, then to defaults when that file does not exist.
    ///
    /// `LISTEN` overrides the listen address.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let path = Path::new(&path);

        let mut cfg = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };

        if let Ok(addr) = std::env::var(LISTEN_ENV) {
            cfg.server.listen_addr = addr;
        }

        cfg.expand_paths()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_yaml_str(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        self.server
            .listen_addr
            .parse()
            .with_context(|| format!("invalid listen address {:?}", self.server.listen_addr))
    }

    /// Rewrites paths starting with the `curdir` keyword to the working directory.
    pub fn expand_paths(&mut self) -> anyhow::Result<()> {
        let cwd = std::env::current_dir().context("resolving working directory")?;

        self.static_files.root = expand_curdir(&self.static_files.root, &cwd);
        if let Some(tls) = self.tls.as_mut() {
            tls.cert_path = expand_curdir(&tls.cert_path, &cwd);
            tls.key_path = expand_curdir(&tls.key_path, &cwd);
        }
        if let Some(dir) = self.logging.path.as_mut() {
            *dir = expand_curdir(dir, &cwd);
        }
        Ok(())
    }

    /// Creates the resource root and log directory when `create_dirs` is set.
    pub fn create_dirs(&self) -> anyhow::Result<()> {
        if !self.static_files.create_dirs {
            return Ok(());
        }

        let dirs = std::iter::once(&self.static_files.root).chain(self.logging.path.as_ref());
        for dir in dirs {
            if !dir.exists() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("creating directory {}", dir.display()))?;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.listen_addr()?;

        if self.server.workers == 0 {
            bail!("server.workers must be at least 1");
        }

        if self.server.scheme == Scheme::Https {
            let Some(tls) = &self.tls else {
                bail!("https requires a tls section with cert_path and key_path");
            };
            if tls.cert_path.as_os_str().is_empty() {
                bail!("tls.cert_path must not be empty");
            }
            if tls.key_path.as_os_str().is_empty() {
                bail!("tls.key_path must not be empty");
            }
        }

        if self.static_files.root.as_os_str().is_empty() {
            bail!("static_files.root must not be empty");
        }

        if let Some(dir) = &self.logging.path {
            if dir.as_os_str().is_empty() {
                bail!("logging.path must not be empty when set");
            }
            time::format_description::parse(&self.logging.file_date_format).with_context(|| {
                format!("invalid logging.file_date_format {:?}", self.logging.file_date_format)
            })?;
            if self.logging.file_kinds.is_empty() {
                bail!("logging.file_kinds must name at least one of LOG, WARNING, ERROR");
            }
        }

        Ok(())
    }
}

/// Replaces a leading `curdir` (any case) with `cwd`.
pub fn expand_curdir(path: &Path, cwd: &Path) -> PathBuf {
    let Some(raw) = path.to_str() else {
        return path.to_path_buf();
    };

    match raw.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("curdir") => {
            let rest = raw[6..].trim_start_matches(['/', '\\']);
            cwd.join(rest)
        }
        _ => path.to_path_buf(),
    }
}
