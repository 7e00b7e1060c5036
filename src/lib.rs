//! Sentinel httpd - a small HTTP/1.x server engine
//!
//! Accepts plain or TLS connections, parses requests off the wire, hands
//! them to a routing policy and writes the responses back, keeping
//! connections alive where HTTP/1.x allows.

pub mod config;
pub mod http;
pub mod logging;
pub mod routing;
pub mod server;
