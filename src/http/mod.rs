//! HTTP/1.x protocol implementation.
//!
//! # Architecture
//!
//! - **`connection`**: the per-connection worker and its state machine
//! - **`parser`**: reads a request off a buffered byte stream
//! - **`request`**: request, method and version types
//! - **`response`**: response, status and body types with a builder
//! - **`writer`**: serializes messages and writes them to the client
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌────────────────┐
//!        │  AwaitRequest  │ ← Read one request (EOF → Closed)
//!        └──────┬─────────┘
//!               │ Request parsed          Malformed → 400, close
//!               ▼
//!        ┌────────────────┐
//!        │  Dispatching   │ ← Routing policy, resource resolution
//!        └──────┬─────────┘
//!               │ Response ready, keep-alive decided
//!               ▼
//!        ┌────────────────┐
//!        │    Sending     │ ← CORS headers, write response
//!        └──────┬─────────┘
//!               ├─ Keep-Alive → AwaitRequest (same connection)
//!               └─ Close → shutdown socket → Closed
//! ```

pub mod connection;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
