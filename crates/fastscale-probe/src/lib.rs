//! fastscale-probe — load signal sampling.
//!
//! Fetches a web-server status page (nginx `stub_status` style) and
//! extracts the `Active connections:` count.
//!
//! ```text
//! Active connections: 291
//! server accepts handled requests
//!  16630948 16630948 31070465
//! Reading: 6 Writing: 179 Waiting: 106
//! ```
//!
//! The request timeout equals the service's check interval, so a slow
//! status page can never hold a loop past its next tick. Certificate
//! validation is off: status pages are internal, often self-signed.

pub mod status;

pub use status::{
    parse_active_connections, HttpStatusProbe, ProbeError, ProbeFuture, ProbeResult, StatusProbe,
    ACTIVE_CONNECTIONS_MARKER,
};
