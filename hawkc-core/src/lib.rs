//! # Hawk Core
//!
//! `hawkc_core` is the library powering the `hawkc` CLI. It is a blocking RPC client for
//! the Hawk model-indexing server, which speaks a Thrift-style compact binary protocol
//! either over a raw socket or tunnelled through HTTP `POST` requests.
//!
//! ## Layers
//!
//! * **[`transport`]:** Blocking byte streams with an explicit open/close lifecycle.
//!   [`transport::TcpTransport`] and [`transport::MemoryTransport`] are base transports;
//!   [`transport::HttpTransport`] is a decorator that frames the bytes of another one
//!   inside HTTP requests and responses.
//! * **[`protocol`]:** The compact wire format. Messages are first decoded into a
//!   schema-less [`protocol::Value`] tree, then projected onto typed values.
//! * **[`client`]:** The request/reply cycle ([`client::ServiceClient`]) and the typed
//!   Hawk stub ([`client::HawkClient`]).
//! * **[`config`]:** Defaults and the transport stack builder used by the CLI.
//!
//! Every failure ends up as a [`CallError`], whose [`ErrorKind`] tells which layer gave up.
//!
//! ## Ownership
//!
//! The caller owns the transport. Protocols and clients only borrow it, so they can never
//! outlive it, and only one call can be in flight on a transport at a time.
//!
//! See the README.md for more details about usage.
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;

pub use client::{HawkClient, HawkState, Instance};
pub use config::ClientConfig;
pub use error::{CallError, ErrorKind, RpcError};

// Re-exports
pub use bytes;
pub use http;
