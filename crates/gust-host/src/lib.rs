//! gust-host: Minimal request lifecycle host
//!
//! Provides the extension points, plugin registration and payload buffering
//! that request-interception plugins attach to. Requests can be driven
//! in-process with [`Server::inject`] or over the network with the
//! `native` listener.
//!
//! ## Features
//! - `native` - HTTP/1.1 listener with tokio/hyper

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod error;
pub mod request;
pub mod response;
pub mod payload;
pub mod lifecycle;
pub mod plugin;
pub mod server;

#[cfg(feature = "native")]
pub mod listener;

// Re-exports
pub use error::{Error, Result};
pub use request::{Method, Request, RequestBuilder};
pub use response::{Response, ResponseBuilder, StatusCode};
pub use payload::{Payload, PayloadOutput, PayloadStream, RoutePayload};
pub use lifecycle::{ExtPoint, Extension, ExtensionTable};
pub use plugin::{Plugin, Registration};
pub use server::{Handler, Server, ServerConfig};

#[cfg(feature = "native")]
pub use listener::{create_optimized_socket, from_hyper_parts, to_hyper_response, Listening};
