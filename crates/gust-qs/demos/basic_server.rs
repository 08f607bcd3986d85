//! Basic server echoing the parsed query (GET) and payload (POST).
//!
//! ```sh
//! PORT=8080 GUST_QS_OPTIONS='{"parserOptions":{"parseArrays":false}}' \
//!     RUST_LOG=debug cargo run -p gust-qs --example basic_server
//! curl 'localhost:8080/?unicorns[0][color]=blue'
//! ```

use gust_host::listener;
use gust_host::{Method, Payload, Response, RoutePayload, Server, ServerConfig};
use gust_qs::NestedQuery;
use serde_json::Value;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let options: Value = match std::env::var("GUST_QS_OPTIONS") {
        Ok(raw) => serde_json::from_str(&raw)?,
        Err(_) => Value::Null,
    };

    let server = Arc::new(Server::new(
        ServerConfig::new().port(port).strip_trailing_slash(true),
    ));
    server.register(&NestedQuery::new(), options)?;

    server.route(Method::Get, "/", RoutePayload::parse(), |req| {
        Response::json_value(&Value::Object(req.query.clone()))
    })?;
    server.route(Method::Post, "/", RoutePayload::parse(), |req| match &req.payload {
        Payload::Structured(value) => Response::json_value(value),
        Payload::Text(text) => Response::text(text.clone()),
        other => Response::text(other.kind()),
    })?;

    let listening = listener::start(server).await?;
    tracing::info!(addr = %listening.local_addr(), "basic server ready");

    tokio::signal::ctrl_c().await?;
    listening.stop().await;
    Ok(())
}
