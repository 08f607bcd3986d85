//! Native HTTP/1.1 listener
//!
//! Serves a [`Server`] over TCP using hyper with:
//! - One tokio task per connection
//! - SO_REUSEPORT / TCP_NODELAY tuned sockets
//! - Bodies collected in full before the lifecycle runs

use crate::{Error, Method, Request, Response, Result, Server};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use socket2::{Domain, Protocol, Socket, Type};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Create a TCP socket with optimizations
pub fn create_optimized_socket(addr: &SocketAddr) -> std::io::Result<Socket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    // SO_REUSEADDR - allow binding to address in TIME_WAIT
    socket.set_reuse_address(true)?;

    // SO_REUSEPORT - enable kernel load balancing across threads
    #[cfg(unix)]
    socket.set_reuse_port(true)?;

    // TCP_NODELAY - disable Nagle's algorithm for lower latency
    socket.set_nodelay(true)?;

    socket.bind(&(*addr).into())?;
    socket.listen(1024)?;

    Ok(socket)
}

/// Convert hyper request parts and a collected body to our Request type
pub fn from_hyper_parts(parts: &http::request::Parts, body: Bytes) -> Result<Request> {
    let method: Method = parts.method.as_str().parse()?;
    let url = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let mut request = Request::new(method, url);
    for (name, value) in &parts.headers {
        let value = value
            .to_str()
            .map_err(|_| Error::InvalidHeader(name.to_string()))?;
        request.headers.push((name.to_string(), value.to_string()));
    }
    request.body = body;

    Ok(request)
}

/// Convert our Response to hyper Response
pub fn to_hyper_response(res: Response) -> hyper::Response<Full<Bytes>> {
    let mut response = hyper::Response::new(Full::new(res.body));
    *response.status_mut() = hyper::StatusCode::from_u16(res.status.as_u16())
        .unwrap_or(hyper::StatusCode::INTERNAL_SERVER_ERROR);

    for (name, value) in &res.headers {
        match (
            http::HeaderName::from_bytes(name.as_bytes()),
            http::HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().append(name, value);
            }
            _ => tracing::warn!(header = %name, "dropping invalid response header"),
        }
    }

    response
}

async fn handle(
    server: Arc<Server>,
    req: hyper::Request<Incoming>,
) -> std::result::Result<hyper::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            let res = Response::bad_request(&format!("Failed to read request body: {e}"));
            return Ok(to_hyper_response(res));
        }
    };

    let res = match from_hyper_parts(&parts, body) {
        Ok(request) => server.inject(request),
        Err(e) => Response::bad_request(&e.to_string()),
    };
    Ok(to_hyper_response(res))
}

/// Handle to a running listener
pub struct Listening {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl Listening {
    /// Bound address (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for the accept loop to exit
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::warn!(error = %e, "accept loop ended abnormally");
        }
    }
}

/// Bind `server.config()` and start serving in the background
pub async fn start(server: Arc<Server>) -> Result<Listening> {
    let config = server.config();
    let ip: IpAddr = config
        .hostname
        .parse()
        .map_err(|_| Error::Parse(format!("invalid listen hostname: {}", config.hostname)))?;
    let socket = create_optimized_socket(&SocketAddr::new(ip, config.port))?;
    socket.set_nonblocking(true)?;

    let listener = TcpListener::from_std(socket.into())?;
    let addr = listener.local_addr()?;
    let (tx, mut rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut rx => break,
                accepted = listener.accept() => {
                    let stream = match accepted {
                        Ok((stream, _)) => stream,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    let server = server.clone();
                    tokio::spawn(async move {
                        let service = service_fn(move |req| handle(server.clone(), req));
                        if let Err(e) = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service)
                            .await
                        {
                            tracing::debug!(error = %e, "connection error");
                        }
                    });
                }
            }
        }
    });

    tracing::info!(%addr, "listening");
    Ok(Listening {
        addr,
        shutdown: Some(tx),
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RoutePayload, ServerConfig};
    use serde_json::Value;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[test]
    fn test_to_hyper_response() {
        let res = to_hyper_response(Response::bad_request("nope"));
        assert_eq!(res.status(), hyper::StatusCode::BAD_REQUEST);
        assert_eq!(res.headers()["content-type"], "application/json");
    }

    #[test]
    fn test_from_hyper_parts() {
        let (parts, _) = hyper::Request::builder()
            .method("PATCH")
            .uri("/items?a%5Bb%5D=c")
            .header("content-type", "text/plain")
            .body(())
            .unwrap()
            .into_parts();

        let req = from_hyper_parts(&parts, Bytes::from_static(b"hi")).unwrap();
        assert_eq!(req.method, Method::Patch);
        assert_eq!(req.path, "/items");
        assert_eq!(req.query_string.as_deref(), Some("a%5Bb%5D=c"));
        assert_eq!(req.content_type(), Some("text/plain"));
        assert_eq!(&req.body[..], b"hi");
    }

    #[tokio::test]
    async fn test_serves_requests() {
        let server = Arc::new(Server::new(ServerConfig::new().hostname("127.0.0.1").port(0)));
        server
            .route(Method::Get, "/", RoutePayload::parse(), |req| {
                Response::json_value(&Value::Object(req.query.clone()))
            })
            .unwrap();

        let listening = start(server).await.unwrap();
        let mut stream = TcpStream::connect(listening.local_addr()).await.unwrap();
        stream
            .write_all(b"GET /?hello=world HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        assert!(raw.starts_with("HTTP/1.1 200"));
        assert!(raw.ends_with(r#"{"hello":"world"}"#));

        listening.stop().await;
    }
}
