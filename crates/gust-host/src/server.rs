//! Request lifecycle host
//!
//! Holds routes, extensions and registered plugins, and drives a request
//! through the lifecycle with [`Server::inject`]. The `native` listener
//! feeds network requests through the same path.

use crate::lifecycle::{ExtPoint, Extension, ExtensionTable};
use crate::payload::{self, RoutePayload};
use crate::plugin::{Plugin, Registration};
use crate::{Error, Method, Request, Response, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub hostname: String,
    /// Treat `/path/` as `/path` when matching routes
    pub strip_trailing_slash: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            hostname: "0.0.0.0".to_string(),
            strip_trailing_slash: false,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn strip_trailing_slash(mut self, strip: bool) -> Self {
        self.strip_trailing_slash = strip;
        self
    }
}

/// Route handler type
pub type Handler = Arc<dyn Fn(&Request) -> Response + Send + Sync>;

#[derive(Clone)]
struct Route {
    payload: RoutePayload,
    handler: Handler,
}

/// Server state shared across all connections
pub struct Server {
    config: ServerConfig,
    routes: RwLock<HashMap<(Method, String), Route>>,
    extensions: RwLock<ExtensionTable>,
    plugins: RwLock<Vec<(&'static str, &'static str)>>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            routes: RwLock::new(HashMap::new()),
            extensions: RwLock::new(ExtensionTable::new()),
            plugins: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Register a plugin with its raw options
    pub fn register<P: Plugin + ?Sized>(&self, plugin: &P, options: Value) -> Result<()> {
        let name = plugin.name();
        // Held across registration so each name is admitted once
        let mut plugins = self.plugins.write();
        if plugins.iter().any(|(n, _)| *n == name) {
            return Err(Error::DuplicatePlugin(name.to_string()));
        }

        let mut registration = Registration::new(name);
        plugin.register(&mut registration, options)?;

        let pending = registration.into_pending();
        let mut extensions = self.extensions.write();
        for (point, extension) in pending {
            extensions.add_boxed(point, extension);
        }
        plugins.push((name, plugin.version()));

        tracing::info!(plugin = name, version = plugin.version(), "plugin registered");
        Ok(())
    }

    /// Names of registered plugins, in registration order
    pub fn plugins(&self) -> Vec<&'static str> {
        self.plugins.read().iter().map(|(name, _)| *name).collect()
    }

    /// Add an extension directly, outside of any plugin
    pub fn ext<E: Extension + 'static>(&self, point: ExtPoint, extension: E) {
        self.extensions.write().add(point, extension);
    }

    /// Number of extensions at `point`
    pub fn ext_count(&self, point: ExtPoint) -> usize {
        self.extensions.read().len(point)
    }

    /// Add a route
    pub fn route<F>(&self, method: Method, path: &str, payload: RoutePayload, handler: F) -> Result<()>
    where
        F: Fn(&Request) -> Response + Send + Sync + 'static,
    {
        let key = (method, self.normalize(path).to_string());
        let mut routes = self.routes.write();
        if routes.contains_key(&key) {
            return Err(Error::DuplicateRoute {
                method: method.to_string(),
                path: path.to_string(),
            });
        }
        routes.insert(
            key,
            Route {
                payload,
                handler: Arc::new(handler),
            },
        );
        Ok(())
    }

    fn normalize<'a>(&self, path: &'a str) -> &'a str {
        if self.config.strip_trailing_slash && path.len() > 1 {
            if let Some(stripped) = path.strip_suffix('/') {
                return stripped;
            }
        }
        path
    }

    fn lookup(&self, method: Method, path: &str) -> Option<Route> {
        let key = (method, self.normalize(path).to_string());
        self.routes.read().get(&key).cloned()
    }

    /// Run a request through the full lifecycle
    pub fn inject(&self, mut req: Request) -> Response {
        let extensions = self.extensions.read();

        if let Some(res) = extensions.run(ExtPoint::OnRequest, &mut req) {
            return res;
        }

        let Some(route) = self.lookup(req.method, &req.path) else {
            tracing::debug!(method = %req.method, path = %req.path, "no route");
            return Response::not_found();
        };

        if let Some(res) = extensions.run(ExtPoint::OnPreAuth, &mut req) {
            return res;
        }

        if let Err(err) = payload::buffer(&mut req, &route.payload) {
            let message = match err {
                Error::Parse(message) => message,
                other => other.to_string(),
            };
            tracing::debug!(%message, "payload buffering failed");
            return Response::bad_request(&message);
        }

        for point in [ExtPoint::OnPostAuth, ExtPoint::OnPreHandler] {
            if let Some(res) = extensions.run(point, &mut req) {
                return res;
            }
        }
        drop(extensions);

        (route.handler)(&req)
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}
