//! Request lifecycle extension points
//!
//! Extensions run in registration order at a fixed point of the lifecycle:
//!
//! ```text
//! OnRequest -> route lookup -> OnPreAuth -> payload buffering -> OnPostAuth -> OnPreHandler -> handler
//! ```

use crate::{Request, Response};

/// Named stage in the request lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtPoint {
    /// Before routing. The URL and query may still be rewritten.
    OnRequest,
    /// After routing, before authentication and payload buffering
    OnPreAuth,
    /// After authentication and payload buffering
    OnPostAuth,
    /// Right before the handler
    OnPreHandler,
}

impl ExtPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtPoint::OnRequest => "onRequest",
            ExtPoint::OnPreAuth => "onPreAuth",
            ExtPoint::OnPostAuth => "onPostAuth",
            ExtPoint::OnPreHandler => "onPreHandler",
        }
    }

    fn index(&self) -> usize {
        match self {
            ExtPoint::OnRequest => 0,
            ExtPoint::OnPreAuth => 1,
            ExtPoint::OnPostAuth => 2,
            ExtPoint::OnPreHandler => 3,
        }
    }
}

impl std::fmt::Display for ExtPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extension trait - inspect or mutate the request at one lifecycle point
pub trait Extension: Send + Sync {
    /// Process the request. Returning a response ends the lifecycle early.
    fn run(&self, req: &mut Request) -> Option<Response>;
}

impl<F> Extension for F
where
    F: Fn(&mut Request) -> Option<Response> + Send + Sync,
{
    fn run(&self, req: &mut Request) -> Option<Response> {
        self(req)
    }
}

/// Extensions grouped by lifecycle point
#[derive(Default)]
pub struct ExtensionTable {
    points: [Vec<Box<dyn Extension>>; 4],
}

impl ExtensionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<E: Extension + 'static>(&mut self, point: ExtPoint, extension: E) {
        self.add_boxed(point, Box::new(extension));
    }

    pub fn add_boxed(&mut self, point: ExtPoint, extension: Box<dyn Extension>) {
        self.points[point.index()].push(extension);
    }

    /// Number of extensions registered at `point`
    pub fn len(&self, point: ExtPoint) -> usize {
        self.points[point.index()].len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.iter().all(Vec::is_empty)
    }

    /// Run every extension at `point`, return early response if any
    pub fn run(&self, point: ExtPoint, req: &mut Request) -> Option<Response> {
        for extension in &self.points[point.index()] {
            if let Some(res) = extension.run(req) {
                tracing::debug!(point = %point, status = res.status.as_u16(), "extension ended request");
                return Some(res);
            }
        }
        None
    }
}
