//! Plugin registration
//!
//! A plugin receives a [`Registration`] and its raw options. Extensions it
//! adds are staged and only attached to the server once `register` returns
//! `Ok`, so a plugin that rejects its options leaves no hooks behind.

use crate::lifecycle::{ExtPoint, Extension};
use crate::Result;
use serde_json::Value;

/// Server plugin
pub trait Plugin {
    /// Unique plugin name
    fn name(&self) -> &'static str;

    /// Plugin version
    fn version(&self) -> &'static str {
        "0.0.0"
    }

    /// Validate `options` and add extensions. An error aborts registration.
    fn register(&self, registration: &mut Registration, options: Value) -> Result<()>;
}

/// Extensions staged by a plugin during registration
pub struct Registration {
    plugin: &'static str,
    pending: Vec<(ExtPoint, Box<dyn Extension>)>,
}

impl Registration {
    pub(crate) fn new(plugin: &'static str) -> Self {
        Self {
            plugin,
            pending: Vec::new(),
        }
    }

    /// Add an extension at `point`
    pub fn ext<E: Extension + 'static>(&mut self, point: ExtPoint, extension: E) {
        tracing::debug!(plugin = self.plugin, point = %point, "staging extension");
        self.pending.push((point, Box::new(extension)));
    }

    pub(crate) fn into_pending(self) -> Vec<(ExtPoint, Box<dyn Extension>)> {
        self.pending
    }
}
