//! Lifecycle event recording for operator visibility.
//!
//! Every reconcile function emits created / reused / failed events so
//! an operator can see which resource and which operation happened
//! without inspecting logs. The default recorder writes structured
//! tracing records; callers with a richer event channel implement
//! [`EventRecorder`] themselves.

use tracing::{info, warn};

use crate::cloud::types::ResourceKind;

/// Sink for human-readable lifecycle events.
pub trait EventRecorder: Send + Sync {
    /// A resource was created
    fn created(&self, kind: ResourceKind, name: &str, id: &str);

    /// An existing resource was reused without further remote calls
    fn reused(&self, kind: ResourceKind, name: &str, id: &str);

    /// A resource was deleted
    fn deleted(&self, kind: ResourceKind, name: &str);

    /// An operation on a resource failed
    fn failed(&self, kind: ResourceKind, name: &str, message: &str);
}

/// Recorder that writes events as structured tracing records.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogRecorder;

impl EventRecorder for LogRecorder {
    fn created(&self, kind: ResourceKind, name: &str, id: &str) {
        info!(kind = %kind, name = %name, id = %id, "created");
    }

    fn reused(&self, kind: ResourceKind, name: &str, id: &str) {
        info!(kind = %kind, name = %name, id = %id, "reused existing resource");
    }

    fn deleted(&self, kind: ResourceKind, name: &str) {
        info!(kind = %kind, name = %name, "deleted");
    }

    fn failed(&self, kind: ResourceKind, name: &str, message: &str) {
        warn!(kind = %kind, name = %name, message = %message, "operation failed");
    }
}
