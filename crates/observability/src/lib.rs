//! Process-wide logging setup.

/// Subscriber configuration (filters, formatting).
pub mod tracing;

/// Install the process-wide subscriber. Later calls are no-ops.
pub fn init() {
    tracing::init();
}
