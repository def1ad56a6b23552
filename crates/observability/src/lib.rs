//! Process-wide logging setup shared by the API binary and tests.

pub mod tracing;

/// Initialize logging for the process.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    tracing::init();
}
