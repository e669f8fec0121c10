//! Process-wide logging setup shared by the binary and the test suites.

/// Subscriber installation (filters, output format).
pub mod tracing;

pub use tracing::{DEFAULT_FILTER, init, init_for_tests};
