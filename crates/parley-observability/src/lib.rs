//! Parley observability: structured logging for the TUI and CLI.

pub mod error;
pub mod logging;

pub use error::{ObservabilityError, Result};
pub use logging::{endpoint_span, LogManager, LogSink};

/// Common imports
pub mod prelude {
    pub use crate::{LogManager, Result};
    pub use tracing::{debug, error, info, instrument, trace, warn, Span};
}
