// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! spanlog - in-process structured logging and tracing.
//!
//! Leveled log emission, hierarchical spans and a synchronous fan-out
//! subscriber bus, tied together by an orchestrator that instruments units
//! of work with automatic span lifecycle and error capture. Everything is
//! in memory and local to the process; nothing is persisted or exported.
//!
//! # Architecture
//!
//! - [`types`] - Log levels, records and span contexts
//! - [`ids`] - Span and trace identifiers
//! - [`subscriber`] - The subscriber trait and fan-out list
//! - [`logger`] - Per-target loggers and the console formatter
//! - [`tracer`] - Spans, the active-span registry and current-span propagation
//! - [`diagnostics`] - The orchestrator and `instrument` helpers
//! - [`metrics`] - Counters and durations for instrumented operations
//! - [`config`] - Configuration loading and merging
//! - [`error`] - Error types and result aliases
//! - [`init`] - Setup of the crate's own `tracing` output
//!
//! # Example
//!
//! ```rust,ignore
//! use spanlog::{Diagnostics, DiagnosticsConfig, MemorySubscriber};
//!
//! let diagnostics = Diagnostics::new(DiagnosticsConfig::default());
//! diagnostics.subscribe(MemorySubscriber::shared());
//!
//! let total: Result<u32, String> = diagnostics.instrument("sum", None, None, |log| {
//!     log.info("adding", None);
//!     Ok(2 + 2)
//! });
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod ids;
pub mod init;
pub mod logger;
pub mod metrics;
pub mod subscriber;
pub mod tracer;
pub mod types;

// Re-export commonly used types at crate root
pub use config::{load_config, DiagnosticsConfig};
pub use diagnostics::Diagnostics;
pub use error::{ConfigError, DiagnosticsError, Result};
pub use ids::{SpanId, TraceId};
pub use logger::{LogOutput, Logger, LoggerConfig};
pub use subscriber::{MemorySubscriber, SharedSubscriber, Subscriber, TracingForwarder};
pub use tracer::{Span, Tracer};
pub use types::{fields, FieldValue, Fields, LogLevel, LogRecord, SpanContext};

/// spanlog version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_exports() {
        let _diagnostics = Diagnostics::default();
        let _logger = Logger::with_defaults("test");
        let _tracer = Tracer::new();
        let _level = LogLevel::default();
    }
}
