//! # daylog
//!
//! daylog writes log lines to files that roll over at midnight. The heart of
//! the crate is [`RotatingFileWriter`]: a file named after the current date
//! that is closed and replaced by the file for the new date on the first
//! write after the day changes. **Rotation is driven by writes, not by a
//! timer**, so an idle writer costs nothing and a writer that sat idle for a
//! week moves straight to today's file.
//!
//! File paths come from a strftime pattern ([`PathTemplate`]), so the date
//! can name directories as well as files, e.g. `logs/%Y/%m/%Y-%m-%d.log`.
//! Missing directories are created on the fly. Days are counted in a
//! configurable [`TimeZone`].
//!
//! On top of the writer, [`Logger`] offers leveled logging with an info and an
//! error file, an optional stdout mirror, a verbosity counter for turning on
//! detailed logging per request, and macros that prefix each line with the
//! name of the calling function.
//!
//! ## Example
//!
//! ```rust
//! use daylog::{Logger, Stream};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     # let dir = tempfile::tempdir()?;
//!     # let log_dir = dir.path();
//!     let logger = Logger::new();
//!     logger.open(log_dir, ".txt", Stream::Info)?; // <log_dir>/2025-04-01.txt
//!     logger.open(log_dir, "-error.txt", Stream::Error)?; // <log_dir>/2025-04-01-error.txt
//!
//!     daylog::info!(logger, "server listening on port {}", 8080);
//!     daylog::error!(logger, "failed to load {}", "config.toml");
//!     {
//!         let _scope = logger.verbose_scope();
//!         daylog::verbose!(logger, "only written inside a verbose scope");
//!     }
//!
//!     logger.close()?;
//!     Ok(())
//! }
//! ```
//!
//! The writer also implements [`std::io::Write`], so it can serve as the
//! appender for `tracing_appender::non_blocking`. With the `tracing` feature
//! it implements `tracing_subscriber::fmt::MakeWriter` directly.

mod clock;
mod error;
mod logger;
mod template;
mod writer;

pub use {
    clock::{Clock, SystemClock, TimeZone},
    error::WriterError,
    logger::{Level, Logger, Stream, VerboseGuard},
    template::{PathTemplate, DAILY_FORMAT},
    writer::{write_optional, RotatingFileWriter, RotatingFileWriterBuilder, DIR_MODE, FILE_MODE},
};

#[doc(hidden)]
pub use logger::caller_tag;
