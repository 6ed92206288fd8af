//! Leveled logging on top of two rotating files.
//!
//! A [`Logger`] holds an info stream and an error stream. Info and verbose
//! lines go to the info stream; error and fatal lines go to the error stream,
//! or to the info stream when no error stream is open. Lines are prefixed
//! with the name of the calling function by the [`info!`](crate::info),
//! [`error!`](crate::error), [`verbose!`](crate::verbose) and
//! [`fatal!`](crate::fatal) macros.
//!
//! Logging never fails from the caller's point of view: a line that cannot be
//! written is dropped. Use [`Logger::write_stream`] to see the errors.

use {
    crate::{write_optional, RotatingFileWriter, WriterError},
    std::{
        borrow::Cow,
        fmt,
        io::{self, Write as _},
        path::Path,
        process,
        sync::{
            atomic::{AtomicBool, AtomicI32, Ordering},
            Arc, PoisonError, RwLock,
        },
    },
    url::Url,
};

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Detailed output, only written while verbose logging is on.
    Verbose,
    Info,
    Error,
    /// Written like an error, then the process exits.
    Fatal,
}

/// One of the two files a [`Logger`] writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Info,
    Error,
}

type Slot = RwLock<Option<Arc<RotatingFileWriter>>>;

/// Logger state: the open streams, the stdout mirror flag and the verbosity
/// counter.
///
/// A logger starts with no streams, in which case every log call is a no-op.
/// It is shared by reference (or in an `Arc`, or a `static`) with whatever
/// needs to log.
///
/// ```no_run
/// use daylog::{Logger, Stream};
///
/// static LOG: Logger = Logger::new();
///
/// fn main() -> Result<(), daylog::WriterError> {
///     LOG.open("./logs", ".txt", Stream::Info)?;
///     LOG.open("./logs", "-error.txt", Stream::Error)?;
///     daylog::info!(LOG, "listening on port {}", 8080);
///     LOG.close()
/// }
/// ```
#[derive(Debug, Default)]
pub struct Logger {
    info: Slot,
    error: Slot,
    echo_stdout: AtomicBool,
    verbosity: AtomicI32,
}

impl Logger {
    pub const fn new() -> Self {
        Logger {
            info: RwLock::new(None),
            error: RwLock::new(None),
            echo_stdout: AtomicBool::new(false),
            verbosity: AtomicI32::new(0),
        }
    }

    fn slot(&self, stream: Stream) -> &Slot {
        match stream {
            Stream::Info => &self.info,
            Stream::Error => &self.error,
        }
    }

    fn writer(&self, stream: Stream) -> Option<Arc<RotatingFileWriter>> {
        self.slot(stream).read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Open a daily file in `dir` named `YYYY-MM-DD<suffix>` for `stream`.
    pub fn open<P: AsRef<Path>>(&self, dir: P, suffix: &str, stream: Stream) -> Result<(), WriterError> {
        self.attach(stream, RotatingFileWriter::open_daily(dir, suffix)?);
        Ok(())
    }

    /// Open a file for `stream` from a strftime path pattern.
    pub fn open_template(&self, pattern: &str, stream: Stream) -> Result<(), WriterError> {
        self.attach(stream, RotatingFileWriter::open(pattern)?);
        Ok(())
    }

    /// Use an already built writer for `stream`. A writer previously attached
    /// to the stream is closed.
    pub fn attach(&self, stream: Stream, writer: RotatingFileWriter) {
        let previous = self
            .slot(stream)
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Arc::new(writer));
        if let Some(previous) = previous {
            let _ = previous.close();
        }
    }

    /// Whether `stream` has a writer.
    pub fn is_open(&self, stream: Stream) -> bool {
        self.slot(stream).read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Close both streams. Later log calls are no-ops until a stream is
    /// opened again. Both streams are closed even if the first one fails; the
    /// first error is returned.
    pub fn close(&self) -> Result<(), WriterError> {
        let info = self.info.write().unwrap_or_else(PoisonError::into_inner).take();
        let error = self.error.write().unwrap_or_else(PoisonError::into_inner).take();
        let info_res = info.map_or(Ok(()), |writer| writer.close());
        let error_res = error.map_or(Ok(()), |writer| writer.close());
        info_res.and(error_res)
    }

    /// Mirror every line to standard output.
    pub fn set_echo_stdout(&self, echo: bool) {
        self.echo_stdout.store(echo, Ordering::Relaxed);
    }

    pub fn echo_stdout(&self) -> bool {
        self.echo_stdout.load(Ordering::Relaxed)
    }

    // Verbose logging is meant to be turned on for the duration of one
    // request. The counter is shared by the whole logger, so while any scope
    // is active, verbose lines from unrelated threads are written too.

    pub fn inc_verbosity(&self) {
        self.verbosity.fetch_add(1, Ordering::SeqCst);
    }

    pub fn dec_verbosity(&self) {
        self.verbosity.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn verbosity(&self) -> i32 {
        self.verbosity.load(Ordering::SeqCst)
    }

    /// Whether verbose lines are currently written.
    pub fn is_verbose(&self) -> bool {
        self.verbosity() > 0
    }

    /// Turn verbose logging on until the returned guard is dropped.
    pub fn verbose_scope(&self) -> VerboseGuard<'_> {
        self.inc_verbosity();
        VerboseGuard { logger: self }
    }

    /// Start a verbose scope if the URL asks for one with a non-empty `vl`
    /// query parameter, e.g. `/api/items?vl=1`.
    ///
    /// ```
    /// use {daylog::Logger, url::Url};
    ///
    /// let logger = Logger::new();
    /// let url = Url::parse("http://localhost/api/items?vl=1").unwrap();
    /// let _scope = logger.start_verbose_for_url(&url);
    /// assert!(logger.is_verbose());
    /// ```
    pub fn start_verbose_for_url(&self, url: &Url) -> Option<VerboseGuard<'_>> {
        let requested = url
            .query_pairs()
            .find(|(key, _)| key == "vl")
            .is_some_and(|(_, value)| !value.is_empty());
        requested.then(|| self.verbose_scope())
    }

    /// Write raw bytes to one stream.
    ///
    /// Unlike the log methods this reports failures, including
    /// [`WriterError::Unopened`] when the stream is not open.
    pub fn write_stream(&self, stream: Stream, data: &[u8]) -> Result<usize, WriterError> {
        write_optional(self.writer(stream).as_deref(), data)
    }

    /// Log a line at `level`, prefixed with `caller`.
    ///
    /// Verbose lines are dropped unless [`is_verbose`](Self::is_verbose).
    /// A [`Level::Fatal`] line terminates the process after it is written.
    pub fn log(&self, level: Level, caller: &str, args: fmt::Arguments<'_>) {
        match level {
            Level::Fatal => self.fatal(caller, args),
            Level::Verbose if !self.is_verbose() => {}
            _ => self.emit(level, &format_line(caller, args)),
        }
    }

    /// Log an error value at [`Level::Error`].
    pub fn report(&self, caller: &str, err: &dyn fmt::Display) {
        self.log(Level::Error, caller, format_args!("{err}"));
    }

    /// Log a line at [`Level::Fatal`], print it to stderr and exit with
    /// status 1.
    pub fn fatal(&self, caller: &str, args: fmt::Arguments<'_>) -> ! {
        let line = format_line(caller, args);
        self.emit(Level::Fatal, &line);
        eprint!("{line}");
        process::exit(1)
    }

    fn emit(&self, level: Level, line: &str) {
        if self.echo_stdout() {
            let _ = io::stdout().lock().write_all(line.as_bytes());
        }
        let writer = match level {
            Level::Error | Level::Fatal => self.writer(Stream::Error).or_else(|| self.writer(Stream::Info)),
            Level::Info | Level::Verbose => self.writer(Stream::Info),
        };
        if let Some(writer) = writer {
            let _ = writer.write_str(line);
        }
    }
}

fn format_line(caller: &str, args: fmt::Arguments<'_>) -> String {
    let mut line = if caller.is_empty() {
        args.to_string()
    } else {
        format!("{caller}: {args}")
    };
    if !line.ends_with('\n') {
        line.push('\n');
    }
    line
}

/// Ends a verbose scope when dropped.
#[must_use = "verbose logging ends when the guard is dropped"]
#[derive(Debug)]
pub struct VerboseGuard<'a> {
    logger: &'a Logger,
}

impl Drop for VerboseGuard<'_> {
    fn drop(&mut self) {
        self.logger.dec_verbosity();
    }
}

/// Turn the type name of a function item declared inside a function into the
/// name of that enclosing function, without the crate name.
///
/// Methods of trait impls come out as `Type::method`.
#[doc(hidden)]
pub fn caller_tag(type_name: &'static str) -> Cow<'static, str> {
    let mut name = type_name.strip_suffix("::f").unwrap_or(type_name);
    while let Some(outer) = name.strip_suffix("::{{closure}}") {
        name = outer;
    }
    match qualified_self(name) {
        Some((self_ty, method)) => Cow::Owned(format!("{}{method}", strip_crate(self_ty))),
        None => Cow::Borrowed(strip_crate(name)),
    }
}

fn strip_crate(path: &str) -> &str {
    path.split_once("::").map_or(path, |(_, rest)| rest)
}

/// Split `<Type as Trait>::rest` into `Type` and `::rest`.
fn qualified_self(name: &str) -> Option<(&str, &str)> {
    let inner = name.strip_prefix('<')?;
    let mut depth = 0usize;
    let mut as_at = None;
    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            // `->` in a fn pointer type
            '>' if inner[..i].ends_with('-') => {}
            '>' if depth == 0 => return Some((&inner[..as_at.unwrap_or(i)], &inner[i + 1..])),
            '>' => depth -= 1,
            ' ' if depth == 0 && as_at.is_none() && inner[i..].starts_with(" as ") => as_at = Some(i),
            _ => {}
        }
    }
    None
}

/// The name of the enclosing function, e.g. `server::handle_request`.
#[macro_export]
macro_rules! caller {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        $crate::caller_tag(type_name_of(f))
    }};
}

/// Log at [`Level::Info`](crate::Level::Info), prefixed with the calling
/// function's name.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::Level::Info, &$crate::caller!(), ::std::format_args!($($arg)*))
    };
}

/// Log at [`Level::Error`](crate::Level::Error), prefixed with the calling
/// function's name.
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::Level::Error, &$crate::caller!(), ::std::format_args!($($arg)*))
    };
}

/// Log at [`Level::Verbose`](crate::Level::Verbose) if verbose logging is on.
#[macro_export]
macro_rules! verbose {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::Level::Verbose, &$crate::caller!(), ::std::format_args!($($arg)*))
    };
}

/// Log at [`Level::Fatal`](crate::Level::Fatal) and exit the process.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)*) => {
        $logger.fatal(&$crate::caller!(), ::std::format_args!($($arg)*))
    };
}

/// Log an error value at [`Level::Error`](crate::Level::Error).
#[macro_export]
macro_rules! report {
    ($logger:expr, $err:expr) => {
        $logger.report(&$crate::caller!(), &$err)
    };
}
