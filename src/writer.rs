use {
    crate::{Clock, PathTemplate, SystemClock, TimeZone, WriterError},
    chrono::{DateTime, FixedOffset, NaiveDate},
    std::{
        fs,
        io::{self, Write as _},
        path::{Path, PathBuf},
        sync::{Arc, Mutex, MutexGuard, PoisonError},
    },
};

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};

/// Mode for directories created on the way to a log file (rwxr-xr-x).
pub const DIR_MODE: u32 = 0o755;
/// Mode for newly created log files (rw-r--r--), before the umask.
pub const FILE_MODE: u32 = 0o644;

/// Configuration of a rotating writer. Immutable once built.
#[derive(Debug, Clone)]
struct WriterMeta {
    /// The strftime pattern that yields the path of the file for a day.
    template: PathTemplate,
    /// The time zone in which the day is computed and the path formatted.
    time_zone: TimeZone,
    /// Where "now" comes from.
    clock: Arc<dyn Clock>,
    /// Explicit permissions to set on every opened file (Unix-like systems
    /// only), e.g. 0o640 for rw-r-----.
    file_mode: Option<u32>,
}

/// The currently open file. The day, path and handle only ever change
/// together.
#[derive(Debug)]
struct OpenFile {
    day: NaiveDate,
    path: PathBuf,
    file: fs::File,
}

#[derive(Debug)]
struct WriterState {
    /// `None` after close, or after a failed reopen until an open succeeds.
    current: Option<OpenFile>,
    /// The path most recently opened, kept for error reporting after close.
    last_path: PathBuf,
    closed: bool,
}

impl WriterMeta {
    /// Get the current time in the configured time zone.
    fn now(&self) -> DateTime<FixedOffset> {
        self.time_zone.localize(self.clock.now())
    }

    /// Open the log file for the day of `now`.
    fn open_file(&self, now: &DateTime<FixedOffset>) -> Result<OpenFile, WriterError> {
        let path = self.template.resolve(now)?;
        let file = self.create_log_file(&path)?;
        Ok(OpenFile {
            day: now.date_naive(),
            path,
            file,
        })
    }

    /// Create a new log file.
    /// This function will create a new log file at the specified path.
    /// If the log file already exists, the function will append to the existing
    /// log file. Missing parent directories are created first.
    /// # Arguments
    /// * `log_path` - The path to the log file.
    /// # Returns
    /// The log file, verified to be accessible.
    fn create_log_file(&self, log_path: &Path) -> Result<fs::File, WriterError> {
        if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent).map_err(|err| WriterError::CreateDirectoryFailed(parent.to_path_buf(), err))?;
        }

        let mut open_options = fs::OpenOptions::new();
        open_options.append(true).create(true);
        #[cfg(unix)]
        open_options.mode(FILE_MODE);

        let log_file = open_options
            .open(log_path)
            .map_err(|err| WriterError::CreateFileFailed(log_path.to_path_buf(), err))?;
        log_file
            .metadata()
            .map_err(|err| WriterError::StatFileFailed(log_path.to_path_buf(), err))?;

        self.set_permissions(log_path)?;

        Ok(log_file)
    }

    /// Set the permissions for a file based on the configured file mode.
    ///
    /// Only has an effect when a file mode has been configured and the
    /// platform is Unix-like; elsewhere a warning is printed to stderr.
    fn set_permissions(&self, path: &Path) -> Result<(), WriterError> {
        if let Some(mode) = self.file_mode {
            #[cfg(unix)]
            {
                fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|err| {
                    WriterError::SetFilePermissionsError {
                        path: path.to_path_buf(),
                        error: err.to_string(),
                    }
                })?
            }
            #[cfg(not(unix))]
            {
                let _ = (mode, path);
                eprintln!("Warning: Setting file permissions is not supported on non-Unix platforms");
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn create_dir_all(dir: &Path) -> io::Result<()> {
    fs::DirBuilder::new().recursive(true).mode(DIR_MODE).create(dir)
}

#[cfg(not(unix))]
fn create_dir_all(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

/// Flush a file to disk before letting it go. Handles that cannot be synced
/// (pipes, character devices) are not an error.
fn sync(file: &fs::File) -> io::Result<()> {
    match file.sync_all() {
        Err(err) if err.kind() == io::ErrorKind::InvalidInput => Ok(()),
        res => res,
    }
}

impl OpenFile {
    /// Close a file that is being rotated away from. Nobody can act on a
    /// failure at this point, so it is only reported on stderr.
    fn retire(self) {
        if let Err(err) = sync(&self.file) {
            eprintln!("Failed to flush log file '{}': {}", self.path.display(), err);
        }
    }
}

/// A log file that is reopened under a new name whenever the calendar day
/// changes.
///
/// Every write checks the current day against the day the open file belongs
/// to. When they differ, the old file is closed and the file for today is
/// opened (created if absent, appended to if present) before the bytes are
/// written. The check, the reopen and the write happen under one lock, so
/// concurrent writers never interleave bytes and never see a half-rotated
/// writer.
///
/// # Examples
/// ```no_run
/// use daylog::RotatingFileWriter;
///
/// let writer = RotatingFileWriter::open("./logs/%Y/%m/%Y-%m-%d.log")?;
/// writer.write(b"service started\n")?;
/// writer.close()?;
/// # Ok::<(), daylog::WriterError>(())
/// ```
#[derive(Debug)]
pub struct RotatingFileWriter {
    meta: WriterMeta,
    state: Mutex<WriterState>,
}

impl RotatingFileWriter {
    /// Open a writer for a strftime path pattern with the default settings
    /// (local time zone, system clock).
    pub fn open(pattern: &str) -> Result<Self, WriterError> {
        RotatingFileWriterBuilder::new(PathTemplate::new(pattern)?).build()
    }

    /// Open a writer for one file per day in `directory`, named `YYYY-MM-DD`
    /// followed by `suffix`.
    pub fn open_daily<P: AsRef<Path>>(directory: P, suffix: &str) -> Result<Self, WriterError> {
        RotatingFileWriterBuilder::new(PathTemplate::daily(directory, suffix)?).build()
    }

    fn lock(&self) -> MutexGuard<'_, WriterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write `data` to the file for the current day.
    ///
    /// Rotates first if the day changed since the file was opened. Either all
    /// of `data` is written and its length returned, or an error is returned.
    /// A failed reopen writes nothing; the next call tries to open again.
    pub fn write(&self, data: &[u8]) -> Result<usize, WriterError> {
        let mut state = self.lock();
        if state.closed {
            return Err(WriterError::Closed(state.last_path.clone()));
        }

        let now = self.meta.now();
        let today = now.date_naive();
        let current = match state.current.take() {
            Some(current) if current.day == today => current,
            stale => {
                if let Some(old) = stale {
                    old.retire();
                }
                let opened = self.meta.open_file(&now)?;
                state.last_path.clone_from(&opened.path);
                opened
            }
        };
        let current = state.current.insert(current);

        current
            .file
            .write_all(data)
            .map_err(|err| WriterError::WriteFailed(current.path.clone(), err))?;
        Ok(data.len())
    }

    /// Write a string to the file for the current day.
    pub fn write_str(&self, s: &str) -> Result<usize, WriterError> {
        self.write(s.as_bytes())
    }

    /// Flush the open file, if any.
    pub fn flush(&self) -> Result<(), WriterError> {
        let mut state = self.lock();
        match state.current.as_mut() {
            Some(current) => current
                .file
                .flush()
                .map_err(|err| WriterError::WriteFailed(current.path.clone(), err)),
            None => Ok(()),
        }
    }

    /// Close the writer.
    ///
    /// The file is synced to disk and released. Afterwards every write fails
    /// with [`WriterError::Closed`]. Closing an already closed writer does
    /// nothing.
    pub fn close(&self) -> Result<(), WriterError> {
        let mut state = self.lock();
        state.closed = true;
        match state.current.take() {
            Some(current) => sync(&current.file).map_err(|err| WriterError::CloseFailed(current.path, err)),
            None => Ok(()),
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// The path of the open file.
    pub fn current_path(&self) -> Option<PathBuf> {
        self.lock().current.as_ref().map(|current| current.path.clone())
    }

    /// The day the open file belongs to.
    pub fn current_day(&self) -> Option<NaiveDate> {
        self.lock().current.as_ref().map(|current| current.day)
    }

    /// The path template this writer rotates through.
    pub fn template(&self) -> &PathTemplate {
        &self.meta.template
    }
}

/// Write through a writer that may not exist.
///
/// Returns [`WriterError::Unopened`] when `writer` is `None`, which lets
/// callers tell "logging was never set up" apart from "logging is failing".
pub fn write_optional(writer: Option<&RotatingFileWriter>, data: &[u8]) -> Result<usize, WriterError> {
    writer.ok_or(WriterError::Unopened)?.write(data)
}

impl io::Write for &RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        RotatingFileWriter::write(*self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        RotatingFileWriter::flush(*self).map_err(io::Error::from)
    }
}

impl io::Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut &*self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(&mut &*self)
    }
}

#[cfg(feature = "tracing")]
impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for RotatingFileWriter {
    type Writer = &'a RotatingFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self
    }
}

/// Provides a fluent interface for configuring [`RotatingFileWriter`]
/// instances.
///
/// # Default Configuration
///
/// * Local system time zone
/// * The system clock
/// * Files created with mode 0644 (subject to the umask)
///
/// # Examples
///
/// ```rust
/// use daylog::{PathTemplate, RotatingFileWriterBuilder, TimeZone};
///
/// # let dir = tempfile::tempdir().unwrap();
/// let writer = RotatingFileWriterBuilder::new(PathTemplate::daily(dir.path(), ".error.log").unwrap())
///     .time_zone(TimeZone::UTC) // Roll over at UTC midnight
///     .file_mode(0o640) // Owner rw, group r, others none
///     .build()
///     .unwrap();
/// ```
pub struct RotatingFileWriterBuilder {
    meta: WriterMeta,
}

impl RotatingFileWriterBuilder {
    /// Create a new builder for the given path template.
    pub fn new(template: PathTemplate) -> Self {
        RotatingFileWriterBuilder {
            meta: WriterMeta {
                template,
                time_zone: TimeZone::default(),
                clock: Arc::new(SystemClock),
                file_mode: None,
            },
        }
    }

    /// Set the time zone in which days are counted.
    pub fn time_zone(self, time_zone: TimeZone) -> Self {
        Self {
            meta: WriterMeta { time_zone, ..self.meta },
        }
    }

    /// Set the clock the writer asks for the current time.
    pub fn clock(self, clock: Arc<dyn Clock>) -> Self {
        Self {
            meta: WriterMeta { clock, ..self.meta },
        }
    }

    /// Set the file permissions for log files (Unix-like systems only).
    /// This sets the file mode bits in octal notation like when using chmod.
    pub fn file_mode(self, mode: u32) -> Self {
        Self {
            meta: WriterMeta {
                file_mode: Some(mode),
                ..self.meta
            },
        }
    }

    /// Build the writer, opening the file for today.
    pub fn build(self) -> Result<RotatingFileWriter, WriterError> {
        let current = self.meta.open_file(&self.meta.now())?;
        Ok(RotatingFileWriter {
            state: Mutex::new(WriterState {
                last_path: current.path.clone(),
                current: Some(current),
                closed: false,
            }),
            meta: self.meta,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use {
        super::*,
        chrono::{Duration, TimeZone as _, Utc},
        std::thread,
    };

    /// A clock that only moves when told to.
    #[derive(Debug)]
    pub(crate) struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        pub(crate) fn at(y: i32, m: u32, d: u32) -> Arc<Self> {
            Arc::new(ManualClock(Mutex::new(Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap())))
        }

        pub(crate) fn advance(&self, by: Duration) {
            *self.0.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn utc_writer(pattern: &str, clock: Arc<ManualClock>) -> RotatingFileWriter {
        RotatingFileWriterBuilder::new(PathTemplate::new(pattern).unwrap())
            .time_zone(TimeZone::UTC)
            .clock(clock)
            .build()
            .unwrap()
    }

    fn pattern_in(dir: &Path, file: &str) -> String {
        dir.join(file).to_string_lossy().into_owned()
    }

    #[test]
    fn rotates_when_the_day_changes() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::at(2024, 5, 1);
        let writer = utc_writer(&pattern_in(dir.path(), "%Y-%m-%d.log"), clock.clone());

        writer.write(b"first day\n").unwrap();
        clock.advance(Duration::hours(20));
        writer.write(b"second day\n").unwrap();
        writer.close().unwrap();

        let day1 = fs::read_to_string(dir.path().join("2024-05-01.log")).unwrap();
        let day2 = fs::read_to_string(dir.path().join("2024-05-02.log")).unwrap();
        assert_eq!(day1, "first day\n");
        assert_eq!(day2, "second day\n");
    }

    #[test]
    fn no_rotation_within_a_day() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::at(2024, 5, 1);
        let writer = utc_writer(&pattern_in(dir.path(), "%Y-%m-%d.log"), clock.clone());

        writer.write(b"a\n").unwrap();
        clock.advance(Duration::hours(13));
        writer.write(b"b\n").unwrap();

        assert_eq!(writer.current_day(), NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
        assert_eq!(fs::read_to_string(dir.path().join("2024-05-01.log")).unwrap(), "a\nb\n");
    }

    #[test]
    fn skips_idle_days() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::at(2024, 12, 30);
        let writer = utc_writer(&pattern_in(dir.path(), "%Y/%m-%d.log"), clock.clone());

        writer.write(b"before\n").unwrap();
        clock.advance(Duration::days(5));
        writer.write(b"after\n").unwrap();

        assert_eq!(writer.current_path(), Some(dir.path().join("2025/01-04.log")));
        assert!(!dir.path().join("2024/12-31.log").exists());
        assert!(!dir.path().join("2025/01-01.log").exists());
        assert_eq!(fs::read_to_string(dir.path().join("2025/01-04.log")).unwrap(), "after\n");
    }

    #[test]
    fn same_day_of_year_a_year_later_rotates() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::at(2023, 1, 10);
        let writer = utc_writer(&pattern_in(dir.path(), "%Y-%m-%d.log"), clock.clone());

        clock.advance(Duration::days(365));
        writer.write(b"next year\n").unwrap();

        assert_eq!(writer.current_path(), Some(dir.path().join("2024-01-10.log")));
    }

    #[test]
    fn failed_reopen_writes_nothing_and_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::at(2024, 5, 1);
        let writer = utc_writer(&pattern_in(dir.path(), "%Y-%m-%d.log"), clock.clone());

        // A directory where tomorrow's file should go makes the open fail.
        let blocked = dir.path().join("2024-05-02.log");
        fs::create_dir(&blocked).unwrap();
        clock.advance(Duration::days(1));

        let err = writer.write(b"lost\n").unwrap_err();
        assert!(matches!(err, WriterError::CreateFileFailed(ref path, _) if *path == blocked));
        assert_eq!(writer.current_path(), None);

        fs::remove_dir(&blocked).unwrap();
        assert_eq!(writer.write(b"kept\n").unwrap(), 5);
        assert_eq!(fs::read_to_string(&blocked).unwrap(), "kept\n");
    }

    #[test]
    fn write_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let writer = utc_writer(&pattern_in(dir.path(), "%Y-%m-%d.log"), ManualClock::at(2024, 5, 1));

        writer.close().unwrap();
        assert!(writer.is_closed());
        assert_eq!(writer.current_path(), None);
        assert!(matches!(writer.write(b"x"), Err(WriterError::Closed(_))));
        // Closing twice is a no-op.
        writer.close().unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("2024-05-01.log")).unwrap(), "");
    }

    #[test]
    fn write_optional_without_writer() {
        assert!(matches!(write_optional(None, b"data"), Err(WriterError::Unopened)));

        let dir = tempfile::tempdir().unwrap();
        let writer = utc_writer(&pattern_in(dir.path(), "%Y-%m-%d.log"), ManualClock::at(2024, 5, 1));
        assert_eq!(write_optional(Some(&writer), b"data").unwrap(), 4);
    }

    #[test]
    fn construction_fails_without_a_writer() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain-file");
        fs::write(&file, b"").unwrap();

        // A regular file in the way of the directory.
        let res = RotatingFileWriter::open(&pattern_in(&file, "%Y-%m-%d.log"));
        assert!(matches!(res, Err(WriterError::CreateDirectoryFailed(..))));
    }

    #[test]
    fn io_write_impl() {
        let dir = tempfile::tempdir().unwrap();
        let writer = utc_writer(&pattern_in(dir.path(), "%Y-%m-%d.log"), ManualClock::at(2024, 5, 1));

        let mut handle = &writer;
        writeln!(handle, "line {}", 1).unwrap();
        handle.flush().unwrap();
        writer.close().unwrap();

        let mut handle = &writer;
        let err = writeln!(handle, "line 2").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert_eq!(fs::read_to_string(dir.path().join("2024-05-01.log")).unwrap(), "line 1\n");
    }

    #[cfg(feature = "tracing")]
    #[test]
    fn make_writer_hands_out_the_writer() {
        use tracing_subscriber::fmt::MakeWriter;

        let dir = tempfile::tempdir().unwrap();
        let writer = utc_writer(&pattern_in(dir.path(), "%Y-%m-%d.log"), ManualClock::at(2024, 5, 1));
        writer.make_writer().write_all(b"event\n").unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("2024-05-01.log")).unwrap(), "event\n");
    }

    #[cfg(unix)]
    #[test]
    fn applies_file_mode() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RotatingFileWriterBuilder::new(PathTemplate::daily(dir.path(), ".log").unwrap())
            .file_mode(0o600)
            .build()
            .unwrap();

        let path = writer.current_path().unwrap();
        let mode = fs::metadata(path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn concurrent_writes_across_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::at(2024, 5, 1);
        let writer = Arc::new(utc_writer(&pattern_in(dir.path(), "%Y-%m-%d.log"), clock.clone()));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let writer = writer.clone();
                let clock = clock.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        if t == 0 && i == 25 {
                            clock.advance(Duration::days(1));
                        }
                        writer.write(format!("thread-{t} line-{i}\n").as_bytes()).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        writer.close().unwrap();

        let mut lines = Vec::new();
        for name in ["2024-05-01.log", "2024-05-02.log"] {
            let content = fs::read_to_string(dir.path().join(name)).unwrap();
            lines.extend(content.lines().map(str::to_owned));
        }
        assert_eq!(lines.len(), 400);
        lines.sort();
        lines.dedup();
        assert_eq!(lines.len(), 400);
        assert!(lines.iter().all(|line| line.starts_with("thread-") && line.contains(" line-")));
    }
}
