use {
    crate::WriterError,
    chrono::{
        format::{Item, StrftimeItems},
        DateTime, FixedOffset,
    },
    std::{
        fmt::Write as _,
        path::{Path, PathBuf},
    },
};

/// The strftime pattern used for the file name of a daily log file.
pub const DAILY_FORMAT: &str = "%Y-%m-%d";

/// A path pattern that is formatted against the current date to produce the
/// path of the log file for that day.
///
/// The whole path is a [chrono strftime] pattern, so the date can drive any
/// part of it, including directories:
///
/// ```
/// use daylog::PathTemplate;
///
/// // logs/2025/04/2025-04-01.log
/// let template = PathTemplate::new("logs/%Y/%m/%Y-%m-%d.log").unwrap();
///
/// // logs/2025-04-01.error.log
/// let template = PathTemplate::daily("logs", ".error.log").unwrap();
/// assert_eq!(template.pattern(), "logs/%Y-%m-%d.error.log");
/// ```
///
/// [chrono strftime]: chrono::format::strftime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    pattern: String,
}

impl PathTemplate {
    /// Create a template from a strftime pattern.
    ///
    /// Fails with [`WriterError::InvalidTemplate`] when the pattern is empty
    /// or contains an unknown `%` specifier.
    pub fn new(pattern: impl Into<String>) -> Result<Self, WriterError> {
        let pattern = pattern.into();
        if pattern.is_empty() || StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return Err(WriterError::InvalidTemplate(pattern));
        }
        Ok(PathTemplate { pattern })
    }

    /// Create a template for one file per day in `directory`, named
    /// `YYYY-MM-DD` followed by `suffix`.
    ///
    /// `directory` and `suffix` are taken literally; a `%` in either is not
    /// treated as a format specifier.
    pub fn daily<P: AsRef<Path>>(directory: P, suffix: &str) -> Result<Self, WriterError> {
        let file_pattern = format!("{DAILY_FORMAT}{}", escape(suffix));
        let directory = directory.as_ref();
        let pattern = if directory.as_os_str().is_empty() {
            file_pattern
        } else {
            Path::new(&escape(&directory.to_string_lossy()))
                .join(file_pattern)
                .to_string_lossy()
                .into_owned()
        };
        Self::new(pattern)
    }

    /// The raw strftime pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Format the pattern against `datetime`.
    pub fn resolve(&self, datetime: &DateTime<FixedOffset>) -> Result<PathBuf, WriterError> {
        let mut path = String::with_capacity(self.pattern.len() + 16);
        write!(path, "{}", datetime.format(&self.pattern))
            .map_err(|_| WriterError::InvalidTemplate(self.pattern.clone()))?;
        Ok(PathBuf::from(path))
    }
}

fn escape(literal: &str) -> String {
    literal.replace('%', "%%")
}
