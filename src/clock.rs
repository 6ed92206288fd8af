use {
    chrono::{DateTime, FixedOffset, Local, Utc},
    std::fmt::Debug,
};

/// Specifies the time zone in which calendar days are computed and log file
/// paths are formatted.
///
/// # Examples
/// ```
/// use daylog::TimeZone;
/// use chrono::FixedOffset;
///
/// // Use UTC time for global deployments
/// let utc = TimeZone::UTC;
///
/// // Use local system time zone (follows daylight saving changes)
/// let local = TimeZone::Local;
///
/// // Use a fixed offset for a specific region (e.g., UTC+8 for China)
/// let china = TimeZone::Fix(FixedOffset::east_opt(8 * 3600).unwrap());
/// ```
#[derive(Debug, Clone, Default)]
pub enum TimeZone {
    /// Use UTC time zone. Days roll over at UTC midnight.
    UTC,
    /// Use the system's local time zone. The offset is looked up on every
    /// write, so a daylight saving change between two writes is honored.
    #[default]
    Local,
    /// Use a fixed time zone offset.
    Fix(FixedOffset),
}

impl TimeZone {
    /// Convert an instant into a date-time in this time zone.
    pub(crate) fn localize(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            TimeZone::UTC => instant.fixed_offset(),
            TimeZone::Local => instant.with_timezone(&Local).fixed_offset(),
            TimeZone::Fix(offset) => instant.with_timezone(offset),
        }
    }
}

/// Source of the current instant for a rotating writer.
///
/// The writer asks its clock for "now" on every write to decide whether the
/// day has changed. Production code uses [`SystemClock`]; tests inject a
/// clock they can move forward.
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
