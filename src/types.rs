use core::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

/// Calendar components of an archive timestamp, second precision, UTC.
///
/// This is the in-memory side of the MS-DOS date/time words stored in every
/// entry header: year 1980..=2107, even seconds.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct DateTimeCS {
    year: u16,
    month: u16,
    day: u16,
    hour: u16,
    minute: u16,
    second: u16,
}

impl Default for DateTimeCS {
    /// The MS-DOS epoch, 1980-01-01T00:00:00Z.
    fn default() -> Self {
        Self {
            year: 1980,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }
}

impl DateTimeCS {
    pub fn from_chrono_datetime<Tz: TimeZone>(datetime: DateTime<Tz>) -> Self {
        Self {
            year: datetime.year() as u16,
            month: datetime.month() as u16,
            day: datetime.day() as u16,
            hour: datetime.hour() as u16,
            minute: datetime.minute() as u16,
            second: datetime.second() as u16,
        }
    }

    pub fn now() -> Self {
        Self::from_chrono_datetime(Utc::now())
    }

    pub fn from_timestamp(timestamp: i64) -> Self {
        match Utc.timestamp_opt(timestamp, 0) {
            chrono::LocalResult::Single(single) => Self::from_chrono_datetime(single),
            chrono::LocalResult::Ambiguous(first, _) => Self::from_chrono_datetime(first),
            chrono::LocalResult::None => Self::default(),
        }
    }

    /// Decode the two little-endian MS-DOS words back into components.
    pub fn from_msdos(datepart: u16, timepart: u16) -> Self {
        let seconds = (timepart & 0b0000000000011111) << 1;
        let minutes = (timepart & 0b0000011111100000) >> 5;
        let hours = (timepart & 0b1111100000000000) >> 11;
        let days = datepart & 0b0000000000011111;
        let months = (datepart & 0b0000000111100000) >> 5;
        let years = (datepart & 0b1111111000000000) >> 9;

        Self {
            year: years + 1980,
            month: months,
            day: days,
            hour: hours,
            minute: minutes,
            second: seconds,
        }
    }

    /// Encode as the `(date, time)` MS-DOS words. Seconds round down to
    /// even; years clamp to the representable 1980..=2107 window.
    pub fn ms_dos(&self) -> (u16, u16) {
        let year = self.year.clamp(1980, 2107);
        let date = self.day | (self.month << 5) | (year - 1980) << 9;
        let time = (self.second / 2) | (self.minute << 5) | self.hour << 11;
        (date, time)
    }

    pub fn to_time(&self) -> NaiveDateTime {
        let zero = DateTimeCS::default();
        let date = NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32)
            .unwrap_or_else(|| {
                NaiveDate::from_ymd_opt(zero.year as i32, zero.month as u32, zero.day as u32)
                    .unwrap_or_default()
            });

        date.and_hms_opt(self.hour as u32, self.minute as u32, self.second as u32)
            .unwrap_or_default()
    }

    pub fn to_timestamp(&self) -> i64 {
        self.to_time().and_utc().timestamp()
    }
}

impl fmt::Display for DateTimeCS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_time())
    }
}

/// The timestamp written into the archive alongside an entry.
///
/// Use `FileDateTime::Zero` when the date is insignificant (it encodes the
/// MS-DOS origin, 1980-01-01T00:00:00Z). `FileDateTime::None` asks the
/// writer to take the source file's own modification time where one exists,
/// falling back to the current time.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum FileDateTime {
    /// MS-DOS origin time, 1980-01-01T00:00:00Z.
    #[default]
    Zero,
    Custom(DateTimeCS),
    /// The current time, UTC.
    Now,
    /// Seconds since the unix epoch.
    UnixCustom(i64),
    /// Defer to the payload source when it carries a timestamp.
    None,
}

impl FileDateTime {
    fn components(&self) -> DateTimeCS {
        match self {
            FileDateTime::Zero => DateTimeCS::default(),
            FileDateTime::Custom(date_time) => *date_time,
            FileDateTime::Now | FileDateTime::None => DateTimeCS::now(),
            FileDateTime::UnixCustom(timestamp) => DateTimeCS::from_timestamp(*timestamp),
        }
    }

    pub fn ms_dos(&self) -> (u16, u16) {
        self.components().ms_dos()
    }

    pub fn to_time(&self) -> NaiveDateTime {
        self.components().to_time()
    }
}
