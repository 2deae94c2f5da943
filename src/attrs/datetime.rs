//! NuFX packed date/time (8 bytes, mirrors the IIgs ReadTimeHex layout).
//!
//! | byte | field                                   |
//! |------|-----------------------------------------|
//! | 0    | second (0-59)                           |
//! | 1    | minute (0-59)                           |
//! | 2    | hour (0-23)                             |
//! | 3    | year - 1900; values below 40 mean 20xx  |
//! | 4    | day of month - 1 (0-30)                 |
//! | 5    | month - 1 (0-11)                        |
//! | 6    | filler                                  |
//! | 7    | weekday, 1 = Sunday (informational)     |
//!
//! All eight bytes zero is the "no timestamp" sentinel.

use byteorder::{ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use std::io::{self, Read, Write};
use tracing::debug;

pub const DATE_TIME_SIZE: usize = 8;

/// Earliest and latest host years the packed year byte can express.
pub const MIN_YEAR: i32 = 1940;
pub const MAX_YEAR: i32 = 2039;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NuDateTime {
    pub second:   u8,
    pub minute:   u8,
    pub hour:     u8,
    pub year:     u8,
    pub day:      u8,
    pub month:    u8,
    pub filler:   u8,
    pub week_day: u8,
}

impl NuDateTime {
    /// The "no timestamp" sentinel.
    pub const ABSENT: NuDateTime = NuDateTime {
        second: 0, minute: 0, hour: 0, year: 0, day: 0, month: 0, filler: 0, week_day: 0,
    };

    pub fn is_absent(&self) -> bool {
        *self == Self::ABSENT
    }

    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self {
            second:   reader.read_u8()?,
            minute:   reader.read_u8()?,
            hour:     reader.read_u8()?,
            year:     reader.read_u8()?,
            day:      reader.read_u8()?,
            month:    reader.read_u8()?,
            filler:   reader.read_u8()?,
            week_day: reader.read_u8()?,
        })
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&[
            self.second, self.minute, self.hour, self.year,
            self.day, self.month, self.filler, self.week_day,
        ])
    }

    /// Full calendar year, or `None` when the year byte is past 2039.
    fn full_year(&self) -> Option<i32> {
        match self.year {
            y if y < 40   => Some(2000 + y as i32),
            y if y <= 139 => Some(1900 + y as i32),
            _             => None,
        }
    }

    /// Convert to a host time. The sentinel and any out-of-range field both
    /// yield `None`. Archive times carry no zone and are read as UTC.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        if self.is_absent() {
            return None;
        }
        if self.second > 59 || self.minute > 59 || self.hour > 23 || self.day > 30 || self.month > 11 {
            debug!(?self, "packed timestamp field out of range, treating as absent");
            return None;
        }
        let Some(year) = self.full_year() else {
            debug!(year = self.year, "packed year out of range, treating as absent");
            return None;
        };
        let naive = NaiveDate::from_ymd_opt(year, self.month as u32 + 1, self.day as u32 + 1)
            .and_then(|d| d.and_hms_opt(self.hour as u32, self.minute as u32, self.second as u32));
        match naive {
            Some(n) => Some(n.and_utc()),
            None => {
                debug!(?self, "packed date does not exist in the calendar, treating as absent");
                None
            }
        }
    }

    /// Inverse of [`to_utc`](Self::to_utc). `None` encodes the sentinel;
    /// a time outside `MIN_YEAR..=MAX_YEAR` cannot be packed and returns `Err`
    /// with the offending year. Sub-second precision is dropped.
    pub fn from_utc(when: Option<&DateTime<Utc>>) -> Result<Self, i32> {
        let Some(when) = when else {
            return Ok(Self::ABSENT);
        };
        let year = when.year();
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(year);
        }
        Ok(Self {
            second:   when.second() as u8,
            minute:   when.minute() as u8,
            hour:     when.hour() as u8,
            year:     (year - 1900) as u8,
            day:      when.day0() as u8,
            month:    when.month0() as u8,
            filler:   0,
            week_day: when.weekday().number_from_sunday() as u8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn packed(year: u8, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> NuDateTime {
        NuDateTime { second, minute, hour, year, day, month, filler: 0, week_day: 0 }
    }

    #[test]
    fn sentinel_is_absent_both_ways() {
        assert_eq!(NuDateTime::ABSENT.to_utc(), None);
        assert_eq!(NuDateTime::from_utc(None), Ok(NuDateTime::ABSENT));
    }

    #[test]
    fn decodes_twentieth_and_twentyfirst_century_years() {
        let t = packed(89, 10, 4, 13, 30, 15).to_utc().unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(1989, 11, 5, 13, 30, 15).unwrap());

        // Year bytes below 40 wrap into the 2000s.
        let t = packed(7, 0, 0, 0, 0, 1).to_utc().unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2007, 1, 1, 0, 0, 1).unwrap());
    }

    #[test]
    fn out_of_range_fields_are_absent() {
        assert_eq!(packed(90, 12, 0, 0, 0, 0).to_utc(), None);
        assert_eq!(packed(90, 0, 31, 0, 0, 0).to_utc(), None);
        assert_eq!(packed(90, 0, 0, 24, 0, 0).to_utc(), None);
        assert_eq!(packed(200, 0, 0, 0, 0, 0).to_utc(), None);
        // 30 February
        assert_eq!(packed(90, 1, 29, 0, 0, 0).to_utc(), None);
    }

    #[test]
    fn host_time_round_trips() {
        let t = Utc.with_ymd_and_hms(2016, 9, 4, 22, 15, 0).unwrap();
        let p = NuDateTime::from_utc(Some(&t)).unwrap();
        assert_eq!(p.year, 116);
        assert_eq!(p.week_day, 1); // Sunday
        assert_eq!(p.to_utc(), Some(t));
    }

    #[test]
    fn unpackable_year_is_rejected() {
        let t = Utc.with_ymd_and_hms(2040, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(NuDateTime::from_utc(Some(&t)), Err(2040));
    }

    #[test]
    fn wire_layout() {
        let p = packed(89, 10, 4, 13, 30, 15);
        let mut buf = Vec::new();
        p.write(&mut buf).unwrap();
        assert_eq!(buf, [15, 30, 13, 89, 4, 10, 0, 0]);
        assert_eq!(NuDateTime::read(&buf[..]).unwrap(), p);
    }
}
