//! Event boundaries.
//!
//! An event starts and ends on a calendar date. A boundary that also carries a
//! clock time is a timestamp in the calendar's time zone; one without is an
//! all-day boundary. [`EventBoundary`] keeps both shapes in one type so the
//! transformer can map them to and from the remote `date` / `dateTime` pair.

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The start or end of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventBoundary {
    /// Calendar date, always present.
    pub date: NaiveDate,
    /// Wall-clock time in the calendar zone, absent for all-day boundaries.
    pub time: Option<NaiveTime>,
}

impl EventBoundary {
    /// Creates an all-day boundary.
    pub fn all_day(date: NaiveDate) -> Self {
        Self { date, time: None }
    }

    /// Creates a timed boundary.
    pub fn timed(date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            date,
            time: Some(time),
        }
    }

    /// Splits an instant into the date and wall time it has in `tz`.
    pub fn from_instant<O: TimeZone>(instant: &DateTime<O>, tz: Tz) -> Self {
        let local = instant.with_timezone(&tz);
        Self::timed(local.date_naive(), local.time())
    }

    /// Returns `true` if this boundary has no time of day.
    pub fn is_all_day(&self) -> bool {
        self.time.is_none()
    }

    /// Fails for a timed boundary whose wall time falls in a daylight-saving
    /// gap of `tz`. All-day boundaries always exist.
    pub fn check_exists_in(&self, tz: Tz) -> Result<(), ValidationError> {
        let Some(time) = self.time else {
            return Ok(());
        };
        match tz.from_local_datetime(&self.date.and_time(time)) {
            LocalResult::None => Err(ValidationError::NonexistentLocalTime {
                date: self.date,
                time,
                zone: tz.name().to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Returns the zoned timestamp for a timed boundary.
    ///
    /// Ambiguous wall times (clocks falling back) resolve to the earlier
    /// instant. Saves reject wall times inside a DST gap (see
    /// [`check_exists_in`](Self::check_exists_in)); should one reach this
    /// point anyway it is read as UTC wall time.
    pub fn to_zoned(&self, tz: Tz) -> Option<DateTime<Tz>> {
        let time = self.time?;
        Some(localize(tz, self.date.and_time(time)))
    }
}

fn localize(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => tz.from_utc_datetime(&naive),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Offset, Timelike};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn all_day_has_no_zoned_instant() {
        let boundary = EventBoundary::all_day(date(2024, 6, 1));
        assert!(boundary.is_all_day());
        assert!(boundary.to_zoned(Tz::UTC).is_none());
    }

    #[test]
    fn instant_is_split_in_calendar_zone() {
        let instant = DateTime::parse_from_rfc3339("2024-06-01T18:00:00Z").unwrap();

        let utc = EventBoundary::from_instant(&instant, Tz::UTC);
        assert_eq!(utc.date, date(2024, 6, 1));
        assert_eq!(utc.time, NaiveTime::from_hms_opt(18, 0, 0));

        // 18:00 UTC is 04:00 the next day in Sydney (AEST, +10:00).
        let sydney = EventBoundary::from_instant(&instant, chrono_tz::Australia::Sydney);
        assert_eq!(sydney.date, date(2024, 6, 2));
        assert_eq!(sydney.time.unwrap().hour(), 4);
    }

    #[test]
    fn zoned_keeps_offset() {
        let boundary =
            EventBoundary::timed(date(2024, 6, 1), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        let zoned = boundary.to_zoned(chrono_tz::Europe::Paris).unwrap();
        assert_eq!(
            zoned.offset().fix(),
            FixedOffset::east_opt(2 * 3600).unwrap()
        );
        assert_eq!(
            EventBoundary::from_instant(&zoned, chrono_tz::Europe::Paris),
            boundary
        );
    }

    #[test]
    fn ambiguous_wall_time_round_trips() {
        // 02:30 happens twice in Paris on 2024-10-27.
        let boundary =
            EventBoundary::timed(date(2024, 10, 27), NaiveTime::from_hms_opt(2, 30, 0).unwrap());
        let zoned = boundary.to_zoned(chrono_tz::Europe::Paris).unwrap();
        assert_eq!(
            EventBoundary::from_instant(&zoned, chrono_tz::Europe::Paris),
            boundary
        );
    }

    #[test]
    fn gap_wall_time_does_not_exist() {
        // 02:30 does not exist in Paris on 2024-03-31.
        let gap =
            EventBoundary::timed(date(2024, 3, 31), NaiveTime::from_hms_opt(2, 30, 0).unwrap());
        let err = gap.check_exists_in(chrono_tz::Europe::Paris).unwrap_err();
        assert_eq!(
            err.to_string(),
            "2024-03-31 02:30:00 does not exist in Europe/Paris; the clocks skip over it."
        );

        assert!(gap.check_exists_in(Tz::UTC).is_ok());
        assert!(EventBoundary::all_day(date(2024, 3, 31))
            .check_exists_in(chrono_tz::Europe::Paris)
            .is_ok());

        // Repeated wall times exist, twice.
        let repeated =
            EventBoundary::timed(date(2024, 10, 27), NaiveTime::from_hms_opt(2, 30, 0).unwrap());
        assert!(repeated.check_exists_in(chrono_tz::Europe::Paris).is_ok());
    }
}
