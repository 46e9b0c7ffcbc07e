use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};

use crate::errors::{BillingError, Result};

/// calendar day key, a plain date that stays put once derived
///
/// all billing math runs on day keys rather than instants so that a class on
/// 2026-01-05 is the same class no matter which offset the caller sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn new(date: NaiveDate) -> Self {
        DayKey(date)
    }

    /// build from calendar components
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(DayKey)
    }

    /// parse strict YYYY-MM-DD
    pub fn parse(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        let shaped = bytes.len() == 10 && bytes[4] == b'-' && bytes[7] == b'-';
        if !shaped {
            return Err(BillingError::InvalidDateFormat {
                input: s.to_string(),
            });
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(DayKey)
            .map_err(|_| BillingError::InvalidDateFormat {
                input: s.to_string(),
            })
    }

    /// get underlying date
    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// shift by whole days, negative values move backwards
    pub fn add_days(&self, days: i64) -> Self {
        match self.0.checked_add_signed(Duration::days(days)) {
            Some(date) => DayKey(date),
            None if days >= 0 => DayKey(NaiveDate::MAX),
            None => DayKey(NaiveDate::MIN),
        }
    }

    /// the next day
    pub fn succ(&self) -> Self {
        self.add_days(1)
    }

    /// whole days from self to other, negative when other is earlier
    pub fn days_until(&self, other: DayKey) -> i64 {
        (other.0 - self.0).num_days()
    }

    pub fn weekday(&self) -> Weekday {
        self.0.weekday()
    }

    /// first day on or after self falling on the given weekday
    pub fn next_on_or_after(&self, weekday: Weekday) -> Self {
        let gap = (7 + weekday.num_days_from_monday() as i64
            - self.0.weekday().num_days_from_monday() as i64)
            % 7;
        self.add_days(gap)
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DayKey {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self> {
        DayKey::parse(s)
    }
}

impl From<NaiveDate> for DayKey {
    fn from(date: NaiveDate) -> Self {
        DayKey(date)
    }
}

/// derives day keys in a single fixed business timezone
///
/// the same utc instant always yields the same key, and a key maps back to
/// the first valid local midnight even across dst transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessCalendar {
    tz: Tz,
}

impl BusinessCalendar {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// day key for an instant, evaluated in the business timezone
    pub fn day_key(&self, instant: DateTime<Utc>) -> DayKey {
        DayKey(instant.with_timezone(&self.tz).date_naive())
    }

    /// business-timezone midnight of a day key, as a utc instant
    pub fn start_of_day(&self, day: DayKey) -> DateTime<Utc> {
        let midnight = day.0.and_time(NaiveTime::MIN);
        match self.tz.from_local_datetime(&midnight) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            LocalResult::None => {
                // midnight falls in a dst gap, take the first valid hour
                let mut candidate = midnight + Duration::hours(1);
                for _ in 0..24 {
                    match self.tz.from_local_datetime(&candidate) {
                        LocalResult::Single(dt) => return dt.with_timezone(&Utc),
                        LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
                        LocalResult::None => candidate += Duration::hours(1),
                    }
                }
                Utc.from_utc_datetime(&midnight)
            }
        }
    }

    /// today's day key for the injected clock
    pub fn today(&self, time_provider: &SafeTimeProvider) -> DayKey {
        self.day_key(time_provider.now())
    }
}

impl Default for BusinessCalendar {
    fn default() -> Self {
        Self {
            tz: chrono_tz::Australia::Sydney,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hourglass_rs::TimeSource;

    fn day(s: &str) -> DayKey {
        DayKey::parse(s).unwrap()
    }

    #[test]
    fn test_parse_and_display_round_trip() {
        let key = day("2026-01-05");
        assert_eq!(key.to_string(), "2026-01-05");
        assert_eq!(key.weekday(), Weekday::Mon);
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert!(DayKey::parse("05/01/2026").is_err());
        assert!(DayKey::parse("2026-1-5").is_err());
        assert!(DayKey::parse("2026-01-05T00:00:00").is_err());
        assert!(DayKey::parse("2026-02-30").is_err());
        assert!(DayKey::parse("not a date").is_err());

        let err = DayKey::parse("garbage").unwrap_err();
        assert!(matches!(err, BillingError::InvalidDateFormat { .. }));
    }

    #[test]
    fn test_add_days_and_distance() {
        let start = day("2026-01-05");
        assert_eq!(start.add_days(9), day("2026-01-14"));
        assert_eq!(start.add_days(-5), day("2025-12-31"));
        assert_eq!(start.days_until(day("2026-01-19")), 14);
        assert_eq!(day("2026-01-19").days_until(start), -14);
        assert_eq!(start.succ(), day("2026-01-06"));
    }

    #[test]
    fn test_next_on_or_after() {
        let wednesday = day("2026-01-07");
        assert_eq!(wednesday.next_on_or_after(Weekday::Mon), day("2026-01-12"));
        assert_eq!(wednesday.next_on_or_after(Weekday::Wed), wednesday);
        assert_eq!(wednesday.next_on_or_after(Weekday::Thu), day("2026-01-08"));
    }

    #[test]
    fn test_day_key_ignores_caller_offset() {
        let calendar = BusinessCalendar::new(chrono_tz::Australia::Sydney);

        // 12:59 utc is 23:59 in sydney (aedt, +11), still the 5th
        let late = Utc.with_ymd_and_hms(2026, 1, 5, 12, 59, 0).unwrap();
        assert_eq!(calendar.day_key(late), day("2026-01-05"));

        // one minute later sydney ticks over to the 6th
        let next = Utc.with_ymd_and_hms(2026, 1, 5, 13, 0, 0).unwrap();
        assert_eq!(calendar.day_key(next), day("2026-01-06"));
    }

    #[test]
    fn test_start_of_day_round_trips_across_dst() {
        let calendar = BusinessCalendar::new(chrono_tz::Australia::Sydney);

        // sydney leaves dst in early april and re-enters in early october
        for d in 1..=10 {
            let key = DayKey::from_ymd(2026, 4, d).unwrap();
            assert_eq!(calendar.day_key(calendar.start_of_day(key)), key);

            let key = DayKey::from_ymd(2026, 10, d).unwrap();
            assert_eq!(calendar.day_key(calendar.start_of_day(key)), key);
        }
    }

    #[test]
    fn test_start_of_day_handles_midnight_dst_gap() {
        // sao paulo's 2018 dst start skipped midnight entirely
        let calendar = BusinessCalendar::new(chrono_tz::America::Sao_Paulo);
        let key = DayKey::from_ymd(2018, 11, 4).unwrap();

        let start = calendar.start_of_day(key);
        assert_eq!(start, Utc.with_ymd_and_hms(2018, 11, 4, 3, 0, 0).unwrap());
        assert_eq!(calendar.day_key(start), key);
    }

    #[test]
    fn test_today_uses_injected_clock() {
        let calendar = BusinessCalendar::new(chrono_tz::Australia::Sydney);
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2026, 1, 5, 14, 0, 0).unwrap(),
        ));
        let control = time.test_control().unwrap();

        // 14:00 utc on the 5th is already the 6th in sydney
        assert_eq!(calendar.today(&time), day("2026-01-06"));

        control.advance(Duration::days(1));
        assert_eq!(calendar.today(&time), day("2026-01-07"));
    }
}
