use crate::time::interval::{last_day_of_month, IntervalError};
use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// First day of the month after the month containing `last_sent` (or `now`
/// when nothing was sent yet), at midnight UTC.
pub fn next_report_date(
    last_sent: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, IntervalError> {
    let reference = last_sent.unwrap_or(now).date_naive();
    let first_of_month = reference.with_day(1).ok_or(IntervalError::OutOfRange(reference))?;
    let next = first_of_month
        .checked_add_months(Months::new(1))
        .ok_or(IntervalError::OutOfRange(reference))?;
    Ok(next.and_time(NaiveTime::MIN).and_utc())
}

/// An inclusive calendar-date range covered by one report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> anyhow::Result<Self> {
        anyhow::ensure!(start <= end, "period start {start} is after end {end}");
        Ok(Self { start, end })
    }

    /// The full calendar month before the month containing `now`.
    pub fn previous_month(now: DateTime<Utc>) -> Result<Self, IntervalError> {
        let today = now.date_naive();
        let start = today
            .with_day(1)
            .and_then(|d| d.checked_sub_months(Months::new(1)))
            .ok_or(IntervalError::OutOfRange(today))?;
        let end =
            last_day_of_month(start.year(), start.month()).ok_or(IntervalError::OutOfRange(start))?;
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Human-readable month name for subjects, e.g. "March 2024".
    pub fn month_label(&self) -> String {
        self.start.format("%B %Y").to_string()
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn next_report_date_is_first_of_following_month() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).unwrap();
        let last_sent = Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 0).unwrap();
        assert_eq!(
            next_report_date(Some(last_sent), now).unwrap(),
            Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn next_report_date_without_last_sent_uses_now() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(
            next_report_date(None, now).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn previous_month_spans_whole_month() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 2, 30, 0).unwrap();
        let period = ReportPeriod::previous_month(now).unwrap();
        assert_eq!(period.start, d(2024, 2, 1));
        assert_eq!(period.end, d(2024, 2, 29));
        assert_eq!(period.to_string(), "2024-02-01 to 2024-02-29");
        assert_eq!(period.month_label(), "February 2024");
    }

    #[test]
    fn previous_month_crosses_year_boundary() {
        let now = Utc.with_ymd_and_hms(2025, 1, 20, 0, 0, 0).unwrap();
        let period = ReportPeriod::previous_month(now).unwrap();
        assert_eq!(period.start, d(2024, 12, 1));
        assert_eq!(period.end, d(2024, 12, 31));
        assert!(period.contains(d(2024, 12, 31)));
        assert!(!period.contains(d(2025, 1, 1)));
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(ReportPeriod::new(d(2024, 5, 2), d(2024, 5, 1)).is_err());
    }
}
