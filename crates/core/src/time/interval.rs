use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntervalError {
    #[error("invalid recurring interval: {0:?}")]
    Unrecognized(String),

    #[error("recurring transaction has no interval")]
    Missing,

    #[error("date out of range when advancing {0}")]
    OutOfRange(NaiveDate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecurringInterval {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RecurringInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurringInterval::Daily => "DAILY",
            RecurringInterval::Weekly => "WEEKLY",
            RecurringInterval::Monthly => "MONTHLY",
            RecurringInterval::Yearly => "YEARLY",
        }
    }

    /// Whether a template anchored on `anchor` produces an occurrence on `today`.
    ///
    /// The anchor date itself never counts: the template row already is that
    /// occurrence. Anchor days past the end of a shorter month fall on that
    /// month's last day (Jan 31 fires on Feb 28/29, Apr 30, ...).
    pub fn is_due(&self, anchor: NaiveDate, today: NaiveDate) -> bool {
        if today <= anchor {
            return false;
        }

        match self {
            RecurringInterval::Daily => true,
            RecurringInterval::Weekly => today.weekday() == anchor.weekday(),
            RecurringInterval::Monthly => {
                today.day() == clamped_day(anchor.day(), today.year(), today.month())
            }
            RecurringInterval::Yearly => {
                today.month() == anchor.month()
                    && today.day() == clamped_day(anchor.day(), today.year(), today.month())
            }
        }
    }

    /// The first day after `after` on which [`is_due`](Self::is_due) holds.
    ///
    /// Month and year steps restart from the anchor's day each time, so a
    /// Jan 31 template runs Feb 29, Mar 31, Apr 30 rather than drifting to
    /// the shortest month's day.
    pub fn next_due_after(
        &self,
        anchor: NaiveDate,
        after: NaiveDate,
    ) -> Result<NaiveDate, IntervalError> {
        let from = after.max(anchor);
        let out_of_range = IntervalError::OutOfRange(from);

        match self {
            RecurringInterval::Daily => from.checked_add_days(Days::new(1)).ok_or(out_of_range),
            RecurringInterval::Weekly => {
                let gap = (7 + anchor.weekday().num_days_from_monday()
                    - from.weekday().num_days_from_monday())
                    % 7;
                let gap = if gap == 0 { 7 } else { gap };
                from.checked_add_days(Days::new(u64::from(gap)))
                    .ok_or(out_of_range)
            }
            RecurringInterval::Monthly => {
                let start = from.with_day(1).ok_or(out_of_range.clone())?;
                (0..=1)
                    .filter_map(|step| start.checked_add_months(Months::new(step)))
                    .filter_map(|month| anchored_in(anchor.day(), month.year(), month.month()))
                    .find(|candidate| *candidate > from)
                    .ok_or(out_of_range)
            }
            RecurringInterval::Yearly => (0..=1)
                .filter_map(|step| from.year().checked_add(step))
                .filter_map(|year| anchored_in(anchor.day(), year, anchor.month()))
                .find(|candidate| *candidate > from)
                .ok_or(out_of_range),
        }
    }
}

impl fmt::Display for RecurringInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurringInterval {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "DAILY" => Ok(RecurringInterval::Daily),
            "WEEKLY" => Ok(RecurringInterval::Weekly),
            "MONTHLY" => Ok(RecurringInterval::Monthly),
            "YEARLY" => Ok(RecurringInterval::Yearly),
            other => Err(IntervalError::Unrecognized(other.to_string())),
        }
    }
}

/// Next occurrence after `at`, truncated to midnight.
pub fn next_occurrence(
    at: NaiveDateTime,
    interval: RecurringInterval,
) -> Result<NaiveDateTime, IntervalError> {
    let date = next_occurrence_date(at.date(), interval)?;
    Ok(date.and_time(NaiveTime::MIN))
}

/// Calendar-month steps clamp to the end of the target month, so
/// Jan 31 + MONTHLY is Feb 28 (or 29) and Feb 29 + YEARLY is Feb 28.
pub fn next_occurrence_date(
    date: NaiveDate,
    interval: RecurringInterval,
) -> Result<NaiveDate, IntervalError> {
    let next = match interval {
        RecurringInterval::Daily => date.checked_add_days(Days::new(1)),
        RecurringInterval::Weekly => date.checked_add_days(Days::new(7)),
        RecurringInterval::Monthly => date.checked_add_months(Months::new(1)),
        RecurringInterval::Yearly => date.checked_add_months(Months::new(12)),
    };
    next.ok_or(IntervalError::OutOfRange(date))
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    first.checked_add_months(Months::new(1))?.pred_opt()
}

fn anchored_in(day: u32, year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, clamped_day(day, year, month))
}

fn clamped_day(day: u32, year: i32, month: u32) -> u32 {
    last_day_of_month(year, month)
        .map(|last| day.min(last.day()))
        .unwrap_or(day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn daily_advances_one_day_and_truncates_time() {
        let at = d(2024, 2, 28).and_hms_opt(17, 45, 12).unwrap();
        let next = next_occurrence(at, RecurringInterval::Daily).unwrap();
        assert_eq!(next, d(2024, 2, 29).and_hms_opt(0, 0, 0).unwrap());

        let at = d(2024, 12, 31).and_hms_opt(23, 59, 59).unwrap();
        let next = next_occurrence(at, RecurringInterval::Daily).unwrap();
        assert_eq!(next, d(2025, 1, 1).and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn weekly_and_yearly_steps() {
        assert_eq!(
            next_occurrence_date(d(2024, 3, 29), RecurringInterval::Weekly).unwrap(),
            d(2024, 4, 5)
        );
        assert_eq!(
            next_occurrence_date(d(2024, 6, 15), RecurringInterval::Yearly).unwrap(),
            d(2025, 6, 15)
        );
        assert_eq!(
            next_occurrence_date(d(2024, 2, 29), RecurringInterval::Yearly).unwrap(),
            d(2025, 2, 28)
        );
    }

    #[test]
    fn monthly_clamps_to_month_end() {
        assert_eq!(
            next_occurrence_date(d(2023, 1, 31), RecurringInterval::Monthly).unwrap(),
            d(2023, 2, 28)
        );
        assert_eq!(
            next_occurrence_date(d(2024, 1, 31), RecurringInterval::Monthly).unwrap(),
            d(2024, 2, 29)
        );
        assert_eq!(
            next_occurrence_date(d(2024, 12, 15), RecurringInterval::Monthly).unwrap(),
            d(2025, 1, 15)
        );
    }

    #[test]
    fn overflow_is_reported() {
        assert_eq!(
            next_occurrence_date(NaiveDate::MAX, RecurringInterval::Daily),
            Err(IntervalError::OutOfRange(NaiveDate::MAX))
        );
    }

    #[test]
    fn unrecognized_interval_fails_fast() {
        let err = "FORTNIGHTLY".parse::<RecurringInterval>().unwrap_err();
        assert_eq!(err, IntervalError::Unrecognized("FORTNIGHTLY".to_string()));
        assert_eq!(
            " MONTHLY".parse::<RecurringInterval>().unwrap(),
            RecurringInterval::Monthly
        );
    }

    #[test]
    fn weekly_due_on_matching_weekday_only() {
        // 2024-04-01 is a Monday.
        let anchor = d(2024, 4, 1);
        assert!(!RecurringInterval::Weekly.is_due(anchor, anchor));
        assert!(!RecurringInterval::Weekly.is_due(anchor, d(2024, 4, 2)));
        assert!(RecurringInterval::Weekly.is_due(anchor, d(2024, 4, 8)));
    }

    #[test]
    fn daily_due_every_day_after_anchor() {
        let anchor = d(2024, 4, 1);
        assert!(!RecurringInterval::Daily.is_due(anchor, d(2024, 3, 31)));
        assert!(RecurringInterval::Daily.is_due(anchor, d(2024, 4, 2)));
    }

    #[test]
    fn monthly_due_on_last_day_for_short_months() {
        let anchor = d(2024, 1, 31);
        assert!(RecurringInterval::Monthly.is_due(anchor, d(2024, 2, 29)));
        assert!(!RecurringInterval::Monthly.is_due(anchor, d(2024, 2, 28)));
        assert!(RecurringInterval::Monthly.is_due(anchor, d(2024, 4, 30)));
        assert!(RecurringInterval::Monthly.is_due(anchor, d(2024, 5, 31)));
        assert!(!RecurringInterval::Monthly.is_due(anchor, d(2024, 5, 30)));
    }

    #[test]
    fn yearly_due_on_anniversary() {
        let anchor = d(2024, 2, 29);
        assert!(RecurringInterval::Yearly.is_due(anchor, d(2025, 2, 28)));
        assert!(!RecurringInterval::Yearly.is_due(anchor, d(2025, 3, 1)));
        assert!(RecurringInterval::Yearly.is_due(anchor, d(2028, 2, 29)));
        assert!(!RecurringInterval::Yearly.is_due(anchor, d(2028, 2, 28)));
    }

    #[test]
    fn next_due_restarts_from_anchor_day() {
        let anchor = d(2024, 1, 31);
        let monthly = RecurringInterval::Monthly;
        assert_eq!(monthly.next_due_after(anchor, d(2024, 2, 29)).unwrap(), d(2024, 3, 31));
        assert_eq!(monthly.next_due_after(anchor, d(2024, 3, 31)).unwrap(), d(2024, 4, 30));
        assert_eq!(monthly.next_due_after(anchor, d(2024, 12, 31)).unwrap(), d(2025, 1, 31));
        assert_eq!(monthly.next_due_after(anchor, anchor).unwrap(), d(2024, 2, 29));

        let leap = d(2024, 2, 29);
        let yearly = RecurringInterval::Yearly;
        assert_eq!(yearly.next_due_after(leap, d(2027, 2, 28)).unwrap(), d(2028, 2, 29));
        assert_eq!(yearly.next_due_after(leap, d(2028, 2, 29)).unwrap(), d(2029, 2, 28));
    }

    #[test]
    fn next_due_weekly_and_daily() {
        // 2024-04-01 is a Monday.
        let anchor = d(2024, 4, 1);
        let weekly = RecurringInterval::Weekly;
        assert_eq!(weekly.next_due_after(anchor, d(2024, 4, 8)).unwrap(), d(2024, 4, 15));
        assert_eq!(weekly.next_due_after(anchor, d(2024, 4, 10)).unwrap(), d(2024, 4, 15));
        assert_eq!(
            RecurringInterval::Daily.next_due_after(anchor, d(2024, 4, 9)).unwrap(),
            d(2024, 4, 10)
        );
    }

    #[test]
    fn next_due_is_always_a_due_day() {
        let anchors = [d(2024, 1, 31), d(2024, 2, 29), d(2023, 6, 30), d(2024, 4, 3)];
        let intervals = [
            RecurringInterval::Daily,
            RecurringInterval::Weekly,
            RecurringInterval::Monthly,
            RecurringInterval::Yearly,
        ];
        for anchor in anchors {
            for interval in intervals {
                let mut day = anchor;
                for _ in 0..30 {
                    let next = interval.next_due_after(anchor, day).unwrap();
                    assert!(next > day);
                    assert!(
                        interval.is_due(anchor, next),
                        "{interval} from {anchor}: {next} is not due"
                    );
                    day = next;
                }
            }
        }
    }
}
