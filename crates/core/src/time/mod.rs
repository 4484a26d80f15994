pub mod interval;
pub mod period;

pub use interval::{next_occurrence, next_occurrence_date, IntervalError, RecurringInterval};
pub use period::{next_report_date, ReportPeriod};
