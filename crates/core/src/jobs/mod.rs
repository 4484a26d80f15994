pub mod recurring;
pub mod reports;

pub use recurring::{materialize_recurring, MaterializeSummary};
pub use reports::{DispatchSummary, ReportDispatch};

pub const RECURRING_JOB: &str = "recurring_transactions";
pub const REPORTS_JOB: &str = "monthly_reports";
