pub mod aggregate;
pub mod insight;

pub use aggregate::{aggregate, summarize_entries};
pub use insight::InsightGenerator;
