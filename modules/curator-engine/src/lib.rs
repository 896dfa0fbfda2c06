pub mod api;
pub mod curation_log;
pub mod dedup;
pub mod pipeline;
pub mod publisher;
pub mod quality;
pub mod reasoning;
pub mod relevance;
pub mod research;
pub mod scheduling;
pub mod searcher;
pub mod sources;
pub mod store;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use curation_log::CurationLog;
pub use dedup::DedupLedger;
pub use pipeline::{CurationPipeline, RunOutcome};
pub use scheduling::{CuratorScheduler, DashboardSnapshot, TickOutcome};
