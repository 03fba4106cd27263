pub mod dedupe;
pub mod error;
pub mod filter;
pub mod job;
pub mod queue;
pub mod scheduler;
pub mod terms;
pub mod tracker;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use dedupe::{Deduplicator, PersistOutcome};
pub use error::DiscoveryError;
pub use job::{DiscoveryJobProcessor, DiscoveryOutcome, DiscoveryRunner};
pub use queue::{DiscoveryJobData, JobPriority, JobQueue, JobStatus, QueueConfig};
pub use scheduler::DiscoveryScheduler;
pub use tracker::SearchAreaTracker;
