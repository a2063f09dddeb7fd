pub mod differ;
pub mod engine;
pub mod progress;
pub mod resolver;

pub use engine::{SyncEngine, SyncOutcome};
pub use progress::{ProgressSender, SyncEvent};

/// Counters summarizing one successful run.
#[derive(Debug, Default, Clone)]
pub struct SyncReport {
    pub assets_downloaded: usize,
    pub assets_deleted: usize,
    pub assets_kept: usize,
    pub albums_created: usize,
    pub albums_removed: usize,
    pub albums_kept: usize,
    pub attempts: u32,
}
