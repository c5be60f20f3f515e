pub mod item_state;
pub mod job_record;

pub use item_state::{ItemProgress, ItemState};
pub use job_record::{BatchResult, FailureDescriptor, JobRecord, JobSummary};
