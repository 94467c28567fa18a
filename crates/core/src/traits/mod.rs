pub mod clock;
pub mod execution_record;
pub mod job_store;

pub use clock::{Clock, SystemClock};
pub use execution_record::ExecutionRecordRepository;
pub use job_store::JobStore;
