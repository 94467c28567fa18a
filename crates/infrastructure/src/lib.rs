pub mod database;
pub mod embedded;
pub mod in_memory_store;
pub mod observability;
pub mod partner;

pub use database::{DatabaseManager, SqliteExecutionRecordRepository, SqliteJobStore};
pub use embedded::{
    InMemoryAppointmentRepository, InMemoryBeneficiaryRepository, LoggingPushDispatcher,
};
pub use in_memory_store::{InMemoryExecutionRecordRepository, InMemoryJobStore};
pub use observability::{JobMetrics, StructuredLogger};
pub use partner::{HttpPartnerClient, TokenCache};
