pub mod sqlite;

pub use sqlite::{DatabaseManager, SqliteExecutionRecordRepository, SqliteJobStore};
