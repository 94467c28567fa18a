//! 可观测性：结构化日志与指标

pub mod job_metrics;
pub mod structured_logger;

pub use job_metrics::JobMetrics;
pub use structured_logger::StructuredLogger;
