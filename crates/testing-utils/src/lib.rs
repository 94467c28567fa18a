//! # Planner Testing Utils
//!
//! 测试共享的内存协作者实现与测试数据构建器。
//!
//! ```toml
//! [dev-dependencies]
//! planner-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod mocks;

pub use builders::*;
pub use mocks::*;
