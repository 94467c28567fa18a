//! 合作方预约领域模型与外部协作者接口

pub mod appointment;
pub mod beneficiary;
pub mod notification;
pub mod partner;
pub mod ports;

pub use appointment::*;
pub use beneficiary::*;
pub use notification::*;
pub use partner::*;
pub use ports::*;
pub use planner_core::{PlannerError, Result};
