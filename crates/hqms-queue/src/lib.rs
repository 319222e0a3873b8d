//! # HQMS排队模块
//!
//! 提供门诊排队叫号的核心引擎，包括：
//! - 号码状态机：管理就诊号码 `WAITING → IN_PROGRESS → COMPLETED` 的生命周期
//! - 医生候诊队列：急诊优先、同级先到先叫
//! - 号码存储：按 id、号码查询，分配全局递增号码
//! - 候诊时间估算：按位置和平均接诊时长实时计算
//! - 排队管理器：按医生串行化挂号、叫号与结束就诊

pub mod directory;
pub mod doctor_queue;
pub mod estimator;
pub mod manager;
pub mod state_machine;
pub mod token_store;

// 重新导出主要类型
pub use directory::{DoctorDirectory, StaticDirectory};
pub use doctor_queue::{DoctorQueue, QueueEntry};
pub use estimator::{WaitEstimator, DEFAULT_CONSULTATION_MINUTES};
pub use manager::{QueueManager, QueueOverview, QueueSettings, QueueStats};
pub use state_machine::{TokenEvent, TokenStateMachine};
pub use token_store::{IssuedNumber, MemoryTokenStore, TokenStore};
