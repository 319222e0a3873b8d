//! 错误定义模块

use thiserror::Error;
use uuid::Uuid;

/// HQMS系统统一错误类型
#[derive(Error, Debug)]
pub enum HqmsError {
    #[error("医生 {doctor_id} 不属于科室 {department_id} 或不存在")]
    InvalidDoctorAssignment { doctor_id: Uuid, department_id: Uuid },

    #[error("医生 {doctor_id} 正在接诊号码 {active_token_id}")]
    DoctorBusy { doctor_id: Uuid, active_token_id: Uuid },

    #[error("医生 {0} 当前不可接诊")]
    DoctorUnavailable(Uuid),

    #[error("医生 {0} 的候诊队列为空")]
    QueueEmpty(Uuid),

    #[error("号码 {0} 不在就诊中")]
    TokenNotActive(Uuid),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效状态转换: 从 {from} 经 {event}")]
    InvalidStateTransition { from: String, event: String },

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("存储错误: {0}")]
    Storage(String),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

impl HqmsError {
    /// 调用方可自行恢复的业务错误（重试、换操作或提示用户）
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HqmsError::InvalidDoctorAssignment { .. }
                | HqmsError::DoctorBusy { .. }
                | HqmsError::DoctorUnavailable(_)
                | HqmsError::QueueEmpty(_)
                | HqmsError::TokenNotActive(_)
                | HqmsError::NotFound(_)
                | HqmsError::InvalidStateTransition { .. }
                | HqmsError::Validation(_)
        )
    }

    /// 稳定的错误代码，供接口层返回
    pub fn code(&self) -> &'static str {
        match self {
            HqmsError::InvalidDoctorAssignment { .. } => "INVALID_DOCTOR_ASSIGNMENT",
            HqmsError::DoctorBusy { .. } => "DOCTOR_BUSY",
            HqmsError::DoctorUnavailable(_) => "DOCTOR_UNAVAILABLE",
            HqmsError::QueueEmpty(_) => "QUEUE_EMPTY",
            HqmsError::TokenNotActive(_) => "TOKEN_NOT_ACTIVE",
            HqmsError::NotFound(_) => "NOT_FOUND",
            HqmsError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            HqmsError::Validation(_) => "VALIDATION",
            HqmsError::Storage(_) => "STORAGE",
            HqmsError::Internal(_) => "INTERNAL",
        }
    }
}

/// HQMS系统统一结果类型
pub type Result<T> = std::result::Result<T, HqmsError>;
