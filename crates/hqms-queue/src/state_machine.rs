//! 号码状态机
//!
//! 管理就诊号码的生命周期状态转换：`WAITING → IN_PROGRESS → COMPLETED`

use chrono::{DateTime, Utc};
use hqms_core::{HqmsError, Result, Token, TokenStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 号码状态转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TokenEvent {
    Called,    // 叫号
    Completed, // 就诊结束
}

/// 号码状态机
#[derive(Debug)]
pub struct TokenStateMachine {
    transitions: HashMap<(TokenStatus, TokenEvent), TokenStatus>,
}

impl TokenStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        // 只允许向前推进
        transitions.insert((TokenStatus::Waiting, TokenEvent::Called), TokenStatus::InProgress);
        transitions.insert((TokenStatus::InProgress, TokenEvent::Completed), TokenStatus::Completed);

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: TokenStatus, event: TokenEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 计算状态转换结果
    pub fn transition(&self, from: TokenStatus, event: TokenEvent) -> Result<TokenStatus> {
        match self.transitions.get(&(from, event)) {
            Some(to) => Ok(*to),
            None => Err(HqmsError::InvalidStateTransition {
                from: format!("{:?}", from),
                event: format!("{:?}", event),
            }),
        }
    }

    /// 对号码执行状态转换并记录对应时间戳
    ///
    /// 失败时号码保持原样。
    pub fn apply(&self, token: &mut Token, event: TokenEvent, at: DateTime<Utc>) -> Result<()> {
        let next = self.transition(token.status, event)?;

        match event {
            TokenEvent::Called => {
                if token.called_at.is_some() {
                    return Err(HqmsError::InvalidStateTransition {
                        from: format!("{:?}", token.status),
                        event: format!("{:?}", event),
                    });
                }
                token.called_at = Some(at);
            }
            TokenEvent::Completed => {
                if token.completed_at.is_some() {
                    return Err(HqmsError::InvalidStateTransition {
                        from: format!("{:?}", token.status),
                        event: format!("{:?}", event),
                    });
                }
                token.completed_at = Some(at);
            }
        }

        token.status = next;
        Ok(())
    }

    /// 获取状态的所有可能事件
    pub fn get_possible_events(&self, current_state: TokenStatus) -> Vec<TokenEvent> {
        self.transitions
            .keys()
            .filter(|(state, _)| *state == current_state)
            .map(|(_, event)| *event)
            .collect()
    }
}

impl Default for TokenStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
