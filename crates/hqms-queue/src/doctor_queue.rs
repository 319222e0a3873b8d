//! 医生候诊队列
//!
//! 每位医生一个队列，分急诊、普通两级，各自按号码先后排列。
//! 所有急诊号排在所有普通号之前。

use hqms_core::{Priority, Token};
use std::collections::VecDeque;
use uuid::Uuid;

/// 队列条目，只记录排序所需的信息，号码详情以号码存储为准
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry {
    pub token_id: Uuid,
    pub token_number: u64,
    pub priority: Priority,
}

impl From<&Token> for QueueEntry {
    fn from(token: &Token) -> Self {
        Self {
            token_id: token.id,
            token_number: token.token_number,
            priority: token.priority,
        }
    }
}

/// 医生候诊队列
#[derive(Debug, Default)]
pub struct DoctorQueue {
    emergency: VecDeque<QueueEntry>,
    normal: VecDeque<QueueEntry>,
}

impl DoctorQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入候诊号，号码重复时不插入并返回 `false`
    ///
    /// 正常挂号时号码单调递增，直接追加到队尾；恢复时可能乱序，按号码插入。
    pub fn enqueue(&mut self, entry: QueueEntry) -> bool {
        let lane = match entry.priority {
            Priority::Emergency => &mut self.emergency,
            Priority::Normal => &mut self.normal,
        };

        let at = lane.partition_point(|e| e.token_number < entry.token_number);
        if lane.get(at).map(|e| e.token_number) == Some(entry.token_number) {
            return false;
        }

        if at == lane.len() {
            lane.push_back(entry);
        } else {
            lane.insert(at, entry);
        }
        true
    }

    /// 取出下一位：先急诊，后普通
    pub fn dequeue_next(&mut self) -> Option<QueueEntry> {
        self.emergency
            .pop_front()
            .or_else(|| self.normal.pop_front())
    }

    pub fn peek_next(&self) -> Option<&QueueEntry> {
        self.emergency.front().or_else(|| self.normal.front())
    }

    /// 按叫号顺序遍历当前候诊号，可重复调用
    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> + '_ {
        self.emergency.iter().chain(self.normal.iter())
    }

    /// 号码在队列中的位置，0 表示下一位
    pub fn position_of(&self, token_id: Uuid) -> Option<usize> {
        self.iter().position(|e| e.token_id == token_id)
    }

    pub fn len(&self) -> usize {
        self.emergency.len() + self.normal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emergency.is_empty() && self.normal.is_empty()
    }

    pub fn emergency_len(&self) -> usize {
        self.emergency.len()
    }

    pub fn normal_len(&self) -> usize {
        self.normal.len()
    }

    pub fn clear(&mut self) {
        self.emergency.clear();
        self.normal.clear();
    }
}
