//! 候诊时间估算
//!
//! 按候诊位置和医生平均接诊时长估算等待分钟数，每次查询时重新计算，不缓存在号码上。

use hqms_core::Doctor;

/// 未配置医生平均接诊时长时使用的默认值（分钟）
pub const DEFAULT_CONSULTATION_MINUTES: u32 = 10;

/// 候诊时间估算器
#[derive(Debug, Clone, Copy)]
pub struct WaitEstimator {
    default_minutes: u32,
}

impl WaitEstimator {
    pub fn new(default_minutes: u32) -> Self {
        Self { default_minutes }
    }

    /// 医生的平均接诊时长，未配置时取默认值
    pub fn average_minutes(&self, doctor: &Doctor) -> u32 {
        doctor
            .average_consultation_minutes
            .unwrap_or(self.default_minutes)
    }

    /// `position` 从 0 开始，0 表示下一位
    pub fn estimate(&self, position: usize, average_minutes: u32) -> u32 {
        let position = u32::try_from(position).unwrap_or(u32::MAX);
        position.saturating_mul(average_minutes)
    }

    pub fn estimate_for(&self, position: usize, doctor: &Doctor) -> u32 {
        self.estimate(position, self.average_minutes(doctor))
    }
}

impl Default for WaitEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_CONSULTATION_MINUTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn doctor(average: Option<u32>) -> Doctor {
        Doctor {
            id: Uuid::new_v4(),
            name: "Dr. Iyer".to_string(),
            specialization: "General Medicine".to_string(),
            department_id: Uuid::new_v4(),
            available: true,
            average_consultation_minutes: average,
        }
    }

    #[test]
    fn test_position_times_average() {
        let estimator = WaitEstimator::default();
        assert_eq!(estimator.estimate(3, 10), 30);
        assert_eq!(estimator.estimate(2, 10), 20);
        assert_eq!(estimator.estimate(0, 10), 0);
    }

    #[test]
    fn test_doctor_average_overrides_default() {
        let estimator = WaitEstimator::new(12);
        assert_eq!(estimator.estimate_for(2, &doctor(Some(15))), 30);
        assert_eq!(estimator.estimate_for(2, &doctor(None)), 24);
    }

    #[test]
    fn test_estimate_saturates() {
        let estimator = WaitEstimator::default();
        assert_eq!(estimator.estimate(usize::MAX, 10), u32::MAX);
    }
}
