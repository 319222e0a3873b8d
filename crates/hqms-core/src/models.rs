//! 核心数据模型定义

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// 科室信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// 医生信息（由外部管理端维护）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub specialization: String,
    pub department_id: Uuid,
    #[serde(default = "default_available")]
    pub available: bool,                            // 是否可接诊
    #[serde(default)]
    pub average_consultation_minutes: Option<u32>,  // 平均接诊时长
}

fn default_available() -> bool {
    true
}

/// 性别枚举
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// 号码优先级
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Normal,    // 普通
    Emergency, // 急诊
}

impl Priority {
    pub fn is_emergency(&self) -> bool {
        matches!(self, Priority::Emergency)
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// 号码状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenStatus {
    Waiting,    // 候诊中
    InProgress, // 就诊中
    Completed,  // 已完成
}

/// 挂号时登记的患者信息快照
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientDetails {
    pub patient_name: String,
    pub patient_phone: String,
    #[serde(deserialize_with = "number_or_string")]
    pub patient_age: u16, // 表单可能以字符串提交
    pub patient_gender: Gender,
}

/// 接受数字或数字字符串
fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u16),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid number: {:?}", text))),
    }
}

/// 就诊号码
///
/// 除 `status` 与三个时间戳外，所有字段在挂号后不再变化。
/// 状态只能由队列管理器沿 `WAITING → IN_PROGRESS → COMPLETED` 推进。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub id: Uuid,
    pub token_number: u64, // 全局递增的公开号码
    #[serde(flatten)]
    pub patient: PatientDetails,
    pub problem: String,
    pub department_id: Uuid,
    pub doctor_id: Uuid,
    pub priority: Priority,
    pub status: TokenStatus,
    pub created_at: DateTime<Utc>,
    pub called_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Token {
    pub fn is_waiting(&self) -> bool {
        self.status == TokenStatus::Waiting
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == TokenStatus::InProgress
    }

    pub fn is_completed(&self) -> bool {
        self.status == TokenStatus::Completed
    }
}

/// 挂号请求
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    #[serde(flatten)]
    pub patient: PatientDetails,
    #[serde(default)]
    pub problem: String,
    pub department_id: Uuid,
    pub doctor_id: Uuid,
    #[serde(default)]
    pub priority: Priority,
}

/// 号码视图：号码记录加上按查询时刻重新计算的候诊信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenView {
    #[serde(flatten)]
    pub token: Token,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_wait_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_name: Option<String>,
}

impl TokenView {
    /// 候诊中的视图
    pub fn waiting(token: Token, position: usize, estimated_wait_minutes: u32) -> Self {
        Self {
            token,
            queue_position: Some(position),
            estimated_wait_minutes: Some(estimated_wait_minutes),
            doctor_name: None,
            department_name: None,
        }
    }

    /// 不带候诊信息的视图（就诊中或已完成）
    pub fn settled(token: Token) -> Self {
        Self {
            token,
            queue_position: None,
            estimated_wait_minutes: None,
            doctor_name: None,
            department_name: None,
        }
    }

    /// 附上医生和科室名称，供前台和查询页面展示
    pub fn with_names(mut self, doctor_name: Option<String>, department_name: Option<String>) -> Self {
        self.doctor_name = doctor_name;
        self.department_name = department_name;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_token() -> Token {
        Token {
            id: Uuid::new_v4(),
            token_number: 7,
            patient: PatientDetails {
                patient_name: "Asha Rao".to_string(),
                patient_phone: "9876543210".to_string(),
                patient_age: 34,
                patient_gender: Gender::Female,
            },
            problem: "fever".to_string(),
            department_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            priority: Priority::Emergency,
            status: TokenStatus::Waiting,
            created_at: Utc::now(),
            called_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_token_wire_shape() {
        let value = serde_json::to_value(sample_token()).unwrap();

        assert_eq!(value["tokenNumber"], json!(7));
        assert_eq!(value["patientName"], json!("Asha Rao"));
        assert_eq!(value["patientGender"], json!("FEMALE"));
        assert_eq!(value["priority"], json!("EMERGENCY"));
        assert_eq!(value["status"], json!("WAITING"));
        assert!(value["calledAt"].is_null());
    }

    #[test]
    fn test_view_omits_wait_for_settled_tokens() {
        let mut token = sample_token();
        token.status = TokenStatus::InProgress;
        let value = serde_json::to_value(TokenView::settled(token)).unwrap();

        assert_eq!(value["status"], json!("IN_PROGRESS"));
        assert!(value.get("estimatedWaitMinutes").is_none());
        assert!(value.get("queuePosition").is_none());
    }

    #[test]
    fn test_view_carries_names() {
        let view = TokenView::waiting(sample_token(), 2, 20)
            .with_names(Some("Dr. Mehta".to_string()), Some("Cardiology".to_string()));
        let value = serde_json::to_value(view).unwrap();

        assert_eq!(value["doctorName"], json!("Dr. Mehta"));
        assert_eq!(value["departmentName"], json!("Cardiology"));
        assert_eq!(value["queuePosition"], json!(2));
    }

    #[test]
    fn test_registration_accepts_age_as_string() {
        let body = json!({
            "patientName": "Ravi",
            "patientPhone": "9876543210",
            "patientAge": "40",
            "patientGender": "MALE",
            "departmentId": Uuid::new_v4(),
            "doctorId": Uuid::new_v4()
        });
        let request: RegistrationRequest = serde_json::from_value(body.clone()).unwrap();
        assert_eq!(request.patient.patient_age, 40);
        assert_eq!(request.priority, Priority::Normal);

        let mut numeric = body.clone();
        numeric["patientAge"] = json!(40);
        let request: RegistrationRequest = serde_json::from_value(numeric).unwrap();
        assert_eq!(request.patient.patient_age, 40);

        let mut garbage = body;
        garbage["patientAge"] = json!("forty");
        assert!(serde_json::from_value::<RegistrationRequest>(garbage).is_err());
    }

    #[test]
    fn test_doctor_defaults_to_available() {
        let doctor: Doctor = serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "name": "Dr. Mehta",
            "specialization": "Cardiology",
            "departmentId": Uuid::new_v4()
        }))
        .unwrap();

        assert!(doctor.available);
        assert_eq!(doctor.average_consultation_minutes, None);
    }
}
