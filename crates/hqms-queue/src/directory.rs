//! 科室与医生目录
//!
//! 目录由外部管理端维护，队列引擎只读。

use async_trait::async_trait;
use hqms_core::{Department, Doctor, HqmsError, Result};
use tokio::sync::RwLock;
use uuid::Uuid;

/// 科室与医生目录接口
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn department(&self, id: Uuid) -> Result<Option<Department>>;

    async fn departments(&self) -> Result<Vec<Department>>;

    async fn doctor(&self, id: Uuid) -> Result<Option<Doctor>>;

    async fn doctors(&self) -> Result<Vec<Doctor>>;

    async fn doctors_in_department(&self, department_id: Uuid) -> Result<Vec<Doctor>> {
        Ok(self
            .doctors()
            .await?
            .into_iter()
            .filter(|d| d.department_id == department_id)
            .collect())
    }
}

/// 基于配置的静态目录
#[derive(Debug)]
pub struct StaticDirectory {
    departments: Vec<Department>,
    doctors: RwLock<Vec<Doctor>>,
}

impl StaticDirectory {
    pub fn new(departments: Vec<Department>, doctors: Vec<Doctor>) -> Self {
        for doctor in &doctors {
            if !departments.iter().any(|d| d.id == doctor.department_id) {
                tracing::warn!(
                    "Doctor {} ({}) references unknown department {}",
                    doctor.name, doctor.id, doctor.department_id
                );
            }
        }

        Self {
            departments,
            doctors: RwLock::new(doctors),
        }
    }

    /// 切换医生的接诊状态，供管理端使用
    pub async fn set_availability(&self, doctor_id: Uuid, available: bool) -> Result<Doctor> {
        let mut doctors = self.doctors.write().await;
        let doctor = doctors
            .iter_mut()
            .find(|d| d.id == doctor_id)
            .ok_or_else(|| HqmsError::NotFound(format!("Doctor {} not found", doctor_id)))?;

        doctor.available = available;
        tracing::info!("Doctor {} availability set to {}", doctor_id, available);
        Ok(doctor.clone())
    }
}

#[async_trait]
impl DoctorDirectory for StaticDirectory {
    async fn department(&self, id: Uuid) -> Result<Option<Department>> {
        Ok(self.departments.iter().find(|d| d.id == id).cloned())
    }

    async fn departments(&self) -> Result<Vec<Department>> {
        Ok(self.departments.clone())
    }

    async fn doctor(&self, id: Uuid) -> Result<Option<Doctor>> {
        Ok(self.doctors.read().await.iter().find(|d| d.id == id).cloned())
    }

    async fn doctors(&self) -> Result<Vec<Doctor>> {
        Ok(self.doctors.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (StaticDirectory, Department, Doctor) {
        let cardiology = Department {
            id: Uuid::new_v4(),
            name: "Cardiology".to_string(),
            description: None,
        };
        let doctor = Doctor {
            id: Uuid::new_v4(),
            name: "Dr. Sen".to_string(),
            specialization: "Interventional Cardiology".to_string(),
            department_id: cardiology.id,
            available: true,
            average_consultation_minutes: Some(15),
        };
        let other = Doctor {
            id: Uuid::new_v4(),
            name: "Dr. Pillai".to_string(),
            specialization: "Orthopaedics".to_string(),
            department_id: Uuid::new_v4(),
            available: true,
            average_consultation_minutes: None,
        };
        let directory = StaticDirectory::new(vec![cardiology.clone()], vec![doctor.clone(), other]);
        (directory, cardiology, doctor)
    }

    #[tokio::test]
    async fn test_doctors_in_department() {
        let (directory, cardiology, doctor) = fixture();
        let doctors = directory.doctors_in_department(cardiology.id).await.unwrap();
        assert_eq!(doctors, vec![doctor]);
        assert_eq!(directory.doctors().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_set_availability() {
        let (directory, _, doctor) = fixture();
        let updated = directory.set_availability(doctor.id, false).await.unwrap();
        assert!(!updated.available);
        assert!(!directory.doctor(doctor.id).await.unwrap().unwrap().available);

        let missing = directory.set_availability(Uuid::new_v4(), true).await;
        assert!(matches!(missing, Err(HqmsError::NotFound(_))));
    }
}
