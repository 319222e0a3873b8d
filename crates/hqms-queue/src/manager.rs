//! 排队管理器
//!
//! 唯一允许修改号码状态和医生当前就诊号的组件。
//!
//! 每位医生一条通道（候诊队列 + 当前就诊号），由独立的读写锁保护：
//! 同一医生的挂号、叫号、结束就诊互相串行，不同医生之间互不阻塞。
//! 号码分配是跨医生共享的更小的临界区，由号码存储负责。
//! tokio 的读写锁按先来先服务排队，读写双方都不会被无限期饿死。

use crate::{
    directory::DoctorDirectory,
    doctor_queue::{DoctorQueue, QueueEntry},
    estimator::{WaitEstimator, DEFAULT_CONSULTATION_MINUTES},
    state_machine::{TokenEvent, TokenStateMachine},
    token_store::TokenStore,
};
use chrono::Utc;
use hqms_core::{
    utils::{is_valid_patient_age, normalize_phone},
    Doctor, HqmsError, RegistrationRequest, Result, Token, TokenStatus, TokenView,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 排队参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// 医生未配置平均接诊时长时的默认值（分钟）
    pub default_consultation_minutes: u32,
    /// 每位医生候诊人数上限，不设置则不限
    pub max_waiting_per_doctor: Option<usize>,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            default_consultation_minutes: DEFAULT_CONSULTATION_MINUTES,
            max_waiting_per_doctor: None,
        }
    }
}

/// 单个医生的队列统计
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub doctor_id: Uuid,
    pub waiting: usize,
    pub emergency_waiting: usize,
    pub normal_waiting: usize,
    pub active_token_id: Option<Uuid>,
    pub completed: usize,
    pub estimated_clear_minutes: u32,
}

/// 系统概览
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueOverview {
    pub doctors_with_queue: usize,
    pub total_waiting: usize,
    pub total_in_progress: usize,
}

/// 医生通道
#[derive(Debug, Default)]
struct DoctorLane {
    queue: DoctorQueue,
    active_token_id: Option<Uuid>,
}

/// 排队管理器
pub struct QueueManager {
    store: Arc<dyn TokenStore>,
    directory: Arc<dyn DoctorDirectory>,
    estimator: WaitEstimator,
    state_machine: TokenStateMachine,
    settings: QueueSettings,
    lanes: RwLock<HashMap<Uuid, Arc<RwLock<DoctorLane>>>>,
}

impl QueueManager {
    /// 创建新的排队管理器
    pub fn new(
        store: Arc<dyn TokenStore>,
        directory: Arc<dyn DoctorDirectory>,
        settings: QueueSettings,
    ) -> Self {
        Self {
            store,
            directory,
            estimator: WaitEstimator::new(settings.default_consultation_minutes),
            state_machine: TokenStateMachine::new(),
            settings,
            lanes: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn directory(&self) -> &Arc<dyn DoctorDirectory> {
        &self.directory
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    /// 获取医生通道，不存在则创建
    async fn lane(&self, doctor_id: Uuid) -> Arc<RwLock<DoctorLane>> {
        if let Some(lane) = self.lanes.read().await.get(&doctor_id) {
            return lane.clone();
        }

        let mut lanes = self.lanes.write().await;
        lanes.entry(doctor_id).or_default().clone()
    }

    async fn existing_lane(&self, doctor_id: Uuid) -> Option<Arc<RwLock<DoctorLane>>> {
        self.lanes.read().await.get(&doctor_id).cloned()
    }

    async fn require_doctor(&self, doctor_id: Uuid) -> Result<Doctor> {
        self.directory
            .doctor(doctor_id)
            .await?
            .ok_or_else(|| HqmsError::NotFound(format!("Doctor {} not found", doctor_id)))
    }

    /// 挂号
    ///
    /// 校验医生属于所选科室，分配全局号码，加入医生候诊队列，并附带预计等待时间。
    pub async fn register_token(&self, request: RegistrationRequest) -> Result<TokenView> {
        let RegistrationRequest {
            mut patient,
            problem,
            department_id,
            doctor_id,
            priority,
        } = request;

        let name = patient.patient_name.trim();
        if name.is_empty() {
            return Err(HqmsError::Validation("Patient name is required".to_string()));
        }
        patient.patient_name = name.to_string();
        patient.patient_phone = normalize_phone(&patient.patient_phone).ok_or_else(|| {
            HqmsError::Validation(format!("Invalid phone number: {}", patient.patient_phone))
        })?;
        if !is_valid_patient_age(patient.patient_age) {
            return Err(HqmsError::Validation(format!("Invalid patient age: {}", patient.patient_age)));
        }

        let doctor = match self.directory.doctor(doctor_id).await? {
            Some(doctor) if doctor.department_id == department_id => doctor,
            _ => {
                warn!("Rejected registration: doctor {} not in department {}", doctor_id, department_id);
                return Err(HqmsError::InvalidDoctorAssignment { doctor_id, department_id });
            }
        };
        let Some(department) = self.directory.department(department_id).await? else {
            warn!("Rejected registration: department {} does not exist", department_id);
            return Err(HqmsError::InvalidDoctorAssignment { doctor_id, department_id });
        };

        let lane = self.lane(doctor_id).await;
        let mut lane = lane.write().await;

        if let Some(cap) = self.settings.max_waiting_per_doctor {
            if lane.queue.len() >= cap {
                warn!("Queue for doctor {} is full ({} waiting)", doctor_id, cap);
                return Err(HqmsError::Validation(format!(
                    "Doctor {} already has {} patients waiting",
                    doctor_id, cap
                )));
            }
        }

        // 号码在通道锁内分配，保证同一医生的队列顺序与号码顺序一致
        let issued = self.store.next_token_number().await?;
        let token = Token {
            id: Uuid::new_v4(),
            token_number: issued.number,
            patient,
            problem: problem.trim().to_string(),
            department_id,
            doctor_id,
            priority,
            status: TokenStatus::Waiting,
            created_at: issued.issued_at,
            called_at: None,
            completed_at: None,
        };

        self.store.insert(token.clone()).await?;
        lane.queue.enqueue(QueueEntry::from(&token));

        let position = lane
            .queue
            .position_of(token.id)
            .unwrap_or_else(|| lane.queue.len().saturating_sub(1));
        let estimated_wait = self.estimator.estimate_for(position, &doctor);

        info!(
            "Registered token #{} ({:?}) for doctor {} at position {}",
            token.token_number, token.priority, doctor_id, position
        );

        Ok(TokenView::waiting(token, position, estimated_wait).with_names(Some(doctor.name), Some(department.name)))
    }

    /// 叫号
    ///
    /// 医生已有就诊中的号码时返回 `DoctorBusy`，无人候诊时返回 `QueueEmpty`。
    /// 出队、状态转换和设置当前就诊号在同一把通道写锁内完成。
    pub async fn call_next(&self, doctor_id: Uuid) -> Result<Token> {
        let doctor = self.require_doctor(doctor_id).await?;
        if !doctor.available {
            warn!("Doctor {} is unavailable, call-next refused", doctor_id);
            return Err(HqmsError::DoctorUnavailable(doctor_id));
        }

        let lane = self.lane(doctor_id).await;
        let mut lane = lane.write().await;

        if let Some(active_token_id) = lane.active_token_id {
            warn!("Doctor {} is busy with token {}", doctor_id, active_token_id);
            return Err(HqmsError::DoctorBusy { doctor_id, active_token_id });
        }

        let entry = *lane
            .queue
            .peek_next()
            .ok_or(HqmsError::QueueEmpty(doctor_id))?;

        let mut token = self.store.get(entry.token_id).await?.ok_or_else(|| {
            HqmsError::Internal(format!("Queued token {} missing from store", entry.token_id))
        })?;
        self.state_machine.apply(&mut token, TokenEvent::Called, Utc::now())?;
        self.store.update(token.clone()).await?;

        // 存储成功后才真正出队，失败时队列保持原样
        lane.queue.dequeue_next();
        lane.active_token_id = Some(token.id);

        info!("Doctor {} called token #{}", doctor_id, token.token_number);
        Ok(token)
    }

    /// 结束就诊
    ///
    /// 只有医生当前就诊中的号码可以结束，其余情况一律返回 `TokenNotActive`。
    pub async fn complete_token(&self, token_id: Uuid) -> Result<Token> {
        let doctor_id = match self.store.get(token_id).await? {
            Some(token) => token.doctor_id,
            None => return Err(HqmsError::TokenNotActive(token_id)),
        };

        let lane = self
            .existing_lane(doctor_id)
            .await
            .ok_or(HqmsError::TokenNotActive(token_id))?;
        let mut lane = lane.write().await;

        if lane.active_token_id != Some(token_id) {
            warn!("Token {} is not active for doctor {}", token_id, doctor_id);
            return Err(HqmsError::TokenNotActive(token_id));
        }

        let mut token = self
            .store
            .get(token_id)
            .await?
            .ok_or(HqmsError::TokenNotActive(token_id))?;
        self.state_machine
            .apply(&mut token, TokenEvent::Completed, Utc::now())
            .map_err(|_| HqmsError::TokenNotActive(token_id))?;
        self.store.update(token.clone()).await?;

        lane.active_token_id = None;

        info!("Doctor {} completed token #{}", doctor_id, token.token_number);
        Ok(token)
    }

    /// 医生当前候诊列表，按叫号顺序排列
    pub async fn get_queue_view(&self, doctor_id: Uuid) -> Result<Vec<TokenView>> {
        let doctor = self.require_doctor(doctor_id).await?;
        let Some(lane) = self.existing_lane(doctor_id).await else {
            return Ok(Vec::new());
        };
        let lane = lane.read().await;

        let ids: Vec<Uuid> = lane.queue.iter().map(|e| e.token_id).collect();
        let tokens = self.store.get_many(&ids).await?;
        let average = self.estimator.average_minutes(&doctor);
        let department_name = self.directory.department(doctor.department_id).await?.map(|d| d.name);

        debug!("Queue view for doctor {}: {} waiting", doctor_id, tokens.len());

        Ok(tokens
            .into_iter()
            .enumerate()
            .map(|(position, token)| {
                TokenView::waiting(token, position, self.estimator.estimate(position, average))
                    .with_names(Some(doctor.name.clone()), department_name.clone())
            })
            .collect())
    }

    /// 医生当前就诊中的号码
    pub async fn active_token(&self, doctor_id: Uuid) -> Result<Option<Token>> {
        self.require_doctor(doctor_id).await?;
        let Some(lane) = self.existing_lane(doctor_id).await else {
            return Ok(None);
        };
        let lane = lane.read().await;

        match lane.active_token_id {
            Some(id) => self.store.get(id).await,
            None => Ok(None),
        }
    }

    /// 按号码查询状态，候诊中的号码实时计算位置和预计等待时间
    pub async fn track_token(&self, token_number: u64) -> Result<TokenView> {
        let token = self
            .store
            .get_by_number(token_number)
            .await?
            .ok_or_else(|| HqmsError::NotFound(format!("Token #{} not found", token_number)))?;

        let doctor = self.directory.doctor(token.doctor_id).await?;
        let department_name = self.directory.department(token.department_id).await?.map(|d| d.name);
        let doctor_name = doctor.as_ref().map(|d| d.name.clone());

        let view = self.locate(token, doctor.as_ref()).await?;
        Ok(view.with_names(doctor_name, department_name))
    }

    /// 计算号码当前的候诊位置
    async fn locate(&self, token: Token, doctor: Option<&Doctor>) -> Result<TokenView> {
        if !token.is_waiting() {
            return Ok(TokenView::settled(token));
        }

        let average = match doctor {
            Some(doctor) => self.estimator.average_minutes(doctor),
            None => self.settings.default_consultation_minutes,
        };

        let Some(lane) = self.existing_lane(token.doctor_id).await else {
            warn!(
                "Waiting token #{} has no queue for doctor {}",
                token.token_number, token.doctor_id
            );
            return Ok(TokenView::settled(token));
        };
        let lane = lane.read().await;

        // 持有通道读锁后重新读取，与队列位置保持一致
        let token_number = token.token_number;
        let token = self
            .store
            .get(token.id)
            .await?
            .ok_or_else(|| HqmsError::NotFound(format!("Token #{} not found", token_number)))?;

        match lane.queue.position_of(token.id) {
            Some(position) if token.is_waiting() => {
                debug!("Token #{} is at position {}", token_number, position);
                let estimate = self.estimator.estimate(position, average);
                Ok(TokenView::waiting(token, position, estimate))
            }
            _ => Ok(TokenView::settled(token)),
        }
    }

    /// 医生队列统计
    pub async fn queue_stats(&self, doctor_id: Uuid) -> Result<QueueStats> {
        let doctor = self.require_doctor(doctor_id).await?;
        let completed = self
            .store
            .list_by_doctor_status(doctor_id, TokenStatus::Completed)
            .await?
            .len();

        let mut stats = QueueStats {
            doctor_id,
            waiting: 0,
            emergency_waiting: 0,
            normal_waiting: 0,
            active_token_id: None,
            completed,
            estimated_clear_minutes: 0,
        };

        if let Some(lane) = self.existing_lane(doctor_id).await {
            let lane = lane.read().await;
            stats.waiting = lane.queue.len();
            stats.emergency_waiting = lane.queue.emergency_len();
            stats.normal_waiting = lane.queue.normal_len();
            stats.active_token_id = lane.active_token_id;
            stats.estimated_clear_minutes = self.estimator.estimate_for(stats.waiting, &doctor);
        }

        Ok(stats)
    }

    /// 系统概览
    pub async fn overview(&self) -> QueueOverview {
        let lanes: Vec<Arc<RwLock<DoctorLane>>> = self.lanes.read().await.values().cloned().collect();

        let mut overview = QueueOverview {
            doctors_with_queue: lanes.len(),
            total_waiting: 0,
            total_in_progress: 0,
        };

        for lane in lanes {
            let lane = lane.read().await;
            overview.total_waiting += lane.queue.len();
            if lane.active_token_id.is_some() {
                overview.total_in_progress += 1;
            }
        }

        overview
    }

    /// 根据号码存储重建所有医生通道，返回恢复的号码数
    ///
    /// 以存储中的号码为准：医生已从目录中移除时仍恢复其通道，候诊号码仍可查询位置和预计等待时间。
    pub async fn recover(&self) -> Result<usize> {
        let mut by_doctor: HashMap<Uuid, (Vec<Token>, Vec<Token>)> = HashMap::new();
        for token in self.store.list_by_status(TokenStatus::Waiting).await? {
            by_doctor.entry(token.doctor_id).or_default().0.push(token);
        }
        for token in self.store.list_by_status(TokenStatus::InProgress).await? {
            by_doctor.entry(token.doctor_id).or_default().1.push(token);
        }

        for (doctor_id, (_, in_progress)) in &by_doctor {
            if in_progress.len() > 1 {
                return Err(HqmsError::Storage(format!(
                    "Doctor {} has {} tokens in progress",
                    doctor_id,
                    in_progress.len()
                )));
            }
        }

        let mut restored = 0;
        for (doctor_id, (waiting, in_progress)) in by_doctor {
            if self.directory.doctor(doctor_id).await?.is_none() {
                warn!("Recovering tokens for doctor {} missing from directory", doctor_id);
            }

            let lane = self.lane(doctor_id).await;
            let mut lane = lane.write().await;
            lane.queue.clear();
            for token in &waiting {
                lane.queue.enqueue(QueueEntry::from(token));
            }
            lane.active_token_id = in_progress.first().map(|t| t.id);

            restored += waiting.len() + in_progress.len();
            info!(
                "Recovered doctor {}: {} waiting, active {:?}",
                doctor_id,
                waiting.len(),
                lane.active_token_id
            );
        }

        Ok(restored)
    }
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("settings", &self.settings)
            .field("estimator", &self.estimator)
            .finish_non_exhaustive()
    }
}
