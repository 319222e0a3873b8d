//! HTTP处理器

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use hqms_core::{HqmsError, RegistrationRequest};
use hqms_queue::DoctorDirectory;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::server::SharedState;

/// 接口层结果类型
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// API根路径处理器
pub async fn api_root(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "service": state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/health",
            "register": "/receptionist/tokens/generate",
            "doctor_queue": "/doctor/queue/:doctor_id",
            "track": "/tokens/track/:token_number"
        }
    }))
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 挂号
pub async fn register_token(
    State(state): State<SharedState>,
    payload: Result<Json<RegistrationRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    info!("Registering patient for doctor {}", request.doctor_id);
    let view = state.manager.register_token(request).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// 叫号
pub async fn call_next(
    State(state): State<SharedState>,
    Path(doctor_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let token = state.manager.call_next(doctor_id).await?;
    Ok(Json(token))
}

/// 结束就诊
pub async fn complete_token(
    State(state): State<SharedState>,
    Path(token_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let token = state.manager.complete_token(token_id).await?;
    Ok(Json(json!({
        "acknowledged": true,
        "token": token
    })))
}

/// 医生候诊列表
pub async fn queue_view(
    State(state): State<SharedState>,
    Path(doctor_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let queue = state.manager.get_queue_view(doctor_id).await?;
    Ok(Json(queue))
}

/// 医生当前就诊号码
pub async fn current_token(
    State(state): State<SharedState>,
    Path(doctor_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let token = state.manager.active_token(doctor_id).await?;
    Ok(Json(json!({ "doctorId": doctor_id, "current": token })))
}

/// 医生队列统计
pub async fn queue_stats(
    State(state): State<SharedState>,
    Path(doctor_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let stats = state.manager.queue_stats(doctor_id).await?;
    Ok(Json(stats))
}

/// 号码查询
pub async fn track_token(
    State(state): State<SharedState>,
    Path(token_number): Path<u64>,
) -> ApiResult<impl IntoResponse> {
    let view = state.manager.track_token(token_number).await?;
    Ok(Json(view))
}

/// 系统概览
pub async fn overview(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.manager.overview().await)
}

/// 科室列表
pub async fn list_departments(State(state): State<SharedState>) -> ApiResult<impl IntoResponse> {
    let departments = state.directory.departments().await?;
    Ok(Json(departments))
}

/// 医生列表
pub async fn list_doctors(State(state): State<SharedState>) -> ApiResult<impl IntoResponse> {
    let doctors = state.directory.doctors().await?;
    Ok(Json(doctors))
}

/// 科室下的医生
pub async fn doctors_by_department(
    State(state): State<SharedState>,
    Path(department_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if state.directory.department(department_id).await?.is_none() {
        return Err(HqmsError::NotFound(format!("Department {} not found", department_id)).into());
    }
    let doctors = state.directory.doctors_in_department(department_id).await?;
    Ok(Json(doctors))
}

/// 接诊状态更新请求
#[derive(Debug, Deserialize)]
pub struct AvailabilityUpdate {
    pub available: bool,
}

/// 切换医生接诊状态
pub async fn set_availability(
    State(state): State<SharedState>,
    Path(doctor_id): Path<Uuid>,
    payload: Result<Json<AvailabilityUpdate>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(update) = payload?;
    let doctor = state.directory.set_availability(doctor_id, update.available).await?;
    Ok(Json(doctor))
}

/// 接口错误，包装 [`HqmsError`] 并映射为 HTTP 状态码
#[derive(Debug)]
pub struct ApiError(pub HqmsError);

impl From<HqmsError> for ApiError {
    fn from(err: HqmsError) -> Self {
        ApiError(err)
    }
}

/// 请求体无法解析时按校验错误返回
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(HqmsError::Validation(rejection.body_text()))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            HqmsError::InvalidDoctorAssignment { .. } | HqmsError::Validation(_) => StatusCode::BAD_REQUEST,
            HqmsError::NotFound(_) => StatusCode::NOT_FOUND,
            HqmsError::DoctorBusy { .. }
            | HqmsError::DoctorUnavailable(_)
            | HqmsError::QueueEmpty(_)
            | HqmsError::TokenNotActive(_)
            | HqmsError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// 错误处理
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }

        let body = Json(json!({
            "error": true,
            "code": self.0.code(),
            "message": self.0.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let id = Uuid::new_v4();
        assert_eq!(ApiError(HqmsError::QueueEmpty(id)).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError(HqmsError::TokenNotActive(id)).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError(HqmsError::NotFound("x".into())).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError(HqmsError::InvalidDoctorAssignment { doctor_id: id, department_id: id }).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError(HqmsError::Storage("x".into())).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
