//! Web服务器

use axum::{
    routing::{get, post, put},
    Router,
};
use hqms_queue::{QueueManager, StaticDirectory};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::handlers::{
    api_root, call_next, complete_token, current_token, doctors_by_department, health,
    list_departments, list_doctors, overview, queue_stats, queue_view, register_token,
    set_availability, track_token,
};

/// 处理器共享状态
pub struct AppState {
    pub manager: Arc<QueueManager>,
    /// 与管理器共用同一份名录，接诊状态的修改对叫号立即可见
    pub directory: Arc<StaticDirectory>,
    pub service_name: String,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(manager: Arc<QueueManager>, directory: Arc<StaticDirectory>, service_name: impl Into<String>) -> Self {
        Self {
            manager,
            directory,
            service_name: service_name.into(),
        }
    }
}

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState, cors_permissive: bool) -> Self {
        let app = Self::create_app(Arc::new(state), cors_permissive);
        Self { addr, app }
    }

    /// 组装路由和全局中间件
    pub fn create_app(state: SharedState, cors_permissive: bool) -> Router {
        let app = Router::new()
            // 根路径
            .route("/", get(api_root))
            // 健康检查
            .route("/health", get(health))
            .route("/overview", get(overview))
            // 前台
            .nest("/receptionist", receptionist_routes())
            // 医生工作站
            .nest("/doctor", doctor_routes())
            // 患者查询
            .route("/tokens/track/:token_number", get(track_token))
            // 名录
            .route("/departments", get(list_departments))
            .route("/doctors", get(list_doctors))
            .route("/doctors/department/:department_id", get(doctors_by_department))
            .route("/admin/doctors/:doctor_id/availability", put(set_availability))
            .with_state(state)
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

        if cors_permissive {
            app.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
        } else {
            app
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start web server: {}", e))?;

        info!("Web server stopped");
        Ok(())
    }
}

/// 前台路由
fn receptionist_routes() -> Router<SharedState> {
    Router::new().route("/tokens/generate", post(register_token))
}

/// 医生工作站路由
fn doctor_routes() -> Router<SharedState> {
    Router::new()
        .route("/queue/:doctor_id", get(queue_view))
        .route("/queue/:doctor_id/next", put(call_next))
        .route("/queue/:doctor_id/current", get(current_token))
        .route("/queue/:doctor_id/stats", get(queue_stats))
        .route("/tokens/:token_id/complete", put(complete_token))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            // 无法监听信号时继续运行，不触发关闭
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
