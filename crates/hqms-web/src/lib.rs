//! HQMS Web接口
//!
//! 前台挂号、医生叫号和患者查询的 HTTP 服务

pub mod handlers;
pub mod server;

pub use handlers::{ApiError, ApiResult};
pub use server::{AppState, SharedState, WebServer};
