//! # HQMS管理模块
//!
//! 提供配置管理和日志初始化等运维功能

pub mod config;
pub mod logging;

pub use config::{
    ConfigManager, ConfigValidator, DepartmentEntry, DirectoryConfig, DoctorEntry, HqmsConfig,
    ServerConfig,
};
pub use logging::{init_logging, LogFormat, LoggingConfig};
