//! 配置管理
//!
//! 提供统一的配置管理功能，支持文件与环境变量分层加载、验证和重新加载

use crate::logging::LoggingConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use hqms_core::{Department, Doctor};
use hqms_queue::{QueueSettings, StaticDirectory};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};
use uuid::Uuid;

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    /// 配置数据
    config: Arc<RwLock<HqmsConfig>>,
    /// 配置文件路径，纯内存配置时为空
    config_path: Option<String>,
    /// 配置验证器
    validator: ConfigValidator,
}

/// HQMS系统完整配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HqmsConfig {
    /// 服务器配置
    pub server: ServerConfig,
    /// 排队配置
    pub queue: QueueSettings,
    /// 日志配置
    pub logging: LoggingConfig,
    /// 科室与医生目录
    pub directory: DirectoryConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 服务器名称
    pub name: String,
    /// 监听主机
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 允许任意来源跨域访问
    pub cors_permissive: bool,
}

/// 科室与医生目录配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub departments: Vec<DepartmentEntry>,
    pub doctors: Vec<DoctorEntry>,
}

/// 科室条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentEntry {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// 医生条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorEntry {
    pub id: Uuid,
    pub name: String,
    pub specialization: String,
    pub department_id: Uuid,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub average_consultation_minutes: Option<u32>,
}

fn default_available() -> bool {
    true
}

impl From<DepartmentEntry> for Department {
    fn from(entry: DepartmentEntry) -> Self {
        Department {
            id: entry.id,
            name: entry.name,
            description: entry.description,
        }
    }
}

impl From<DoctorEntry> for Doctor {
    fn from(entry: DoctorEntry) -> Self {
        Doctor {
            id: entry.id,
            name: entry.name,
            specialization: entry.specialization,
            department_id: entry.department_id,
            available: entry.available,
            average_consultation_minutes: entry.average_consultation_minutes,
        }
    }
}

impl DirectoryConfig {
    /// 构建静态目录
    pub fn build_directory(&self) -> StaticDirectory {
        StaticDirectory::new(
            self.departments.iter().cloned().map(Department::from).collect(),
            self.doctors.iter().cloned().map(Doctor::from).collect(),
        )
    }
}

impl ConfigManager {
    /// 从配置文件创建配置管理器
    pub fn new(config_path: &str) -> Result<Self> {
        let config = Self::load_config(config_path)?;
        let validator = ConfigValidator::new();
        validator.validate(&config)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path: Some(config_path.to_string()),
            validator,
        })
    }

    /// 使用已有配置创建，不关联文件
    pub fn from_config(config: HqmsConfig) -> Result<Self> {
        let validator = ConfigValidator::new();
        validator.validate(&config)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path: None,
            validator,
        })
    }

    /// 从文件和环境变量加载配置，环境变量如 `HQMS__SERVER__PORT=9000`
    fn load_config(config_path: &str) -> Result<HqmsConfig> {
        let settings = Config::builder()
            .add_source(File::with_name(config_path))
            .add_source(
                Environment::with_prefix("HQMS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context(format!("Failed to load configuration from {}", config_path))?;

        let config: HqmsConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        info!("Configuration loaded successfully from: {}", config_path);
        Ok(config)
    }

    /// 获取配置
    pub async fn get_config(&self) -> HqmsConfig {
        let config = self.config.read().await;
        config.clone()
    }

    /// 更新配置
    pub async fn update_config(&self, new_config: HqmsConfig) -> Result<()> {
        // 验证新配置
        self.validator.validate(&new_config)?;

        {
            let mut config = self.config.write().await;
            *config = new_config;
        }

        self.save_config().await?;

        info!("Configuration updated successfully");
        Ok(())
    }

    /// 保存配置到文件
    async fn save_config(&self) -> Result<()> {
        let Some(path) = &self.config_path else {
            return Ok(());
        };

        let config_str = {
            let config = self.config.read().await;
            toml::to_string_pretty(&*config).context("Failed to serialize configuration")?
        };

        tokio::fs::write(path, config_str)
            .await
            .context("Failed to write configuration file")?;

        info!("Configuration saved to: {}", path);
        Ok(())
    }

    /// 重新加载配置
    pub async fn reload_config(&self) -> Result<()> {
        let Some(path) = self.config_path.clone() else {
            return Err(anyhow::anyhow!("No configuration file to reload"));
        };

        let new_config = Self::load_config(&path)?;
        self.validator.validate(&new_config)?;

        let mut config = self.config.write().await;
        *config = new_config;

        info!("Configuration reloaded from: {}", path);
        Ok(())
    }

    /// 验证当前配置
    pub async fn validate_config(&self) -> Result<()> {
        let config = self.config.read().await;
        self.validator.validate(&config)
    }
}

/// 配置验证规则
pub struct ValidationRule {
    /// 字段路径
    pub field_path: String,
    /// 验证函数
    pub validator: fn(&HqmsConfig) -> Result<()>,
    /// 错误消息
    pub error_message: String,
}

/// 配置验证器
pub struct ConfigValidator {
    validation_rules: Vec<ValidationRule>,
}

impl std::fmt::Debug for ConfigValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.validation_rules.iter().map(|rule| &rule.field_path))
            .finish()
    }
}

impl ConfigValidator {
    /// 创建新的配置验证器
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "server.port".to_string(),
                validator: |config| {
                    if config.server.port == 0 {
                        Err(anyhow::anyhow!("Server port cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid server port".to_string(),
            },
            ValidationRule {
                field_path: "queue.default_consultation_minutes".to_string(),
                validator: |config| {
                    if config.queue.default_consultation_minutes == 0 {
                        Err(anyhow::anyhow!("Default consultation minutes must be positive"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid consultation duration".to_string(),
            },
            ValidationRule {
                field_path: "logging.level".to_string(),
                validator: |config| crate::logging::parse_filter(&config.logging.level).map(|_| ()),
                error_message: "Invalid log level".to_string(),
            },
            ValidationRule {
                field_path: "directory".to_string(),
                validator: validate_directory,
                error_message: "Invalid doctor directory".to_string(),
            },
        ];

        Self { validation_rules }
    }

    /// 验证配置
    pub fn validate(&self, config: &HqmsConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(anyhow::anyhow!("{}: {}", rule.error_message, e));
            }
        }

        info!("Configuration validation passed");
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_directory(config: &HqmsConfig) -> Result<()> {
    let directory = &config.directory;

    let mut department_ids = HashSet::new();
    for department in &directory.departments {
        if !department_ids.insert(department.id) {
            return Err(anyhow::anyhow!("Duplicate department id {}", department.id));
        }
    }

    let mut doctor_ids = HashSet::new();
    for doctor in &directory.doctors {
        if !doctor_ids.insert(doctor.id) {
            return Err(anyhow::anyhow!("Duplicate doctor id {}", doctor.id));
        }
        if !department_ids.contains(&doctor.department_id) {
            return Err(anyhow::anyhow!(
                "Doctor {} references unknown department {}",
                doctor.id,
                doctor.department_id
            ));
        }
        if doctor.average_consultation_minutes == Some(0) {
            return Err(anyhow::anyhow!("Doctor {} has zero consultation minutes", doctor.id));
        }
    }

    Ok(())
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "HQMS".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_permissive: true,
        }
    }
}
