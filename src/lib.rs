// ==========================================
// 医疗设备维护管理系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 维护排程与应急事件分诊引擎
// (CRUD/文件/通知/HTTP 表面由外部服务承担)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 外部协作方 - 设备/技师/审计/时钟接口与适配器
pub mod external;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/schema）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AuditRiskLevel, EquipmentStatus, FrequencyCode, Impact, IncidentStatus, RiskLevel, Severity,
    TaskKind, TaskPriority, TaskStatus,
};

// 领域实体
pub use domain::{
    ActionLog, ActionType, AuditEvent, EquipmentRecord, Incident, MaintenanceTask, Technician,
};

// 引擎
pub use engine::{
    AllocationStrategy, FirstAvailableAllocator, FrequencyResolver, RiskAssessment, RiskEngine,
    ScheduleClassification, ScheduleClassifier, TriageEngine,
};

// API
pub use api::{DashboardApi, IncidentApi, MaintenanceApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "医疗设备维护管理系统";
