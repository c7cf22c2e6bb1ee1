// ==========================================
// 医疗设备维护管理系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、状态转换守卫
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod audit;
pub mod equipment;
pub mod incident;
pub mod maintenance;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use audit::AuditEvent;
pub use equipment::{EquipmentRecord, Technician};
pub use incident::Incident;
pub use maintenance::MaintenanceTask;
pub use types::{
    AuditRiskLevel, EquipmentStatus, FrequencyCode, Impact, IncidentStatus, RiskLevel, Severity,
    TaskKind, TaskPriority, TaskStatus,
};
