// ==========================================
// 医疗设备维护管理系统 - 领域类型定义
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 维护任务类型 (Task Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    Preventive,   // 预防性维护
    Corrective,   // 故障维修
    Calibration,  // 校准
    Verification, // 检定验证
}

impl TaskKind {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            TaskKind::Preventive => "PREVENTIVE",
            TaskKind::Corrective => "CORRECTIVE",
            TaskKind::Calibration => "CALIBRATION",
            TaskKind::Verification => "VERIFICATION",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "PREVENTIVE" => Some(TaskKind::Preventive),
            "CORRECTIVE" => Some(TaskKind::Corrective),
            "CALIBRATION" => Some(TaskKind::Calibration),
            "VERIFICATION" => Some(TaskKind::Verification),
            _ => None,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 维护任务状态 (Task Status)
// ==========================================
// 终态(COMPLETED/CANCELLED)不可再变更
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Scheduled,  // 已排程
    InProgress, // 执行中
    Completed,  // 已完成
    Cancelled,  // 已取消
}

impl TaskStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            TaskStatus::Scheduled => "SCHEDULED",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "SCHEDULED" => Some(TaskStatus::Scheduled),
            "IN_PROGRESS" => Some(TaskStatus::InProgress),
            "COMPLETED" => Some(TaskStatus::Completed),
            "CANCELLED" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 任务优先级 (Task Priority)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "LOW",
            TaskPriority::Medium => "MEDIUM",
            TaskPriority::High => "HIGH",
            TaskPriority::Critical => "CRITICAL",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "LOW" => Some(TaskPriority::Low),
            "MEDIUM" => Some(TaskPriority::Medium),
            "HIGH" => Some(TaskPriority::High),
            "CRITICAL" => Some(TaskPriority::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 维护频率代码 (Frequency Code)
// ==========================================
// 固定集合: 月/双月/季/半年/年
// 解析失败的处理（回退到季度）由频率引擎负责
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrequencyCode {
    Monthly,    // 每月
    Bimonthly,  // 每两月
    Quarterly,  // 每季度
    Semiannual, // 每半年
    Annual,     // 每年
}

impl FrequencyCode {
    /// 对应的日历月数
    pub fn months(&self) -> u32 {
        match self {
            FrequencyCode::Monthly => 1,
            FrequencyCode::Bimonthly => 2,
            FrequencyCode::Quarterly => 3,
            FrequencyCode::Semiannual => 6,
            FrequencyCode::Annual => 12,
        }
    }

    /// 严格解析（大小写不敏感）
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "MONTHLY" => Some(FrequencyCode::Monthly),
            "BIMONTHLY" => Some(FrequencyCode::Bimonthly),
            "QUARTERLY" => Some(FrequencyCode::Quarterly),
            "SEMIANNUAL" => Some(FrequencyCode::Semiannual),
            "ANNUAL" | "YEARLY" => Some(FrequencyCode::Annual),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            FrequencyCode::Monthly => "MONTHLY",
            FrequencyCode::Bimonthly => "BIMONTHLY",
            FrequencyCode::Quarterly => "QUARTERLY",
            FrequencyCode::Semiannual => "SEMIANNUAL",
            FrequencyCode::Annual => "ANNUAL",
        }
    }
}

impl fmt::Display for FrequencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 事件严重度 (Severity)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "LOW" => Some(Severity::Low),
            "MEDIUM" => Some(Severity::Medium),
            "HIGH" => Some(Severity::High),
            "CRITICAL" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 事件影响度 (Impact)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Impact {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Impact {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            Impact::None => "NONE",
            Impact::Low => "LOW",
            Impact::Medium => "MEDIUM",
            Impact::High => "HIGH",
            Impact::Critical => "CRITICAL",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "NONE" => Some(Impact::None),
            "LOW" => Some(Impact::Low),
            "MEDIUM" => Some(Impact::Medium),
            "HIGH" => Some(Impact::High),
            "CRITICAL" => Some(Impact::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 应急事件状态 (Incident Status)
// ==========================================
// 状态单向推进: ACTIVE → ASSIGNED → IN_PROGRESS → RESOLVED → CLOSED
// 应急事件没有取消路径（与维护任务的有意不对称）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentStatus {
    Active,     // 已上报待处理
    Assigned,   // 已指派
    InProgress, // 处理中
    Resolved,   // 已解决
    Closed,     // 已关闭
}

impl IncidentStatus {
    /// 是否为终态（CLOSED 之后不再有任何转换）
    pub fn is_closed(&self) -> bool {
        matches!(self, IncidentStatus::Closed)
    }

    /// 是否已解决（含已关闭）
    pub fn is_resolved(&self) -> bool {
        matches!(self, IncidentStatus::Resolved | IncidentStatus::Closed)
    }

    /// 是否仍在处理链路上
    pub fn is_open(&self) -> bool {
        !self.is_resolved()
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            IncidentStatus::Active => "ACTIVE",
            IncidentStatus::Assigned => "ASSIGNED",
            IncidentStatus::InProgress => "IN_PROGRESS",
            IncidentStatus::Resolved => "RESOLVED",
            IncidentStatus::Closed => "CLOSED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(IncidentStatus::Active),
            "ASSIGNED" => Some(IncidentStatus::Assigned),
            "IN_PROGRESS" => Some(IncidentStatus::InProgress),
            "RESOLVED" => Some(IncidentStatus::Resolved),
            "CLOSED" => Some(IncidentStatus::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 设备运行状态 (Equipment Status)
// ==========================================
// 归外部设备服务所有；引擎仅在事件升级/恢复时回写
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EquipmentStatus {
    Operative,    // 在用
    OutOfService, // 停用
    Retired,      // 报废
}

impl EquipmentStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            EquipmentStatus::Operative => "OPERATIVE",
            EquipmentStatus::OutOfService => "OUT_OF_SERVICE",
            EquipmentStatus::Retired => "RETIRED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "OPERATIVE" => Some(EquipmentStatus::Operative),
            "OUT_OF_SERVICE" => Some(EquipmentStatus::OutOfService),
            "RETIRED" => Some(EquipmentStatus::Retired),
            _ => None,
        }
    }
}

impl fmt::Display for EquipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 审计事件风险级别 (Audit Risk Level)
// ==========================================
// 外部审计日志服务的输入字段，仅三级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditRiskLevel {
    Low,
    Medium,
    High,
}

impl AuditRiskLevel {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            AuditRiskLevel::Low => "LOW",
            AuditRiskLevel::Medium => "MEDIUM",
            AuditRiskLevel::High => "HIGH",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "LOW" => Some(AuditRiskLevel::Low),
            "MEDIUM" => Some(AuditRiskLevel::Medium),
            "HIGH" => Some(AuditRiskLevel::High),
            _ => None,
        }
    }
}

// ==========================================
// 系统风险等级 (Risk Level)
// ==========================================
// 风险评分引擎输出的聚合等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_terminal() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Scheduled.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_frequency_code_parse() {
        assert_eq!(FrequencyCode::parse("monthly"), Some(FrequencyCode::Monthly));
        assert_eq!(FrequencyCode::parse(" QUARTERLY "), Some(FrequencyCode::Quarterly));
        assert_eq!(FrequencyCode::parse("yearly"), Some(FrequencyCode::Annual));
        assert_eq!(FrequencyCode::parse("weekly"), None);
    }

    #[test]
    fn test_frequency_code_months() {
        assert_eq!(FrequencyCode::Monthly.months(), 1);
        assert_eq!(FrequencyCode::Bimonthly.months(), 2);
        assert_eq!(FrequencyCode::Quarterly.months(), 3);
        assert_eq!(FrequencyCode::Semiannual.months(), 6);
        assert_eq!(FrequencyCode::Annual.months(), 12);
    }

    #[test]
    fn test_incident_status_roundtrip() {
        for status in [
            IncidentStatus::Active,
            IncidentStatus::Assigned,
            IncidentStatus::InProgress,
            IncidentStatus::Resolved,
            IncidentStatus::Closed,
        ] {
            assert_eq!(IncidentStatus::from_db_str(status.to_db_str()), Some(status));
        }
    }
}
