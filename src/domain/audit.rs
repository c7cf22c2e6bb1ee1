// ==========================================
// 医疗设备维护管理系统 - 审计事件模型
// ==========================================
// 归外部审计日志服务所有，引擎只读。
// 风险评分引擎在时间窗内聚合这些事件。
// ==========================================

use crate::domain::types::AuditRiskLevel;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// AuditEvent - 审计事件
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,            // 事件ID
    pub event_ts: NaiveDateTime,     // 发生时间
    pub actor_id: String,            // 操作者
    pub action: String,              // 动作描述
    pub risk_level: AuditRiskLevel,  // 风险级别
    pub ip_address: Option<String>,  // 来源IP
}
