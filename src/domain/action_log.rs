// ==========================================
// 医疗设备维护管理系统 - 操作日志领域模型
// ==========================================
// 红线: 所有写入必须记录
// 用途: 审计追踪,影响分析
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,               // 日志ID
    pub action_type: ActionType,         // 操作类型
    pub entity_id: Option<String>,       // 关联实体(任务/事件)ID
    pub equipment_id: Option<String>,    // 关联设备ID
    pub actor: String,                   // 操作人
    pub action_ts: NaiveDateTime,        // 操作时间戳
    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub detail: Option<String>,          // 详细描述
}

impl ActionLog {
    /// 构造一条操作日志
    pub fn record(
        action_type: ActionType,
        entity_id: Option<&str>,
        equipment_id: Option<&str>,
        actor: &str,
        action_ts: NaiveDateTime,
        payload_json: Option<JsonValue>,
    ) -> Self {
        Self {
            action_id: Uuid::new_v4().to_string(),
            action_type,
            entity_id: entity_id.map(|s| s.to_string()),
            equipment_id: equipment_id.map(|s| s.to_string()),
            actor: actor.to_string(),
            action_ts,
            payload_json,
            detail: None,
        }
    }
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    ScheduleTask,    // 排程维护任务
    CompleteTask,    // 完成维护任务
    CancelTask,      // 取消维护任务
    PlanBulk,        // 批量排程
    ReportIncident,  // 上报应急事件
    AssignIncident,  // 指派应急事件
    EscalateIncident, // 升级应急事件(设备停用)
    StartIncident,   // 开始处理事件
    ResolveIncident, // 解决应急事件
    CloseIncident,   // 关闭应急事件
}

impl ActionType {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ActionType::ScheduleTask => "SCHEDULE_TASK",
            ActionType::CompleteTask => "COMPLETE_TASK",
            ActionType::CancelTask => "CANCEL_TASK",
            ActionType::PlanBulk => "PLAN_BULK",
            ActionType::ReportIncident => "REPORT_INCIDENT",
            ActionType::AssignIncident => "ASSIGN_INCIDENT",
            ActionType::EscalateIncident => "ESCALATE_INCIDENT",
            ActionType::StartIncident => "START_INCIDENT",
            ActionType::ResolveIncident => "RESOLVE_INCIDENT",
            ActionType::CloseIncident => "CLOSE_INCIDENT",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "SCHEDULE_TASK" => Some(ActionType::ScheduleTask),
            "COMPLETE_TASK" => Some(ActionType::CompleteTask),
            "CANCEL_TASK" => Some(ActionType::CancelTask),
            "PLAN_BULK" => Some(ActionType::PlanBulk),
            "REPORT_INCIDENT" => Some(ActionType::ReportIncident),
            "ASSIGN_INCIDENT" => Some(ActionType::AssignIncident),
            "ESCALATE_INCIDENT" => Some(ActionType::EscalateIncident),
            "START_INCIDENT" => Some(ActionType::StartIncident),
            "RESOLVE_INCIDENT" => Some(ActionType::ResolveIncident),
            "CLOSE_INCIDENT" => Some(ActionType::CloseIncident),
            _ => None,
        }
    }
}
