// ==========================================
// 医疗设备维护管理系统 - 维护任务领域模型
// ==========================================
// 不变式:
// - completed_date 当且仅当 status=COMPLETED 时有值
// - 终态任务不可再转换
// - scheduled_date 在离开 SCHEDULED 后不可变更
// ==========================================

use crate::domain::types::{TaskKind, TaskPriority, TaskStatus};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// MaintenanceTask - 维护任务
// ==========================================
// 已完成任务软保留，永不物理删除
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceTask {
    pub task_id: String,                        // 任务ID
    pub equipment_id: String,                   // 关联设备
    pub kind: TaskKind,                         // 任务类型
    pub status: TaskStatus,                     // 任务状态
    pub priority: TaskPriority,                 // 优先级
    pub scheduled_date: NaiveDate,              // 计划日期
    pub completed_date: Option<NaiveDate>,      // 完成日期
    pub cancel_reason: Option<String>,          // 取消原因
    pub assigned_technician_id: Option<String>, // 指派技师
    pub actual_cost: Option<f64>,               // 实际费用
    pub actual_duration_minutes: Option<i64>,   // 实际耗时(分钟)
    pub notes: Option<String>,                  // 备注
    pub chained_from_task_id: Option<String>,   // 前序任务(递推链来源)
    pub created_at: NaiveDateTime,              // 创建时间
    pub updated_at: NaiveDateTime,              // 更新时间
    pub revision: i32,                          // 乐观锁修订号
}

impl MaintenanceTask {
    /// 创建一条新的已排程任务
    pub fn new_scheduled(
        equipment_id: &str,
        kind: TaskKind,
        scheduled_date: NaiveDate,
        priority: TaskPriority,
        technician_id: Option<&str>,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            task_id: Uuid::new_v4().to_string(),
            equipment_id: equipment_id.to_string(),
            kind,
            status: TaskStatus::Scheduled,
            priority,
            scheduled_date,
            completed_date: None,
            cancel_reason: None,
            assigned_technician_id: technician_id.map(|t| t.to_string()),
            actual_cost: None,
            actual_duration_minutes: None,
            notes: None,
            chained_from_task_id: None,
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    /// 由递推链生成的后继任务
    pub fn chained_successor(
        predecessor: &MaintenanceTask,
        scheduled_date: NaiveDate,
        now: NaiveDateTime,
    ) -> Self {
        let mut task = Self::new_scheduled(
            &predecessor.equipment_id,
            predecessor.kind,
            scheduled_date,
            predecessor.priority,
            None,
            now,
        );
        task.chained_from_task_id = Some(predecessor.task_id.clone());
        task
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// scheduled_date 是否仍可修改
    pub fn schedule_mutable(&self) -> bool {
        self.status == TaskStatus::Scheduled
    }
}
