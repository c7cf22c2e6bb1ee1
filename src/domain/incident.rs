// ==========================================
// 医疗设备维护管理系统 - 应急事件领域模型
// ==========================================
// 不变式:
// - assigned_at ≥ reported_at
// - resolved_at ≥ assigned_at (两者都有值时)
// - 状态单向推进，已解决后不可回退(重新开启不在本系统范围内)
// ==========================================

use crate::domain::types::{Impact, IncidentStatus, Severity};
use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// Incident - 应急事件 (Contingencia)
// ==========================================
// computed_priority 为读取时派生值，不落库
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub incident_id: String,              // 事件ID
    pub equipment_id: String,             // 关联设备
    pub title: String,                    // 标题
    pub description: Option<String>,      // 描述
    pub severity: Severity,               // 严重度
    pub impact: Impact,                   // 影响度
    pub category: Option<String>,         // 分类
    pub status: IncidentStatus,           // 状态
    pub reported_by: String,              // 上报人
    pub assigned_to: Option<String>,      // 指派技师
    pub reported_at: NaiveDateTime,       // 上报时间
    pub assigned_at: Option<NaiveDateTime>,  // 指派时间
    pub resolved_at: Option<NaiveDateTime>,  // 解决时间
    pub closed_at: Option<NaiveDateTime>,    // 关闭时间
    pub solution_text: Option<String>,    // 解决方案说明
    pub actual_cost: Option<f64>,         // 实际费用
    pub requires_follow_up: bool,         // 是否需要跟进
    pub equipment_out_of_service: bool,   // 本事件是否已将设备停用
    pub created_at: NaiveDateTime,        // 创建时间
    pub updated_at: NaiveDateTime,        // 更新时间
    pub revision: i32,                    // 乐观锁修订号
}

impl Incident {
    /// 创建一条新上报的事件
    #[allow(clippy::too_many_arguments)]
    pub fn new_reported(
        equipment_id: &str,
        title: &str,
        description: Option<&str>,
        severity: Severity,
        impact: Impact,
        category: Option<&str>,
        reported_by: &str,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            incident_id: Uuid::new_v4().to_string(),
            equipment_id: equipment_id.to_string(),
            title: title.to_string(),
            description: description.map(|d| d.to_string()),
            severity,
            impact,
            category: category.map(|c| c.to_string()),
            status: IncidentStatus::Active,
            reported_by: reported_by.to_string(),
            assigned_to: None,
            reported_at: now,
            assigned_at: None,
            resolved_at: None,
            closed_at: None,
            solution_text: None,
            actual_cost: None,
            requires_follow_up: false,
            equipment_out_of_service: false,
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    // ==========================================
    // 状态转换守卫
    // ==========================================

    /// ACTIVE → ASSIGNED 是否允许
    pub fn can_assign(&self) -> bool {
        self.status == IncidentStatus::Active
    }

    /// ASSIGNED → IN_PROGRESS 是否允许
    pub fn can_start(&self) -> bool {
        self.status == IncidentStatus::Assigned
    }

    /// ASSIGNED/IN_PROGRESS → RESOLVED 是否允许
    pub fn can_resolve(&self) -> bool {
        matches!(
            self.status,
            IncidentStatus::Assigned | IncidentStatus::InProgress
        )
    }

    /// RESOLVED → CLOSED 是否允许
    pub fn can_close(&self) -> bool {
        self.status == IncidentStatus::Resolved
    }

    // ==========================================
    // 状态转换（调用方必须先通过对应守卫）
    // ==========================================

    /// 指派技师，记录 assigned_at
    ///
    /// assigned_at 不早于 reported_at（时钟回拨时夹取）
    pub fn assign(&mut self, technician_id: &str, now: NaiveDateTime) {
        let at = now.max(self.reported_at);
        self.assigned_to = Some(technician_id.to_string());
        self.assigned_at = Some(at);
        self.status = IncidentStatus::Assigned;
        self.updated_at = now;
    }

    /// 技师开始处理（外部触发，仅记录状态与时间）
    pub fn start_work(&mut self, now: NaiveDateTime) {
        self.status = IncidentStatus::InProgress;
        self.updated_at = now;
    }

    /// 解决事件，记录方案与 resolved_at
    pub fn resolve(
        &mut self,
        solution_text: &str,
        actual_cost: Option<f64>,
        requires_follow_up: bool,
        now: NaiveDateTime,
    ) {
        let floor = self.assigned_at.unwrap_or(self.reported_at);
        self.resolved_at = Some(now.max(floor));
        self.solution_text = Some(solution_text.to_string());
        self.actual_cost = actual_cost;
        self.requires_follow_up = requires_follow_up;
        self.status = IncidentStatus::Resolved;
        self.updated_at = now;
    }

    /// 行政关闭，记录 closed_at
    pub fn close(&mut self, now: NaiveDateTime) {
        let floor = self.resolved_at.unwrap_or(self.reported_at);
        self.closed_at = Some(now.max(floor));
        self.status = IncidentStatus::Closed;
        self.updated_at = now;
    }

    // ==========================================
    // 派生量
    // ==========================================

    /// 自上报以来的完整小时数（now 早于 reported_at 时为 0）
    pub fn age_hours(&self, now: NaiveDateTime) -> i64 {
        (now - self.reported_at).max(TimeDelta::zero()).num_hours()
    }

    /// 解决耗时（分钟）；未解决时为 None
    pub fn resolution_minutes(&self) -> Option<i64> {
        self.resolved_at.map(|r| (r - self.reported_at).num_minutes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    fn sample(now: NaiveDateTime) -> Incident {
        Incident::new_reported(
            "EQ-001",
            "监护仪黑屏",
            Some("床旁监护仪无显示"),
            Severity::High,
            Impact::High,
            Some("ELECTRICAL"),
            "user-1",
            now,
        )
    }

    #[test]
    fn test_lifecycle_timestamps_monotonic() {
        let mut incident = sample(dt(1, 8));
        assert!(incident.can_assign());

        incident.assign("T-01", dt(1, 9));
        assert_eq!(incident.status, IncidentStatus::Assigned);
        assert!(incident.assigned_at.unwrap() >= incident.reported_at);

        assert!(incident.can_start());
        incident.start_work(dt(1, 10));

        assert!(incident.can_resolve());
        incident.resolve("更换主板", Some(1200.0), false, dt(2, 8));
        assert!(incident.resolved_at.unwrap() >= incident.assigned_at.unwrap());

        assert!(incident.can_close());
        incident.close(dt(2, 9));
        assert_eq!(incident.status, IncidentStatus::Closed);
        assert!(incident.closed_at.unwrap() >= incident.resolved_at.unwrap());
    }

    #[test]
    fn test_guards_reject_regression() {
        let mut incident = sample(dt(1, 8));
        incident.assign("T-01", dt(1, 9));
        incident.resolve("已修复", None, false, dt(1, 12));

        // 已解决后不可再指派/解决
        assert!(!incident.can_assign());
        assert!(!incident.can_resolve());
        assert!(!incident.can_start());
        assert!(incident.can_close());
    }

    #[test]
    fn test_assign_clamps_clock_skew() {
        let mut incident = sample(dt(1, 8));
        // 指派时钟早于上报时间，assigned_at 被夹到 reported_at
        incident.assign("T-01", dt(1, 7));
        assert_eq!(incident.assigned_at.unwrap(), incident.reported_at);
    }

    #[test]
    fn test_age_hours() {
        let incident = sample(dt(1, 8));
        assert_eq!(incident.age_hours(dt(1, 8)), 0);
        assert_eq!(incident.age_hours(dt(1, 17)), 9);
        assert_eq!(incident.age_hours(dt(2, 9)), 25);
        // now 早于上报时间不产生负年龄
        assert_eq!(incident.age_hours(dt(1, 7)), 0);
    }
}
