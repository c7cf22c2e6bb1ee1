// ==========================================
// 应急事件全流程测试
// ==========================================
// 覆盖: 上报/升级事务性 / 自动指派 / 状态机推进 /
//       设备恢复 / 宽限期升级扫描 / 优先级排序
// ==========================================


use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta};
use med_cmms::api::error::ApiError;
use med_cmms::api::{ReportIncidentRequest, ResolveIncidentRequest};
use med_cmms::domain::types::{EquipmentStatus, Impact, IncidentStatus, Severity};
use med_cmms::external::{EquipmentStore, FixedClock, SqliteEquipmentStore, UpstreamError};

use test_helpers::*;

fn report_req(equipment_id: &str, severity: Severity, impact: Impact) -> ReportIncidentRequest {
    ReportIncidentRequest {
        equipment_id: equipment_id.to_string(),
        title: "监护仪黑屏".to_string(),
        description: Some("床旁监护仪无显示".to_string()),
        severity,
        impact,
        category: Some("ELECTRICAL".to_string()),
        reported_by: "user-1".to_string(),
    }
}

fn resolve_req() -> ResolveIncidentRequest {
    ResolveIncidentRequest {
        solution_text: "更换电源模块".to_string(),
        actual_cost: Some(800.0),
        requires_follow_up: false,
    }
}

// ==========================================
// 上报与升级
// ==========================================

#[tokio::test]
async fn test_critical_report_escalates_equipment() {
    let env = setup_env();
    insert_equipment(&env, "EQ-001", Some("MONTHLY"), None);

    let response = env
        .incident_api
        .report(report_req("EQ-001", Severity::Critical, Impact::High), "user-1")
        .await
        .unwrap();

    assert!(response.escalated);
    assert!(response.incident.equipment_out_of_service);
    // 40(严重度) + 30(影响度) + 0(刚上报)
    assert_eq!(response.computed_priority, 70);
    assert_eq!(equipment_status(&env, "EQ-001"), EquipmentStatus::OutOfService);
}

#[tokio::test]
async fn test_low_severity_report_does_not_escalate() {
    let env = setup_env();
    insert_equipment(&env, "EQ-001", Some("MONTHLY"), None);

    let response = env
        .incident_api
        .report(report_req("EQ-001", Severity::Low, Impact::Low), "user-1")
        .await
        .unwrap();

    assert!(!response.escalated);
    assert_eq!(equipment_status(&env, "EQ-001"), EquipmentStatus::Operative);
    assert_eq!(response.computed_priority, 20);
}

#[tokio::test]
async fn test_report_unknown_equipment() {
    let env = setup_env();

    let result = env
        .incident_api
        .report(report_req("EQ-404", Severity::Low, Impact::Low), "user-1")
        .await;

    assert!(matches!(result, Err(ApiError::UnknownEquipment { .. })));
}

// ==========================================
// 升级事务性: 设备写失败 → 事件不创建
// ==========================================

struct FailingEquipmentStore {
    inner: Arc<SqliteEquipmentStore>,
    fail_update_status: AtomicBool,
}

#[async_trait]
impl EquipmentStore for FailingEquipmentStore {
    async fn get(
        &self,
        equipment_id: &str,
    ) -> Result<Option<med_cmms::EquipmentRecord>, UpstreamError> {
        self.inner.get(equipment_id).await
    }

    async fn update_maintenance_dates(
        &self,
        equipment_id: &str,
        last: Option<NaiveDate>,
        next: Option<NaiveDate>,
    ) -> Result<(), UpstreamError> {
        self.inner
            .update_maintenance_dates(equipment_id, last, next)
            .await
    }

    async fn update_status(
        &self,
        equipment_id: &str,
        status: EquipmentStatus,
    ) -> Result<(), UpstreamError> {
        if self.fail_update_status.load(Ordering::SeqCst) {
            return Err(UpstreamError::unavailable("equipment", "注入故障"));
        }
        self.inner.update_status(equipment_id, status).await
    }
}

#[tokio::test]
async fn test_escalation_failure_prevents_incident_creation() {
    let (temp_file, conn) = create_test_db();
    let clock = Arc::new(FixedClock::new(default_now()));
    let failing = Arc::new(FailingEquipmentStore {
        inner: Arc::new(SqliteEquipmentStore::new(conn.clone())),
        fail_update_status: AtomicBool::new(false),
    });
    let env = setup_env_with(temp_file, conn, clock, Some(failing.clone()));

    insert_equipment(&env, "EQ-001", Some("MONTHLY"), None);

    failing.fail_update_status.store(true, Ordering::SeqCst);
    let result = env
        .incident_api
        .report(report_req("EQ-001", Severity::Critical, Impact::High), "user-1")
        .await;

    assert!(matches!(result, Err(ApiError::UpstreamUnavailable { .. })));
    // 设备写入失败 → 事件未创建
    assert!(env.incident_repo.list_by_equipment("EQ-001").unwrap().is_empty());
}

// ==========================================
// 自动指派
// ==========================================

#[tokio::test]
async fn test_report_auto_assigns_first_available_technician() {
    let env = setup_env();
    insert_equipment(&env, "EQ-001", Some("MONTHLY"), None);
    insert_technician(&env, "T-01", "TECHNICIAN", true);
    insert_technician(&env, "T-02", "TECHNICIAN", true);

    let response = env
        .incident_api
        .report(report_req("EQ-001", Severity::Medium, Impact::Medium), "user-1")
        .await
        .unwrap();

    assert!(response.auto_assigned);
    assert_eq!(response.incident.status, IncidentStatus::Assigned);
    assert_eq!(response.incident.assigned_to.as_deref(), Some("T-01"));
    assert!(response.incident.assigned_at.unwrap() >= response.incident.reported_at);
}

#[tokio::test]
async fn test_report_without_candidates_stays_active() {
    let env = setup_env();
    insert_equipment(&env, "EQ-001", Some("MONTHLY"), None);

    let response = env
        .incident_api
        .report(report_req("EQ-001", Severity::Medium, Impact::Medium), "user-1")
        .await
        .unwrap();

    assert!(!response.auto_assigned);
    assert_eq!(response.incident.status, IncidentStatus::Active);
}

// ==========================================
// 状态机推进
// ==========================================

#[tokio::test]
async fn test_full_lifecycle_assign_start_resolve_close() {
    let env = setup_env();
    env.config.set_config_value("auto_assign_enabled", "0").unwrap();
    insert_equipment(&env, "EQ-001", Some("MONTHLY"), None);
    insert_technician(&env, "T-01", "TECHNICIAN", true);

    let response = env
        .incident_api
        .report(report_req("EQ-001", Severity::Medium, Impact::Low), "user-1")
        .await
        .unwrap();
    let incident_id = response.incident.incident_id.clone();

    // ACTIVE 状态不可关闭
    let result = env.incident_api.close(&incident_id, "admin");
    assert!(matches!(result, Err(ApiError::InvalidStateTransition { .. })));

    // 指派
    let assigned = env
        .incident_api
        .assign(&incident_id, Some("T-01"), "admin")
        .await
        .unwrap();
    assert_eq!(assigned.status, IncidentStatus::Assigned);

    // 重复指派被拒绝
    let result = env.incident_api.assign(&incident_id, Some("T-02"), "admin").await;
    assert!(matches!(result, Err(ApiError::InvalidStateTransition { .. })));

    // 开始处理
    let in_progress = env.incident_api.start_work(&incident_id, "T-01").unwrap();
    assert_eq!(in_progress.status, IncidentStatus::InProgress);

    // 解决
    let resolved = env
        .incident_api
        .resolve(&incident_id, resolve_req(), "T-01")
        .await
        .unwrap();
    assert_eq!(resolved.status, IncidentStatus::Resolved);
    assert!(resolved.resolved_at.unwrap() >= resolved.assigned_at.unwrap());

    // 重复解决 → AlreadyResolved
    let result = env.incident_api.resolve(&incident_id, resolve_req(), "T-01").await;
    assert!(matches!(result, Err(ApiError::AlreadyResolved { .. })));

    // 关闭
    let closed = env.incident_api.close(&incident_id, "admin").unwrap();
    assert_eq!(closed.status, IncidentStatus::Closed);
    assert!(closed.closed_at.unwrap() >= closed.resolved_at.unwrap());

    // 关闭后不可再动
    let result = env.incident_api.close(&incident_id, "admin");
    assert!(matches!(result, Err(ApiError::AlreadyResolved { .. })));
}

#[tokio::test]
async fn test_resolve_restores_escalated_equipment() {
    let env = setup_env();
    insert_equipment(&env, "EQ-001", Some("MONTHLY"), None);
    insert_technician(&env, "T-01", "TECHNICIAN", true);

    let response = env
        .incident_api
        .report(report_req("EQ-001", Severity::Critical, Impact::Critical), "user-1")
        .await
        .unwrap();
    assert_eq!(equipment_status(&env, "EQ-001"), EquipmentStatus::OutOfService);

    let incident_id = response.incident.incident_id.clone();
    let resolved = env
        .incident_api
        .resolve(&incident_id, resolve_req(), "T-01")
        .await
        .unwrap();

    assert_eq!(resolved.status, IncidentStatus::Resolved);
    assert!(!resolved.equipment_out_of_service);
    // 设备恢复在用
    assert_eq!(equipment_status(&env, "EQ-001"), EquipmentStatus::Operative);
}

// ==========================================
// 宽限期升级扫描
// ==========================================

#[tokio::test]
async fn test_grace_period_defers_escalation_to_sweep() {
    let env = setup_env();
    env.config.set_config_value("auto_assign_enabled", "0").unwrap();
    env.config.set_config_value("escalation_grace_minutes", "60").unwrap();
    insert_equipment(&env, "EQ-001", Some("MONTHLY"), None);

    let response = env
        .incident_api
        .report(report_req("EQ-001", Severity::High, Impact::High), "user-1")
        .await
        .unwrap();

    // 宽限期内不升级
    assert!(!response.escalated);
    assert_eq!(equipment_status(&env, "EQ-001"), EquipmentStatus::Operative);

    let sweep = env.incident_api.escalate_unassigned("scheduler").await.unwrap();
    assert!(sweep.escalated_incident_ids.is_empty());

    // 2小时后扫描 → 升级
    env.clock.set(default_now() + TimeDelta::hours(2));
    let sweep = env.incident_api.escalate_unassigned("scheduler").await.unwrap();
    assert_eq!(sweep.escalated_incident_ids, vec![response.incident.incident_id.clone()]);
    assert_eq!(equipment_status(&env, "EQ-001"), EquipmentStatus::OutOfService);

    // 再次扫描不重复升级
    let sweep = env.incident_api.escalate_unassigned("scheduler").await.unwrap();
    assert!(sweep.escalated_incident_ids.is_empty());
}

// ==========================================
// 评分与排序
// ==========================================

#[tokio::test]
async fn test_score_grows_with_age() {
    let env = setup_env();
    env.config.set_config_value("auto_assign_enabled", "0").unwrap();
    insert_equipment(&env, "EQ-001", Some("MONTHLY"), None);

    let response = env
        .incident_api
        .report(report_req("EQ-001", Severity::Medium, Impact::Medium), "user-1")
        .await
        .unwrap();
    let incident_id = response.incident.incident_id.clone();
    assert_eq!(response.computed_priority, 40);

    // 9小时后: +10
    env.clock.set(default_now() + TimeDelta::hours(9));
    assert_eq!(env.incident_api.score(&incident_id).unwrap().computed_priority, 50);

    // 25小时后: +20（只取高档）
    env.clock.set(default_now() + TimeDelta::hours(25));
    assert_eq!(env.incident_api.score(&incident_id).unwrap().computed_priority, 60);
}

#[tokio::test]
async fn test_open_incidents_sorted_by_priority() {
    let env = setup_env();
    env.config.set_config_value("auto_assign_enabled", "0").unwrap();
    insert_equipment(&env, "EQ-001", Some("MONTHLY"), None);
    insert_equipment(&env, "EQ-002", Some("MONTHLY"), None);

    env.incident_api
        .report(report_req("EQ-001", Severity::Low, Impact::Low), "user-1")
        .await
        .unwrap();
    let critical = env
        .incident_api
        .report(report_req("EQ-002", Severity::Critical, Impact::High), "user-1")
        .await
        .unwrap();

    let views = env.incident_api.list_open_by_priority().unwrap();
    assert_eq!(views.len(), 2);
    assert_eq!(views[0].incident.incident_id, critical.incident.incident_id);
    assert!(views[0].computed_priority >= views[1].computed_priority);
}
