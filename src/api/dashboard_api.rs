// ==========================================
// 医疗设备维护管理系统 - 驾驶舱 API
// ==========================================
// 职责: 只读聚合——维护排程概览、事件统计、
//       系统风险评估
// 按需/周期调用，不产生任何写入
// ==========================================

use std::sync::Arc;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::api::error::ApiResult;
use crate::config::ConfigManager;
use crate::engine::detector::ScheduleClassifier;
use crate::engine::risk::{RiskAssessment, RiskEngine};
use crate::external::{with_timeout, AuditLog, Clock};
use crate::repository::{IncidentRepository, MaintenanceTaskRepository};

// ==========================================
// 响应 DTO
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceOverview {
    pub total_active: usize,       // 非终态任务总数
    pub overdue_count: usize,      // 逾期
    pub due_soon_count: usize,     // 临期
    pub on_track_count: usize,     // 正常
    pub alert_window_days: u32,    // 使用的预警窗口
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentStats {
    pub counts_by_status: HashMap<String, i64>, // 按状态计数
    pub open_count: i64,                        // 未解决事件数
    pub avg_resolution_minutes: Option<f64>,    // 平均解决耗时
}

// ==========================================
// DashboardApi - 驾驶舱 API
// ==========================================
pub struct DashboardApi {
    task_repo: Arc<MaintenanceTaskRepository>,
    incident_repo: Arc<IncidentRepository>,
    audit_log: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
    config: Arc<ConfigManager>,
    classifier: ScheduleClassifier,
    risk_engine: RiskEngine,
}

impl DashboardApi {
    /// 创建新的DashboardApi实例
    pub fn new(
        task_repo: Arc<MaintenanceTaskRepository>,
        incident_repo: Arc<IncidentRepository>,
        audit_log: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            task_repo,
            incident_repo,
            audit_log,
            clock,
            config,
            classifier: ScheduleClassifier::new(),
            risk_engine: RiskEngine::new(),
        }
    }

    /// 维护排程概览
    pub fn maintenance_overview(&self) -> ApiResult<MaintenanceOverview> {
        let tasks = self.task_repo.list_non_terminal()?;
        let alert_window_days = self.config.alert_window_days();
        let classification =
            self.classifier
                .classify(tasks, self.clock.today(), alert_window_days);

        Ok(MaintenanceOverview {
            total_active: classification.total(),
            overdue_count: classification.overdue.len(),
            due_soon_count: classification.due_soon.len(),
            on_track_count: classification.on_track.len(),
            alert_window_days,
        })
    }

    /// 应急事件统计
    pub fn incident_stats(&self) -> ApiResult<IncidentStats> {
        let counts = self.incident_repo.count_by_status()?;
        let avg_resolution_minutes = self.incident_repo.avg_resolution_minutes()?;

        let mut counts_by_status = HashMap::new();
        let mut open_count = 0i64;
        for (status, count) in counts {
            if status.is_open() {
                open_count += count;
            }
            counts_by_status.insert(status.to_db_str().to_string(), count);
        }

        Ok(IncidentStats {
            counts_by_status,
            open_count,
            avg_resolution_minutes,
        })
    }

    /// 系统风险评估
    ///
    /// 从外部审计日志取时间窗内事件，交给风险评分引擎
    pub async fn risk_assessment(&self) -> ApiResult<RiskAssessment> {
        let now = self.clock.now();
        let window = TimeDelta::days(self.config.risk_window_days());

        let events = with_timeout(
            "audit_log",
            self.config.upstream_timeout_ms(),
            self.audit_log.query_window(now - window, now),
        )
        .await?;

        Ok(self.risk_engine.assess(&events, now, window))
    }
}
