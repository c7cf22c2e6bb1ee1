// ==========================================
// 医疗设备维护管理系统 - 应急事件 API
// ==========================================
// 职责: 事件上报/指派/处理/解决/关闭 + 优先级评分
// 升级语义: 高危事件上报时将设备停用，设备状态回写
// 与事件创建同生共死（先写设备，本地失败则补偿还原）
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::incident::Incident;
use crate::domain::types::{EquipmentStatus, Impact, Severity};
use crate::engine::allocation::AllocationStrategy;
use crate::engine::events::{EngineEvent, EngineEventPublisher, EngineEventType, OptionalEventPublisher};
use crate::engine::triage::TriageEngine;
use crate::external::{with_timeout, Clock, EquipmentStore, TechnicianDirectory};
use crate::repository::{ActionLogRepository, IncidentRepository};

// ==========================================
// 请求/响应 DTO
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportIncidentRequest {
    pub equipment_id: String,
    pub title: String,
    pub description: Option<String>,
    pub severity: Severity,
    pub impact: Impact,
    pub category: Option<String>,
    pub reported_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportIncidentResponse {
    pub incident: Incident,
    /// 上报时刻的派生优先级（读取时重新计算，不落库）
    pub computed_priority: i32,
    /// 是否触发了设备停用升级
    pub escalated: bool,
    /// 是否完成了自动指派
    pub auto_assigned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveIncidentRequest {
    pub solution_text: String,
    pub actual_cost: Option<f64>,
    pub requires_follow_up: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentView {
    pub incident: Incident,
    pub computed_priority: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationSweepResponse {
    pub escalated_incident_ids: Vec<String>,
}

// ==========================================
// IncidentApi - 应急事件 API
// ==========================================

/// 应急事件API
///
/// 职责：
/// 1. 事件上报（分诊评分 + 高危自动升级 + 可选自动指派）
/// 2. 状态机推进（指派/开始处理/解决/关闭）
/// 3. 宽限期升级扫描（周期调用）
/// 4. 优先级评分查询
pub struct IncidentApi {
    incident_repo: Arc<IncidentRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    equipment_store: Arc<dyn EquipmentStore>,
    technician_directory: Arc<dyn TechnicianDirectory>,
    clock: Arc<dyn Clock>,
    config: Arc<ConfigManager>,
    triage: TriageEngine,
    allocator: Arc<dyn AllocationStrategy>,
    event_publisher: OptionalEventPublisher,
}

impl IncidentApi {
    /// 创建新的IncidentApi实例
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        incident_repo: Arc<IncidentRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        equipment_store: Arc<dyn EquipmentStore>,
        technician_directory: Arc<dyn TechnicianDirectory>,
        clock: Arc<dyn Clock>,
        config: Arc<ConfigManager>,
        allocator: Arc<dyn AllocationStrategy>,
        event_publisher: Option<Arc<dyn EngineEventPublisher>>,
    ) -> Self {
        let event_publisher = match event_publisher {
            Some(p) => OptionalEventPublisher::with_publisher(p),
            None => OptionalEventPublisher::none(),
        };

        Self {
            incident_repo,
            action_log_repo,
            equipment_store,
            technician_directory,
            clock,
            config,
            triage: TriageEngine::new(),
            allocator,
            event_publisher,
        }
    }

    // ==========================================
    // 上报
    // ==========================================

    /// 上报应急事件
    ///
    /// 高危事件(HIGH/CRITICAL)且宽限期为0时立即升级:
    /// 设备停用写入在前，事件插入失败时补偿还原——
    /// 设备写入失败则事件不创建。
    #[instrument(skip(self, req), fields(equipment_id = %req.equipment_id))]
    pub async fn report(
        &self,
        req: ReportIncidentRequest,
        operator: &str,
    ) -> ApiResult<ReportIncidentResponse> {
        if req.equipment_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("设备ID不能为空".to_string()));
        }
        if req.title.trim().is_empty() {
            return Err(ApiError::InvalidInput("事件标题不能为空".to_string()));
        }

        let timeout_ms = self.config.upstream_timeout_ms();
        let equipment = with_timeout(
            "equipment",
            timeout_ms,
            self.equipment_store.get(&req.equipment_id),
        )
        .await?
        .ok_or_else(|| ApiError::UnknownEquipment {
            equipment_id: req.equipment_id.clone(),
        })?;

        let now = self.clock.now();
        let mut incident = Incident::new_reported(
            &req.equipment_id,
            &req.title,
            req.description.as_deref(),
            req.severity,
            req.impact,
            req.category.as_deref(),
            &req.reported_by,
            now,
        );

        // 宽限期为0时，高危事件在上报时刻即升级；
        // 宽限期>0的情况由 escalate_unassigned 扫描处理
        let escalate_now = self.triage.requires_escalation(req.severity)
            && self.config.escalation_grace_minutes() == 0;

        if escalate_now {
            with_timeout(
                "equipment",
                timeout_ms,
                self.equipment_store
                    .update_status(&req.equipment_id, EquipmentStatus::OutOfService),
            )
            .await?;
            incident.equipment_out_of_service = true;
        }

        // 自动指派是次级效果: 名录不可用时降级为人工指派，不阻断上报
        let mut auto_assigned = false;
        if self.config.auto_assign_enabled() {
            let role = self.config.auto_assign_role();
            match with_timeout(
                "technician",
                timeout_ms,
                self.technician_directory.available_by_role(&role),
            )
            .await
            {
                Ok(candidates) => {
                    if let Some(technician) = self.allocator.select_technician(&candidates) {
                        incident.assign(&technician.technician_id, now);
                        auto_assigned = true;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "技师名录不可用，跳过自动指派");
                }
            }
        }

        if let Err(e) = self.incident_repo.create(&incident) {
            if escalate_now {
                // 补偿: 还原设备运行状态
                if let Err(restore_err) = with_timeout(
                    "equipment",
                    timeout_ms,
                    self.equipment_store
                        .update_status(&req.equipment_id, equipment.status),
                )
                .await
                {
                    error!(
                        equipment_id = %req.equipment_id,
                        error = %restore_err,
                        "设备状态补偿还原失败，需人工核对"
                    );
                }
            }
            return Err(e.into());
        }

        let computed_priority = self.triage.score_incident(&incident, now);

        info!(
            incident_id = %incident.incident_id,
            severity = %incident.severity,
            priority = computed_priority,
            escalated = escalate_now,
            auto_assigned = auto_assigned,
            "应急事件已上报"
        );

        self.write_action_log(
            ActionType::ReportIncident,
            &incident.incident_id,
            &incident.equipment_id,
            operator,
            json!({
                "severity": incident.severity,
                "impact": incident.impact,
                "computed_priority": computed_priority,
                "escalated": escalate_now,
            }),
        );
        self.event_publisher.publish_quietly(
            EngineEvent::new(
                EngineEventType::IncidentReported,
                &incident.incident_id,
                &incident.equipment_id,
                now,
            )
            .with_payload(json!({ "computed_priority": computed_priority })),
        );
        if escalate_now {
            self.event_publisher.publish_quietly(EngineEvent::new(
                EngineEventType::IncidentEscalated,
                &incident.incident_id,
                &incident.equipment_id,
                now,
            ));
        }
        if auto_assigned {
            self.event_publisher.publish_quietly(EngineEvent::new(
                EngineEventType::IncidentAssigned,
                &incident.incident_id,
                &incident.equipment_id,
                now,
            ));
        }

        Ok(ReportIncidentResponse {
            incident,
            computed_priority,
            escalated: escalate_now,
            auto_assigned,
        })
    }

    // ==========================================
    // 指派
    // ==========================================

    /// 指派事件
    ///
    /// technician_id 缺省时按配置角色从名录取候选，
    /// 由分配策略选人
    pub async fn assign(
        &self,
        incident_id: &str,
        technician_id: Option<&str>,
        operator: &str,
    ) -> ApiResult<Incident> {
        let mut incident = self.load(incident_id)?;

        if incident.status.is_resolved() {
            return Err(ApiError::AlreadyResolved {
                incident_id: incident.incident_id.clone(),
                status: incident.status.to_string(),
            });
        }
        if !incident.can_assign() {
            return Err(ApiError::InvalidStateTransition {
                from: incident.status.to_string(),
                to: "ASSIGNED".to_string(),
            });
        }

        let selected = match technician_id {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => {
                let role = self.config.auto_assign_role();
                let candidates = with_timeout(
                    "technician",
                    self.config.upstream_timeout_ms(),
                    self.technician_directory.available_by_role(&role),
                )
                .await?;
                self.allocator
                    .select_technician(&candidates)
                    .map(|t| t.technician_id.clone())
                    .ok_or_else(|| {
                        ApiError::BusinessRuleViolation(format!("角色{}无可用技师", role))
                    })?
            }
        };

        let now = self.clock.now();
        let expected_revision = incident.revision;
        incident.assign(&selected, now);
        self.incident_repo
            .persist_transition(&incident, expected_revision)?;

        info!(
            incident_id = incident_id,
            technician_id = %selected,
            "应急事件已指派"
        );

        self.write_action_log(
            ActionType::AssignIncident,
            incident_id,
            &incident.equipment_id,
            operator,
            json!({ "technician_id": selected }),
        );
        self.event_publisher.publish_quietly(EngineEvent::new(
            EngineEventType::IncidentAssigned,
            incident_id,
            &incident.equipment_id,
            now,
        ));

        self.load(incident_id)
    }

    // ==========================================
    // 开始处理（外部触发，仅记时间戳）
    // ==========================================

    /// 技师开始处理
    pub fn start_work(&self, incident_id: &str, operator: &str) -> ApiResult<Incident> {
        let mut incident = self.load(incident_id)?;

        if !incident.can_start() {
            return Err(ApiError::InvalidStateTransition {
                from: incident.status.to_string(),
                to: "IN_PROGRESS".to_string(),
            });
        }

        let now = self.clock.now();
        let expected_revision = incident.revision;
        incident.start_work(now);
        self.incident_repo
            .persist_transition(&incident, expected_revision)?;

        self.write_action_log(
            ActionType::StartIncident,
            incident_id,
            &incident.equipment_id,
            operator,
            json!({}),
        );

        self.load(incident_id)
    }

    // ==========================================
    // 解决
    // ==========================================

    /// 解决事件
    ///
    /// 若设备因本事件被停用，恢复为在用状态；
    /// 恢复写入在前，本地事务失败时补偿回翻
    pub async fn resolve(
        &self,
        incident_id: &str,
        req: ResolveIncidentRequest,
        operator: &str,
    ) -> ApiResult<Incident> {
        if req.solution_text.trim().is_empty() {
            return Err(ApiError::InvalidInput("解决方案说明不能为空".to_string()));
        }

        let mut incident = self.load(incident_id)?;

        if incident.status.is_resolved() {
            return Err(ApiError::AlreadyResolved {
                incident_id: incident.incident_id.clone(),
                status: incident.status.to_string(),
            });
        }
        if !incident.can_resolve() {
            return Err(ApiError::InvalidStateTransition {
                from: incident.status.to_string(),
                to: "RESOLVED".to_string(),
            });
        }

        let timeout_ms = self.config.upstream_timeout_ms();
        let restore_equipment = incident.equipment_out_of_service;

        if restore_equipment {
            with_timeout(
                "equipment",
                timeout_ms,
                self.equipment_store
                    .update_status(&incident.equipment_id, EquipmentStatus::Operative),
            )
            .await?;
        }

        let now = self.clock.now();
        let expected_revision = incident.revision;
        incident.resolve(
            &req.solution_text,
            req.actual_cost,
            req.requires_follow_up,
            now,
        );
        incident.equipment_out_of_service = false;

        if let Err(e) = self
            .incident_repo
            .persist_transition(&incident, expected_revision)
        {
            if restore_equipment {
                // 补偿: 设备回翻停用
                if let Err(restore_err) = with_timeout(
                    "equipment",
                    timeout_ms,
                    self.equipment_store
                        .update_status(&incident.equipment_id, EquipmentStatus::OutOfService),
                )
                .await
                {
                    error!(
                        incident_id = incident_id,
                        equipment_id = %incident.equipment_id,
                        error = %restore_err,
                        "设备状态补偿回翻失败，需人工核对"
                    );
                }
            }
            return Err(e.into());
        }

        info!(
            incident_id = incident_id,
            equipment_restored = restore_equipment,
            "应急事件已解决"
        );

        self.write_action_log(
            ActionType::ResolveIncident,
            incident_id,
            &incident.equipment_id,
            operator,
            json!({
                "requires_follow_up": req.requires_follow_up,
                "actual_cost": req.actual_cost,
                "equipment_restored": restore_equipment,
            }),
        );
        self.event_publisher.publish_quietly(EngineEvent::new(
            EngineEventType::IncidentResolved,
            incident_id,
            &incident.equipment_id,
            now,
        ));

        self.load(incident_id)
    }

    // ==========================================
    // 关闭
    // ==========================================

    /// 行政关闭（仅允许从 RESOLVED 进入）
    pub fn close(&self, incident_id: &str, operator: &str) -> ApiResult<Incident> {
        let mut incident = self.load(incident_id)?;

        if incident.status.is_closed() {
            return Err(ApiError::AlreadyResolved {
                incident_id: incident.incident_id.clone(),
                status: incident.status.to_string(),
            });
        }
        if !incident.can_close() {
            return Err(ApiError::InvalidStateTransition {
                from: incident.status.to_string(),
                to: "CLOSED".to_string(),
            });
        }

        let now = self.clock.now();
        let expected_revision = incident.revision;
        incident.close(now);
        self.incident_repo
            .persist_transition(&incident, expected_revision)?;

        self.write_action_log(
            ActionType::CloseIncident,
            incident_id,
            &incident.equipment_id,
            operator,
            json!({}),
        );
        self.event_publisher.publish_quietly(EngineEvent::new(
            EngineEventType::IncidentClosed,
            incident_id,
            &incident.equipment_id,
            now,
        ));

        self.load(incident_id)
    }

    // ==========================================
    // 评分
    // ==========================================

    /// 查询事件当前派生优先级（读取时重新计算）
    pub fn score(&self, incident_id: &str) -> ApiResult<IncidentView> {
        let incident = self.load(incident_id)?;
        let computed_priority = self.triage.score_incident(&incident, self.clock.now());

        Ok(IncidentView {
            incident,
            computed_priority,
        })
    }

    /// 按派生优先级降序列出未解决事件
    pub fn list_open_by_priority(&self) -> ApiResult<Vec<IncidentView>> {
        let now = self.clock.now();
        let mut views: Vec<IncidentView> = self
            .incident_repo
            .list_open()?
            .into_iter()
            .map(|incident| {
                let computed_priority = self.triage.score_incident(&incident, now);
                IncidentView {
                    incident,
                    computed_priority,
                }
            })
            .collect();

        views.sort_by(|a, b| b.computed_priority.cmp(&a.computed_priority));
        Ok(views)
    }

    // ==========================================
    // 宽限期升级扫描
    // ==========================================

    /// 升级扫描: 将超过宽限期仍未指派的高危事件对应的
    /// 设备停用（周期调用，配合宽限期>0的配置）
    pub async fn escalate_unassigned(&self, operator: &str) -> ApiResult<EscalationSweepResponse> {
        let grace_minutes = self.config.escalation_grace_minutes();
        let now = self.clock.now();
        let timeout_ms = self.config.upstream_timeout_ms();
        let mut escalated = Vec::new();

        for mut incident in self.incident_repo.list_open()? {
            if !self.triage.requires_escalation(incident.severity) {
                continue;
            }
            if incident.assigned_to.is_some() || incident.equipment_out_of_service {
                continue;
            }
            let age_minutes = (now - incident.reported_at).num_minutes();
            if age_minutes < grace_minutes {
                continue;
            }

            with_timeout(
                "equipment",
                timeout_ms,
                self.equipment_store
                    .update_status(&incident.equipment_id, EquipmentStatus::OutOfService),
            )
            .await?;

            let expected_revision = incident.revision;
            incident.equipment_out_of_service = true;
            incident.updated_at = now;

            match self
                .incident_repo
                .persist_transition(&incident, expected_revision)
            {
                Ok(()) => {
                    self.write_action_log(
                        ActionType::EscalateIncident,
                        &incident.incident_id,
                        &incident.equipment_id,
                        operator,
                        json!({ "age_minutes": age_minutes }),
                    );
                    self.event_publisher.publish_quietly(EngineEvent::new(
                        EngineEventType::IncidentEscalated,
                        &incident.incident_id,
                        &incident.equipment_id,
                        now,
                    ));
                    escalated.push(incident.incident_id.clone());
                }
                Err(e) => {
                    // 并发竞争时跳过本条，下轮扫描重新评估
                    warn!(
                        incident_id = %incident.incident_id,
                        error = %e,
                        "升级扫描单项持久化失败"
                    );
                }
            }
        }

        Ok(EscalationSweepResponse {
            escalated_incident_ids: escalated,
        })
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn load(&self, incident_id: &str) -> ApiResult<Incident> {
        self.incident_repo
            .find_by_id(incident_id)?
            .ok_or_else(|| ApiError::NotFound(format!("应急事件{}不存在", incident_id)))
    }

    /// 写操作日志；失败只记日志（业务操作已提交）
    fn write_action_log(
        &self,
        action_type: ActionType,
        entity_id: &str,
        equipment_id: &str,
        operator: &str,
        payload: serde_json::Value,
    ) {
        let log = ActionLog::record(
            action_type,
            Some(entity_id),
            Some(equipment_id),
            operator,
            self.clock.now(),
            Some(payload),
        );
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(
                action_type = action_type.to_db_str(),
                entity_id = entity_id,
                error = %e,
                "操作日志写入失败"
            );
        }
    }
}
