// ==========================================
// 医疗设备维护管理系统 - 维护排程 API
// ==========================================
// 职责: 维护任务生命周期(排程/完成/取消)、批量排程、
//       逾期/临期检测
// 核心递推机制: 预防性任务完成时生成唯一后继任务，
//       形成无界前向链（不做固定N次计划）
// ==========================================

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::equipment::EquipmentRecord;
use crate::domain::maintenance::MaintenanceTask;
use crate::domain::types::{FrequencyCode, TaskKind, TaskPriority};
use crate::engine::detector::{ScheduleClassification, ScheduleClassifier};
use crate::engine::events::{EngineEvent, EngineEventPublisher, EngineEventType, OptionalEventPublisher};
use crate::engine::frequency::FrequencyResolver;
use crate::external::{with_timeout, Clock, EquipmentStore};
use crate::repository::{ActionLogRepository, MaintenanceTaskRepository};

// ==========================================
// 请求/响应 DTO
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleTaskRequest {
    pub equipment_id: String,
    pub kind: TaskKind,
    pub scheduled_date: NaiveDate,
    pub priority: TaskPriority,
    pub technician_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteTaskRequest {
    pub actual_cost: Option<f64>,
    pub actual_duration_minutes: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteTaskResponse {
    pub task: MaintenanceTask,
    /// 预防性任务完成时生成的后继任务
    pub successor: Option<MaintenanceTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanBulkRequest {
    pub equipment_ids: Vec<String>,
    pub kind: TaskKind,
    pub horizon_start: NaiveDate,
    /// 批量节奏代码；缺省/无法识别回退到季度
    pub cadence: Option<String>,
    pub priority: TaskPriority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanBulkItemResult {
    pub equipment_id: String,
    pub success: bool,
    pub task_id: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanBulkResponse {
    pub results: Vec<PlanBulkItemResult>,
    pub success_count: usize,
    pub failed_count: usize,
}

// ==========================================
// MaintenanceApi - 维护排程 API
// ==========================================

/// 维护排程API
///
/// 职责：
/// 1. 任务排程（校验日期/设备引用）
/// 2. 任务完成（预防性任务递推后继 + 设备日期回写）
/// 3. 任务取消（必须给出原因）
/// 4. 批量排程（按设备隔离失败，受限并发）
/// 5. 逾期/临期检测
pub struct MaintenanceApi {
    task_repo: Arc<MaintenanceTaskRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    equipment_store: Arc<dyn EquipmentStore>,
    clock: Arc<dyn Clock>,
    config: Arc<ConfigManager>,
    frequency_resolver: FrequencyResolver,
    classifier: ScheduleClassifier,
    event_publisher: OptionalEventPublisher,
}

impl MaintenanceApi {
    /// 创建新的MaintenanceApi实例
    pub fn new(
        task_repo: Arc<MaintenanceTaskRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        equipment_store: Arc<dyn EquipmentStore>,
        clock: Arc<dyn Clock>,
        config: Arc<ConfigManager>,
        event_publisher: Option<Arc<dyn EngineEventPublisher>>,
    ) -> Self {
        let event_publisher = match event_publisher {
            Some(p) => OptionalEventPublisher::with_publisher(p),
            None => OptionalEventPublisher::none(),
        };

        Self {
            task_repo,
            action_log_repo,
            equipment_store,
            clock,
            config,
            frequency_resolver: FrequencyResolver::new(),
            classifier: ScheduleClassifier::new(),
            event_publisher,
        }
    }

    // ==========================================
    // 排程
    // ==========================================

    /// 创建维护任务
    ///
    /// 校验:
    /// - 计划日期不得早于今天（维修任务例外，可补录已发生的修理）
    /// - 设备引用必须可解析
    pub async fn schedule(
        &self,
        req: ScheduleTaskRequest,
        operator: &str,
    ) -> ApiResult<MaintenanceTask> {
        if req.equipment_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("设备ID不能为空".to_string()));
        }

        let today = self.clock.today();
        if req.scheduled_date < today && req.kind != TaskKind::Corrective {
            return Err(ApiError::InvalidDate(format!(
                "计划日期{}早于今天{}",
                req.scheduled_date, today
            )));
        }

        self.fetch_equipment(&req.equipment_id).await?;

        let task = MaintenanceTask::new_scheduled(
            &req.equipment_id,
            req.kind,
            req.scheduled_date,
            req.priority,
            req.technician_id.as_deref(),
            self.clock.now(),
        );
        self.task_repo.create(&task)?;

        info!(
            task_id = %task.task_id,
            equipment_id = %task.equipment_id,
            kind = %task.kind,
            scheduled_date = %task.scheduled_date,
            "维护任务已排程"
        );

        self.write_action_log(
            ActionType::ScheduleTask,
            &task.task_id,
            &task.equipment_id,
            operator,
            json!({
                "kind": task.kind,
                "scheduled_date": task.scheduled_date,
                "priority": task.priority,
            }),
        );
        self.event_publisher.publish_quietly(EngineEvent::new(
            EngineEventType::TaskScheduled,
            &task.task_id,
            &task.equipment_id,
            task.created_at,
        ));

        Ok(task)
    }

    // ==========================================
    // 完成（递推链核心）
    // ==========================================

    /// 完成维护任务
    ///
    /// 预防性任务: 以完成日为基准，用设备频率代码推导
    /// 下次到期日，生成恰好一个后继任务；状态翻转与
    /// 后继插入同事务提交。
    ///
    /// 设备日期回写顺序在本地事务之前；本地事务失败时
    /// 按设备原值还原（补偿）。
    pub async fn complete(
        &self,
        task_id: &str,
        req: CompleteTaskRequest,
        operator: &str,
    ) -> ApiResult<CompleteTaskResponse> {
        let task = self
            .task_repo
            .find_by_id(task_id)?
            .ok_or_else(|| ApiError::NotFound(format!("维护任务{}不存在", task_id)))?;

        if task.is_terminal() {
            return Err(ApiError::AlreadyTerminal {
                task_id: task.task_id.clone(),
                status: task.status.to_string(),
            });
        }

        let now = self.clock.now();
        let completed_date = now.date();
        let equipment = self.fetch_equipment(&task.equipment_id).await?;

        // 每次完成只生成一个后继，形成无界前向链
        let successor = if task.kind == TaskKind::Preventive {
            let next_due = self.frequency_resolver.next_due_date_from_raw(
                completed_date,
                equipment.maintenance_frequency_code.as_deref(),
            );
            Some(MaintenanceTask::chained_successor(&task, next_due, now))
        } else {
            None
        };

        let next_for_equipment = successor
            .as_ref()
            .map(|s| s.scheduled_date)
            .or(equipment.next_maintenance_date);
        let timeout_ms = self.config.upstream_timeout_ms();

        with_timeout(
            "equipment",
            timeout_ms,
            self.equipment_store.update_maintenance_dates(
                &task.equipment_id,
                Some(completed_date),
                next_for_equipment,
            ),
        )
        .await?;

        if let Err(e) = self.task_repo.complete_and_chain(
            task_id,
            task.revision,
            completed_date,
            req.actual_cost,
            req.actual_duration_minutes,
            req.notes.as_deref(),
            now,
            successor.as_ref(),
        ) {
            // 补偿: 还原设备维护日期
            if let Err(restore_err) = with_timeout(
                "equipment",
                timeout_ms,
                self.equipment_store.update_maintenance_dates(
                    &task.equipment_id,
                    equipment.last_maintenance_date,
                    equipment.next_maintenance_date,
                ),
            )
            .await
            {
                error!(
                    task_id = task_id,
                    equipment_id = %task.equipment_id,
                    error = %restore_err,
                    "设备维护日期补偿还原失败，需人工核对"
                );
            }
            return Err(e.into());
        }

        let completed = self
            .task_repo
            .find_by_id(task_id)?
            .ok_or_else(|| ApiError::InternalError(format!("任务{}完成后读取失败", task_id)))?;

        info!(
            task_id = task_id,
            equipment_id = %task.equipment_id,
            successor_id = successor.as_ref().map(|s| s.task_id.as_str()).unwrap_or("-"),
            "维护任务已完成"
        );

        self.write_action_log(
            ActionType::CompleteTask,
            task_id,
            &task.equipment_id,
            operator,
            json!({
                "completed_date": completed_date,
                "actual_cost": req.actual_cost,
                "actual_duration_minutes": req.actual_duration_minutes,
                "successor_task_id": successor.as_ref().map(|s| s.task_id.clone()),
            }),
        );
        self.event_publisher.publish_quietly(
            EngineEvent::new(
                EngineEventType::TaskCompleted,
                task_id,
                &task.equipment_id,
                now,
            )
            .with_payload(json!({
                "successor_task_id": successor.as_ref().map(|s| s.task_id.clone()),
                "next_due_date": successor.as_ref().map(|s| s.scheduled_date),
            })),
        );
        if let Some(succ) = &successor {
            self.event_publisher.publish_quietly(EngineEvent::new(
                EngineEventType::TaskScheduled,
                &succ.task_id,
                &succ.equipment_id,
                now,
            ));
        }

        Ok(CompleteTaskResponse {
            task: completed,
            successor,
        })
    }

    // ==========================================
    // 取消
    // ==========================================

    /// 取消维护任务（必须给出非空原因）
    pub async fn cancel(
        &self,
        task_id: &str,
        reason: &str,
        operator: &str,
    ) -> ApiResult<MaintenanceTask> {
        if reason.trim().is_empty() {
            return Err(ApiError::InvalidInput("取消原因不能为空".to_string()));
        }

        let task = self
            .task_repo
            .find_by_id(task_id)?
            .ok_or_else(|| ApiError::NotFound(format!("维护任务{}不存在", task_id)))?;

        if task.is_terminal() {
            return Err(ApiError::AlreadyTerminal {
                task_id: task.task_id.clone(),
                status: task.status.to_string(),
            });
        }

        let now = self.clock.now();
        self.task_repo.cancel(task_id, task.revision, reason, now)?;

        let cancelled = self
            .task_repo
            .find_by_id(task_id)?
            .ok_or_else(|| ApiError::InternalError(format!("任务{}取消后读取失败", task_id)))?;

        info!(task_id = task_id, reason = reason, "维护任务已取消");

        self.write_action_log(
            ActionType::CancelTask,
            task_id,
            &task.equipment_id,
            operator,
            json!({ "reason": reason }),
        );
        self.event_publisher.publish_quietly(EngineEvent::new(
            EngineEventType::TaskCancelled,
            task_id,
            &task.equipment_id,
            now,
        ));

        Ok(cancelled)
    }

    // ==========================================
    // 批量排程
    // ==========================================

    /// 批量排程
    ///
    /// 每台设备独立处理（失败按设备隔离），并发受
    /// bulk_worker_limit 限制；后续周期只通过完成操作递推，
    /// 此处不生成整条递推链。
    #[instrument(skip(self, req), fields(count = req.equipment_ids.len()))]
    pub async fn plan_bulk(
        &self,
        req: PlanBulkRequest,
        operator: &str,
    ) -> ApiResult<PlanBulkResponse> {
        if req.equipment_ids.is_empty() {
            return Err(ApiError::InvalidInput("设备ID列表不能为空".to_string()));
        }

        let cadence = self
            .frequency_resolver
            .resolve_code(req.cadence.as_deref());
        let kind = req.kind;
        let horizon_start = req.horizon_start;
        let priority = req.priority;
        let now = self.clock.now();
        let semaphore = Arc::new(Semaphore::new(self.config.bulk_worker_limit()));

        let tasks = req.equipment_ids.iter().map(|equipment_id| {
            let semaphore = semaphore.clone();
            async move {
                let permit = semaphore.acquire().await;
                if permit.is_err() {
                    return PlanBulkItemResult {
                        equipment_id: equipment_id.clone(),
                        success: false,
                        task_id: None,
                        scheduled_date: None,
                        error: Some("并发控制信号量已关闭".to_string()),
                    };
                }

                match self
                    .plan_one(equipment_id, kind, horizon_start, cadence, priority, now)
                    .await
                {
                    Ok(task) => PlanBulkItemResult {
                        equipment_id: equipment_id.clone(),
                        success: true,
                        task_id: Some(task.task_id),
                        scheduled_date: Some(task.scheduled_date),
                        error: None,
                    },
                    Err(e) => {
                        warn!(equipment_id = %equipment_id, error = %e, "批量排程单项失败");
                        PlanBulkItemResult {
                            equipment_id: equipment_id.clone(),
                            success: false,
                            task_id: None,
                            scheduled_date: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            }
        });

        let results = join_all(tasks).await;
        let success_count = results.iter().filter(|r| r.success).count();
        let failed_count = results.len() - success_count;

        info!(
            total = results.len(),
            success = success_count,
            failed = failed_count,
            "批量排程完成"
        );

        self.write_action_log(
            ActionType::PlanBulk,
            "-",
            "-",
            operator,
            json!({
                "kind": kind,
                "horizon_start": horizon_start,
                "cadence": cadence,
                "total": results.len(),
                "success": success_count,
                "failed": failed_count,
            }),
        );

        Ok(PlanBulkResponse {
            results,
            success_count,
            failed_count,
        })
    }

    /// 单台设备的批量排程处理
    ///
    /// 起始日期 = 上次维护日按节奏推进（不早于排程起点）；
    /// 无维护历史的设备直接取排程起点。
    async fn plan_one(
        &self,
        equipment_id: &str,
        kind: TaskKind,
        horizon_start: NaiveDate,
        cadence: FrequencyCode,
        priority: TaskPriority,
        now: NaiveDateTime,
    ) -> ApiResult<MaintenanceTask> {
        let equipment = self.fetch_equipment(equipment_id).await?;

        let scheduled_date = match equipment.last_maintenance_date {
            Some(last) => self
                .frequency_resolver
                .next_due_date(last, cadence)
                .max(horizon_start),
            None => horizon_start,
        };

        let task =
            MaintenanceTask::new_scheduled(equipment_id, kind, scheduled_date, priority, None, now);
        self.task_repo.create(&task)?;

        self.event_publisher.publish_quietly(EngineEvent::new(
            EngineEventType::TaskScheduled,
            &task.task_id,
            equipment_id,
            now,
        ));

        Ok(task)
    }

    // ==========================================
    // 逾期/临期检测
    // ==========================================

    /// 对当前所有非终态任务做逾期/临期划分
    ///
    /// today 来自注入时钟，预警窗口来自配置
    pub fn classify_schedule(&self) -> ApiResult<ScheduleClassification> {
        let tasks = self.task_repo.list_non_terminal()?;
        let today = self.clock.today();
        let window = self.config.alert_window_days();

        Ok(self.classifier.classify(tasks, today, window))
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 按ID查询任务
    pub fn get_task(&self, task_id: &str) -> ApiResult<MaintenanceTask> {
        self.task_repo
            .find_by_id(task_id)?
            .ok_or_else(|| ApiError::NotFound(format!("维护任务{}不存在", task_id)))
    }

    /// 查询某设备的维护历史
    pub fn equipment_history(&self, equipment_id: &str) -> ApiResult<Vec<MaintenanceTask>> {
        Ok(self.task_repo.list_by_equipment(equipment_id)?)
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    /// 解析设备引用（带超时）；不存在 → UnknownEquipment
    async fn fetch_equipment(&self, equipment_id: &str) -> ApiResult<EquipmentRecord> {
        let timeout_ms = self.config.upstream_timeout_ms();
        let record = with_timeout(
            "equipment",
            timeout_ms,
            self.equipment_store.get(equipment_id),
        )
        .await?;

        record.ok_or_else(|| ApiError::UnknownEquipment {
            equipment_id: equipment_id.to_string(),
        })
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
