// ==========================================
// 医疗设备维护管理系统 - 运维主入口
// ==========================================
// 用途: 打开数据库，执行一轮逾期检测与风险评估，
//       输出驾驶舱摘要（供巡检/定时任务调用）
// ==========================================

use std::sync::{Arc, Mutex};

use anyhow::Context;
use med_cmms::api::DashboardApi;
use med_cmms::config::ConfigManager;
use med_cmms::db;
use med_cmms::external::SqliteAuditLog;
use med_cmms::external::{Clock, SystemClock};
use med_cmms::logging;
use med_cmms::repository::{IncidentRepository, MaintenanceTaskRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} - 维护排程与应急事件分诊引擎", med_cmms::APP_NAME);
    tracing::info!("系统版本: {}", med_cmms::VERSION);
    tracing::info!("==================================================");

    // 数据库路径: 第一个命令行参数，默认 med_cmms.db
    let db_path = std::env::args().nth(1).unwrap_or_else(|| "med_cmms.db".to_string());
    tracing::info!("使用数据库: {}", db_path);

    let conn = db::open_and_init(&db_path).context("数据库初始化失败")?;
    let conn = Arc::new(Mutex::new(conn));

    let task_repo = Arc::new(MaintenanceTaskRepository::new(conn.clone()));
    let incident_repo = Arc::new(IncidentRepository::new(conn.clone()));
    let audit_log = Arc::new(SqliteAuditLog::new(conn.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let config = Arc::new(
        ConfigManager::from_connection(conn.clone())
            .map_err(|e| anyhow::anyhow!("配置管理器初始化失败: {}", e))?,
    );

    let dashboard = DashboardApi::new(task_repo, incident_repo, audit_log, clock, config);

    // 逾期/临期概览
    let overview = dashboard
        .maintenance_overview()
        .map_err(|e| anyhow::anyhow!("维护概览生成失败: {}", e))?;
    tracing::info!(
        total = overview.total_active,
        overdue = overview.overdue_count,
        due_soon = overview.due_soon_count,
        on_track = overview.on_track_count,
        window_days = overview.alert_window_days,
        "维护排程概览"
    );

    // 事件统计
    let stats = dashboard
        .incident_stats()
        .map_err(|e| anyhow::anyhow!("事件统计生成失败: {}", e))?;
    tracing::info!(
        open = stats.open_count,
        avg_resolution_minutes = stats.avg_resolution_minutes.unwrap_or(0.0),
        "应急事件统计"
    );

    // 系统风险评估
    let assessment = dashboard
        .risk_assessment()
        .await
        .map_err(|e| anyhow::anyhow!("风险评估失败: {}", e))?;
    tracing::info!(
        score = assessment.score,
        level = %assessment.level,
        events = assessment.event_count,
        "系统风险评估"
    );
    for recommendation in &assessment.recommendations {
        tracing::warn!("处置建议: {}", recommendation);
    }

    Ok(())
}
