// ==========================================
// 医疗设备维护管理系统 - 演示数据库重置与种子
// ==========================================
// 用途: 重建演示数据库——设备/技师/审计事件镜像表
//       + 一批维护任务与应急事件
// ==========================================

use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{Days, Local};
use med_cmms::db;
use med_cmms::domain::equipment::{EquipmentRecord, Technician};
use med_cmms::domain::maintenance::MaintenanceTask;
use med_cmms::domain::types::{
    AuditRiskLevel, EquipmentStatus, TaskKind, TaskPriority,
};
use med_cmms::domain::AuditEvent;
use med_cmms::external::{SqliteAuditLog, SqliteEquipmentStore, SqliteTechnicianDirectory};
use med_cmms::repository::MaintenanceTaskRepository;
use uuid::Uuid;

const DEFAULT_DB_PATH: &str = "med_cmms.db";

fn main() -> Result<(), Box<dyn Error>> {
    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

    // 已存在的库先备份再重建
    if Path::new(&db_path).exists() {
        let backup_path = format!("{}.bak", db_path);
        fs::copy(&db_path, &backup_path)?;
        fs::remove_file(&db_path)?;
        println!("已备份旧数据库到 {}", backup_path);
    }

    let conn = Arc::new(Mutex::new(db::open_and_init(&db_path)?));

    seed_equipment(conn.clone())?;
    seed_technicians(conn.clone())?;
    seed_audit_events(conn.clone())?;
    seed_tasks(conn.clone())?;

    println!("演示数据库已就绪: {}", db_path);
    Ok(())
}

/// 设备镜像: 覆盖各频率代码与风险分级
fn seed_equipment(conn: Arc<Mutex<rusqlite::Connection>>) -> Result<(), Box<dyn Error>> {
    let store = SqliteEquipmentStore::new(conn);
    let today = Local::now().date_naive();

    let samples = [
        ("EQ-001", "床旁监护仪", "MONTHLY", true, "III"),
        ("EQ-002", "输液泵", "BIMONTHLY", false, "II"),
        ("EQ-003", "除颤器", "MONTHLY", true, "III"),
        ("EQ-004", "呼吸机", "QUARTERLY", true, "III"),
        ("EQ-005", "血气分析仪", "SEMIANNUAL", true, "II"),
        ("EQ-006", "手术无影灯", "ANNUAL", false, "I"),
    ];

    for (i, (id, name, freq, calibration, risk_class)) in samples.iter().enumerate() {
        let last = today.checked_sub_days(Days::new(20 + i as u64 * 15));
        store.upsert(&EquipmentRecord {
            equipment_id: id.to_string(),
            name: name.to_string(),
            maintenance_frequency_code: Some(freq.to_string()),
            last_maintenance_date: last,
            next_maintenance_date: None,
            requires_calibration: *calibration,
            risk_class: Some(risk_class.to_string()),
            status: EquipmentStatus::Operative,
        })?;
    }

    println!("设备镜像: {} 条", samples.len());
    Ok(())
}

fn seed_technicians(conn: Arc<Mutex<rusqlite::Connection>>) -> Result<(), Box<dyn Error>> {
    let directory = SqliteTechnicianDirectory::new(conn);

    let samples = [
        ("T-01", "张工", "TECHNICIAN", true),
        ("T-02", "李工", "TECHNICIAN", true),
        ("T-03", "王工", "BIOMEDICAL", true),
        ("T-04", "赵工", "TECHNICIAN", false),
    ];

    for (id, name, role, available) in samples {
        directory.upsert(&Technician {
            technician_id: id.to_string(),
            name: name.to_string(),
            role: role.to_string(),
            available,
        })?;
    }

    println!("技师名录: {} 条", samples.len());
    Ok(())
}

/// 审计事件镜像: 近一周的混合风险事件
fn seed_audit_events(conn: Arc<Mutex<rusqlite::Connection>>) -> Result<(), Box<dyn Error>> {
    let audit_log = SqliteAuditLog::new(conn);
    let now = Local::now().naive_local();

    let samples = [
        (1u64, "user-7", "LOGIN_FAILED", AuditRiskLevel::High),
        (1, "user-7", "LOGIN_FAILED", AuditRiskLevel::High),
        (2, "user-3", "EXPORT_REPORT", AuditRiskLevel::Medium),
        (3, "user-2", "UPDATE_EQUIPMENT", AuditRiskLevel::Low),
        (4, "user-9", "DELETE_FILE", AuditRiskLevel::Medium),
        (6, "user-1", "LOGIN_OK", AuditRiskLevel::Low),
    ];

    for (days_ago, actor, action, level) in samples {
        audit_log.insert(&AuditEvent {
            event_id: Uuid::new_v4().to_string(),
            event_ts: now - chrono::Duration::days(days_ago as i64),
            actor_id: actor.to_string(),
            action: action.to_string(),
            risk_level: level,
            ip_address: Some("10.20.0.15".to_string()),
        })?;
    }

    println!("审计事件: {} 条", samples.len());
    Ok(())
}

/// 维护任务: 含逾期/临期/远期三类
fn seed_tasks(conn: Arc<Mutex<rusqlite::Connection>>) -> Result<(), Box<dyn Error>> {
    let task_repo = MaintenanceTaskRepository::new(conn);
    let now = Local::now().naive_local();
    let today = now.date();

    let samples = [
        ("EQ-001", TaskKind::Preventive, -10i64, TaskPriority::High),
        ("EQ-002", TaskKind::Preventive, 5, TaskPriority::Medium),
        ("EQ-003", TaskKind::Calibration, 12, TaskPriority::High),
        ("EQ-004", TaskKind::Preventive, 45, TaskPriority::Medium),
        ("EQ-005", TaskKind::Verification, 60, TaskPriority::Low),
    ];

    for (equipment_id, kind, day_offset, priority) in samples {
        let scheduled = if day_offset < 0 {
            today.checked_sub_days(Days::new(day_offset.unsigned_abs())).unwrap()
        } else {
            today.checked_add_days(Days::new(day_offset as u64)).unwrap()
        };
        let task =
            MaintenanceTask::new_scheduled(equipment_id, kind, scheduled, priority, None, now);
        task_repo.create(&task)?;
    }

    println!("维护任务: {} 条", samples.len());
    Ok(())
}
