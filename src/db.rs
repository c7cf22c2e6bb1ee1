// ==========================================
// 医疗设备维护管理系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免“部分模块外键开启/部分不开启”
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供引擎自有存储（维护任务/应急事件/操作日志）的建表入口
// ==========================================

use rusqlite::Connection;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化引擎存储 schema（幂等，CREATE IF NOT EXISTS）
///
/// 两张主表（maintenance_task / incident）按 equipment_id + status 建索引，
/// 供逾期检测与分诊查询使用。
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        -- 维护任务表（已完成任务软保留，不做物理删除）
        CREATE TABLE IF NOT EXISTS maintenance_task (
            task_id TEXT PRIMARY KEY,
            equipment_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            status TEXT NOT NULL,
            priority TEXT NOT NULL,
            scheduled_date TEXT NOT NULL,
            completed_date TEXT,
            cancel_reason TEXT,
            assigned_technician_id TEXT,
            actual_cost REAL,
            actual_duration_minutes INTEGER,
            notes TEXT,
            chained_from_task_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            revision INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_task_equipment_status
            ON maintenance_task(equipment_id, status);
        CREATE INDEX IF NOT EXISTS idx_task_status_date
            ON maintenance_task(status, scheduled_date);

        -- 应急事件表（永久保留，供审计与统计）
        CREATE TABLE IF NOT EXISTS incident (
            incident_id TEXT PRIMARY KEY,
            equipment_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            severity TEXT NOT NULL,
            impact TEXT NOT NULL,
            category TEXT,
            status TEXT NOT NULL,
            reported_by TEXT NOT NULL,
            assigned_to TEXT,
            reported_at TEXT NOT NULL,
            assigned_at TEXT,
            resolved_at TEXT,
            closed_at TEXT,
            solution_text TEXT,
            actual_cost REAL,
            requires_follow_up INTEGER NOT NULL DEFAULT 0,
            equipment_out_of_service INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            revision INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_incident_equipment_status
            ON incident(equipment_id, status);
        CREATE INDEX IF NOT EXISTS idx_incident_status
            ON incident(status, reported_at);

        -- 操作日志表（所有写操作必须记录）
        CREATE TABLE IF NOT EXISTS action_log (
            action_id TEXT PRIMARY KEY,
            action_type TEXT NOT NULL,
            entity_id TEXT,
            equipment_id TEXT,
            actor TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            payload_json TEXT,
            detail TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_action_log_entity
            ON action_log(entity_id, action_ts);

        -- ==========================================
        -- 以下三张表归外部服务所有，这里仅为
        -- SQLite 适配器（演示/集成测试）提供镜像
        -- ==========================================

        CREATE TABLE IF NOT EXISTS equipment (
            equipment_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            maintenance_frequency_code TEXT,
            last_maintenance_date TEXT,
            next_maintenance_date TEXT,
            requires_calibration INTEGER NOT NULL DEFAULT 0,
            risk_class TEXT,
            status TEXT NOT NULL DEFAULT 'OPERATIVE',
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS technician (
            technician_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            role TEXT NOT NULL,
            available INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS audit_event (
            event_id TEXT PRIMARY KEY,
            event_ts TEXT NOT NULL,
            actor_id TEXT NOT NULL,
            action TEXT NOT NULL,
            risk_level TEXT NOT NULL,
            ip_address TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_audit_event_ts
            ON audit_event(event_ts);
        "#,
    )?;

    Ok(())
}

/// 打开连接并确保 schema 就绪（演示二进制/测试用）
pub fn open_and_init(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = open_sqlite_connection(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}
