// ==========================================
// 医疗设备维护管理系统 - 协作方 SQLite 适配器
// ==========================================
// 演示与集成测试用: 外部服务以本地镜像表代替。
// 生产部署时由各服务的真实客户端实现同名 trait。
// ==========================================

use crate::domain::audit::AuditEvent;
use crate::domain::equipment::{EquipmentRecord, Technician};
use crate::domain::types::{AuditRiskLevel, EquipmentStatus};
use crate::external::{AuditLog, EquipmentStore, TechnicianDirectory, UpstreamError};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock_conn<'a>(
    conn: &'a Arc<Mutex<Connection>>,
    collaborator: &str,
) -> Result<MutexGuard<'a, Connection>, UpstreamError> {
    conn.lock()
        .map_err(|e| UpstreamError::unavailable(collaborator, e.to_string()))
}

// ==========================================
// SqliteEquipmentStore - 设备主数据适配器
// ==========================================
pub struct SqliteEquipmentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEquipmentStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 写入/覆盖一条设备记录（种子数据用）
    pub fn upsert(&self, record: &EquipmentRecord) -> Result<(), UpstreamError> {
        let conn = lock_conn(&self.conn, "equipment")?;

        conn.execute(
            r#"INSERT INTO equipment (
                equipment_id, name, maintenance_frequency_code,
                last_maintenance_date, next_maintenance_date,
                requires_calibration, risk_class, status, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))
            ON CONFLICT(equipment_id) DO UPDATE SET
                name = excluded.name,
                maintenance_frequency_code = excluded.maintenance_frequency_code,
                last_maintenance_date = excluded.last_maintenance_date,
                next_maintenance_date = excluded.next_maintenance_date,
                requires_calibration = excluded.requires_calibration,
                risk_class = excluded.risk_class,
                status = excluded.status,
                updated_at = datetime('now')"#,
            params![
                &record.equipment_id,
                &record.name,
                &record.maintenance_frequency_code,
                record.last_maintenance_date.map(|d| d.format("%Y-%m-%d").to_string()),
                record.next_maintenance_date.map(|d| d.format("%Y-%m-%d").to_string()),
                record.requires_calibration as i32,
                &record.risk_class,
                record.status.to_db_str(),
            ],
        )
        .map_err(|e| UpstreamError::unavailable("equipment", e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl EquipmentStore for SqliteEquipmentStore {
    async fn get(&self, equipment_id: &str) -> Result<Option<EquipmentRecord>, UpstreamError> {
        let conn = lock_conn(&self.conn, "equipment")?;

        let result = conn.query_row(
            r#"SELECT equipment_id, name, maintenance_frequency_code,
                      last_maintenance_date, next_maintenance_date,
                      requires_calibration, risk_class, status
               FROM equipment
               WHERE equipment_id = ?"#,
            params![equipment_id],
            |row| {
                let last: Option<String> = row.get(3)?;
                let next: Option<String> = row.get(4)?;
                let status_str: String = row.get(7)?;
                Ok(EquipmentRecord {
                    equipment_id: row.get(0)?,
                    name: row.get(1)?,
                    maintenance_frequency_code: row.get(2)?,
                    last_maintenance_date: last
                        .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
                    next_maintenance_date: next
                        .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
                    requires_calibration: row.get::<_, i32>(5)? != 0,
                    risk_class: row.get(6)?,
                    status: EquipmentStatus::from_db_str(&status_str)
                        .unwrap_or(EquipmentStatus::Operative),
                })
            },
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(UpstreamError::unavailable("equipment", e.to_string())),
        }
    }

    async fn update_maintenance_dates(
        &self,
        equipment_id: &str,
        last_maintenance_date: Option<NaiveDate>,
        next_maintenance_date: Option<NaiveDate>,
    ) -> Result<(), UpstreamError> {
        let conn = lock_conn(&self.conn, "equipment")?;

        let affected = conn
            .execute(
                r#"UPDATE equipment
                   SET last_maintenance_date = ?,
                       next_maintenance_date = ?,
                       updated_at = datetime('now')
                   WHERE equipment_id = ?"#,
                params![
                    last_maintenance_date.map(|d| d.format("%Y-%m-%d").to_string()),
                    next_maintenance_date.map(|d| d.format("%Y-%m-%d").to_string()),
                    equipment_id,
                ],
            )
            .map_err(|e| UpstreamError::unavailable("equipment", e.to_string()))?;

        if affected == 0 {
            return Err(UpstreamError::unavailable(
                "equipment",
                format!("设备{}不存在", equipment_id),
            ));
        }

        Ok(())
    }

    async fn update_status(
        &self,
        equipment_id: &str,
        status: EquipmentStatus,
    ) -> Result<(), UpstreamError> {
        let conn = lock_conn(&self.conn, "equipment")?;

        let affected = conn
            .execute(
                r#"UPDATE equipment
                   SET status = ?, updated_at = datetime('now')
                   WHERE equipment_id = ?"#,
                params![status.to_db_str(), equipment_id],
            )
            .map_err(|e| UpstreamError::unavailable("equipment", e.to_string()))?;

        if affected == 0 {
            return Err(UpstreamError::unavailable(
                "equipment",
                format!("设备{}不存在", equipment_id),
            ));
        }

        Ok(())
    }
}

// ==========================================
// SqliteTechnicianDirectory - 技师名录适配器
// ==========================================
pub struct SqliteTechnicianDirectory {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTechnicianDirectory {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 写入/覆盖一条技师记录（种子数据用）
    pub fn upsert(&self, technician: &Technician) -> Result<(), UpstreamError> {
        let conn = lock_conn(&self.conn, "technician")?;

        conn.execute(
            r#"INSERT INTO technician (technician_id, name, role, available)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(technician_id) DO UPDATE SET
                   name = excluded.name,
                   role = excluded.role,
                   available = excluded.available"#,
            params![
                &technician.technician_id,
                &technician.name,
                &technician.role,
                technician.available as i32,
            ],
        )
        .map_err(|e| UpstreamError::unavailable("technician", e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl TechnicianDirectory for SqliteTechnicianDirectory {
    async fn available_by_role(&self, role: &str) -> Result<Vec<Technician>, UpstreamError> {
        let conn = lock_conn(&self.conn, "technician")?;

        let mut stmt = conn
            .prepare(
                r#"SELECT technician_id, name, role, available
                   FROM technician
                   WHERE role = ? AND available = 1
                   ORDER BY technician_id ASC"#,
            )
            .map_err(|e| UpstreamError::unavailable("technician", e.to_string()))?;

        let technicians = stmt
            .query_map(params![role], |row| {
                Ok(Technician {
                    technician_id: row.get(0)?,
                    name: row.get(1)?,
                    role: row.get(2)?,
                    available: row.get::<_, i32>(3)? != 0,
                })
            })
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|e| UpstreamError::unavailable("technician", e.to_string()))?;

        Ok(technicians)
    }
}

// ==========================================
// SqliteAuditLog - 审计日志适配器（只读）
// ==========================================
pub struct SqliteAuditLog {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAuditLog {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 写入一条审计事件（种子数据用）
    pub fn insert(&self, event: &AuditEvent) -> Result<(), UpstreamError> {
        let conn = lock_conn(&self.conn, "audit_log")?;

        conn.execute(
            r#"INSERT INTO audit_event (event_id, event_ts, actor_id, action, risk_level, ip_address)
               VALUES (?, ?, ?, ?, ?, ?)"#,
            params![
                &event.event_id,
                event.event_ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                &event.actor_id,
                &event.action,
                event.risk_level.to_db_str(),
                &event.ip_address,
            ],
        )
        .map_err(|e| UpstreamError::unavailable("audit_log", e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl AuditLog for SqliteAuditLog {
    async fn query_window(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<AuditEvent>, UpstreamError> {
        let conn = lock_conn(&self.conn, "audit_log")?;

        let mut stmt = conn
            .prepare(
                r#"SELECT event_id, event_ts, actor_id, action, risk_level, ip_address
                   FROM audit_event
                   WHERE event_ts >= ? AND event_ts <= ?
                   ORDER BY event_ts ASC"#,
            )
            .map_err(|e| UpstreamError::unavailable("audit_log", e.to_string()))?;

        let events = stmt
            .query_map(
                params![
                    from.format("%Y-%m-%d %H:%M:%S").to_string(),
                    to.format("%Y-%m-%d %H:%M:%S").to_string(),
                ],
                |row| {
                    let ts_str: String = row.get(1)?;
                    let level_str: String = row.get(4)?;
                    Ok(AuditEvent {
                        event_id: row.get(0)?,
                        event_ts: NaiveDateTime::parse_from_str(&ts_str, "%Y-%m-%d %H:%M:%S")
                            .map_err(|e| {
                                rusqlite::Error::FromSqlConversionFailure(
                                    1,
                                    rusqlite::types::Type::Text,
                                    Box::new(e),
                                )
                            })?,
                        actor_id: row.get(2)?,
                        action: row.get(3)?,
                        risk_level: AuditRiskLevel::from_db_str(&level_str)
                            .unwrap_or(AuditRiskLevel::Low),
                        ip_address: row.get(5)?,
                    })
                },
            )
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|e| UpstreamError::unavailable("audit_log", e.to_string()))?;

        Ok(events)
    }
}
