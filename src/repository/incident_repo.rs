// ==========================================
// 医疗设备维护管理系统 - 应急事件仓储
// ==========================================
// 并发控制: 状态转换按 revision 乐观锁校验
// 应急事件永久保留，无删除接口
// ==========================================

use crate::domain::incident::Incident;
use crate::domain::types::{Impact, IncidentStatus, Severity};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::task_repo::parse_datetime;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

const INCIDENT_COLUMNS: &str = r#"incident_id, equipment_id, title, description, severity,
           impact, category, status, reported_by, assigned_to,
           reported_at, assigned_at, resolved_at, closed_at,
           solution_text, actual_cost, requires_follow_up, equipment_out_of_service,
           created_at, updated_at, revision"#;

// ==========================================
// IncidentRepository - 应急事件仓储
// ==========================================
pub struct IncidentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl IncidentRepository {
    /// 创建新的仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建事件
    pub fn create(&self, incident: &Incident) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO incident (
                incident_id, equipment_id, title, description, severity,
                impact, category, status, reported_by, assigned_to,
                reported_at, assigned_at, resolved_at, closed_at,
                solution_text, actual_cost, requires_follow_up, equipment_out_of_service,
                created_at, updated_at, revision
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &incident.incident_id,
                &incident.equipment_id,
                &incident.title,
                &incident.description,
                incident.severity.to_db_str(),
                incident.impact.to_db_str(),
                &incident.category,
                incident.status.to_db_str(),
                &incident.reported_by,
                &incident.assigned_to,
                incident.reported_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                incident.assigned_at.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
                incident.resolved_at.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
                incident.closed_at.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
                &incident.solution_text,
                &incident.actual_cost,
                incident.requires_follow_up as i32,
                incident.equipment_out_of_service as i32,
                incident.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                incident.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                &incident.revision,
            ],
        )?;

        Ok(incident.incident_id.clone())
    }

    /// 按incident_id查询事件
    pub fn find_by_id(&self, incident_id: &str) -> RepositoryResult<Option<Incident>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            &format!("SELECT {INCIDENT_COLUMNS} FROM incident WHERE incident_id = ?"),
            params![incident_id],
            Self::map_row,
        ) {
            Ok(incident) => Ok(Some(incident)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询所有未解决事件（按上报时间升序，老事件在前）
    pub fn list_open(&self) -> RepositoryResult<Vec<Incident>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            r#"SELECT {INCIDENT_COLUMNS} FROM incident
               WHERE status IN ('ACTIVE', 'ASSIGNED', 'IN_PROGRESS')
               ORDER BY reported_at ASC"#
        ))?;

        let incidents = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(incidents)
    }

    /// 按设备查询事件
    pub fn list_by_equipment(&self, equipment_id: &str) -> RepositoryResult<Vec<Incident>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            r#"SELECT {INCIDENT_COLUMNS} FROM incident
               WHERE equipment_id = ?
               ORDER BY reported_at DESC"#
        ))?;

        let incidents = stmt
            .query_map(params![equipment_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(incidents)
    }

    /// 持久化一次状态转换（revision 校验）
    ///
    /// 覆盖 assign/start/resolve/close 四种转换的可变字段
    pub fn persist_transition(
        &self,
        incident: &Incident,
        expected_revision: i32,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let affected = conn.execute(
            r#"UPDATE incident
               SET status = ?,
                   assigned_to = ?,
                   assigned_at = ?,
                   resolved_at = ?,
                   closed_at = ?,
                   solution_text = ?,
                   actual_cost = ?,
                   requires_follow_up = ?,
                   equipment_out_of_service = ?,
                   updated_at = ?,
                   revision = revision + 1
               WHERE incident_id = ? AND revision = ?"#,
            params![
                incident.status.to_db_str(),
                &incident.assigned_to,
                incident.assigned_at.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
                incident.resolved_at.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
                incident.closed_at.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
                &incident.solution_text,
                &incident.actual_cost,
                incident.requires_follow_up as i32,
                incident.equipment_out_of_service as i32,
                incident.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                &incident.incident_id,
                expected_revision,
            ],
        )?;

        if affected == 0 {
            return Err(self.conflict_error(&conn, &incident.incident_id, expected_revision));
        }

        Ok(())
    }

    /// 条件更新失败时的错误定性
    fn conflict_error(
        &self,
        conn: &Connection,
        incident_id: &str,
        expected: i32,
    ) -> RepositoryError {
        match conn.query_row(
            "SELECT revision FROM incident WHERE incident_id = ?",
            params![incident_id],
            |row| row.get::<_, i32>(0),
        ) {
            Ok(actual) => RepositoryError::OptimisticLockFailure {
                entity: "Incident".to_string(),
                id: incident_id.to_string(),
                expected,
                actual,
            },
            Err(rusqlite::Error::QueryReturnedNoRows) => RepositoryError::NotFound {
                entity: "Incident".to_string(),
                id: incident_id.to_string(),
            },
            Err(e) => e.into(),
        }
    }

    // ==========================================
    // 统计查询（驾驶舱）
    // ==========================================

    /// 按状态统计事件数量
    pub fn count_by_status(&self) -> RepositoryResult<Vec<(IncidentStatus, i64)>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM incident GROUP BY status",
        )?;

        let rows = stmt.query_map([], |row| {
            let status_str: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((status_str, count))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            let (status_str, count) = row?;
            if let Some(status) = IncidentStatus::from_db_str(&status_str) {
                counts.push((status, count));
            }
        }

        Ok(counts)
    }

    /// 已解决事件的平均解决耗时（分钟）
    pub fn avg_resolution_minutes(&self) -> RepositoryResult<Option<f64>> {
        let conn = self.get_conn()?;

        let avg: Option<f64> = conn.query_row(
            r#"SELECT AVG((julianday(resolved_at) - julianday(reported_at)) * 24 * 60)
               FROM incident
               WHERE resolved_at IS NOT NULL"#,
            [],
            |row| row.get(0),
        )?;

        Ok(avg)
    }

    /// 映射数据库行到Incident对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Incident> {
        let severity_str: String = row.get(4)?;
        let impact_str: String = row.get(5)?;
        let status_str: String = row.get(7)?;

        Ok(Incident {
            incident_id: row.get(0)?,
            equipment_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            severity: Severity::from_db_str(&severity_str).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Text,
                    format!("未知严重度: {}", severity_str).into(),
                )
            })?,
            impact: Impact::from_db_str(&impact_str).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    5,
                    rusqlite::types::Type::Text,
                    format!("未知影响度: {}", impact_str).into(),
                )
            })?,
            category: row.get(6)?,
            status: IncidentStatus::from_db_str(&status_str).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    7,
                    rusqlite::types::Type::Text,
                    format!("未知事件状态: {}", status_str).into(),
                )
            })?,
            reported_by: row.get(8)?,
            assigned_to: row.get(9)?,
            reported_at: parse_datetime(row.get::<_, String>(10)?, 10)?,
            assigned_at: row
                .get::<_, Option<String>>(11)?
                .map(|s| parse_datetime(s, 11))
                .transpose()?,
            resolved_at: row
                .get::<_, Option<String>>(12)?
                .map(|s| parse_datetime(s, 12))
                .transpose()?,
            closed_at: row
                .get::<_, Option<String>>(13)?
                .map(|s| parse_datetime(s, 13))
                .transpose()?,
            solution_text: row.get(14)?,
            actual_cost: row.get(15)?,
            requires_follow_up: row.get::<_, i32>(16)? != 0,
            equipment_out_of_service: row.get::<_, i32>(17)? != 0,
            created_at: parse_datetime(row.get::<_, String>(18)?, 18)?,
            updated_at: parse_datetime(row.get::<_, String>(19)?, 19)?,
            revision: row.get(20)?,
        })
    }
}
