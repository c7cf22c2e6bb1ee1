// ==========================================
// 医疗设备维护管理系统 - 维护任务仓储
// ==========================================
// 并发控制: 所有状态转换按 revision 乐观锁校验，
// 冲突返回 OptimisticLockFailure，由调用方决定是否重试
// ==========================================

use crate::domain::maintenance::MaintenanceTask;
use crate::domain::types::{TaskKind, TaskPriority, TaskStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

const TASK_COLUMNS: &str = r#"task_id, equipment_id, kind, status, priority,
           scheduled_date, completed_date, cancel_reason, assigned_technician_id,
           actual_cost, actual_duration_minutes, notes, chained_from_task_id,
           created_at, updated_at, revision"#;

// ==========================================
// MaintenanceTaskRepository - 维护任务仓储
// ==========================================
pub struct MaintenanceTaskRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MaintenanceTaskRepository {
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

    /// 创建任务
    pub fn create(&self, task: &MaintenanceTask) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        Self::insert_task(&conn, task)?;
        Ok(task.task_id.clone())
    }

    /// 按task_id查询任务
    pub fn find_by_id(&self, task_id: &str) -> RepositoryResult<Option<MaintenanceTask>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            &format!("SELECT {TASK_COLUMNS} FROM maintenance_task WHERE task_id = ?"),
            params![task_id],
            Self::map_row,
        ) {
            Ok(task) => Ok(Some(task)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询所有非终态任务（逾期检测输入）
    pub fn list_non_terminal(&self) -> RepositoryResult<Vec<MaintenanceTask>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            r#"SELECT {TASK_COLUMNS} FROM maintenance_task
               WHERE status IN ('SCHEDULED', 'IN_PROGRESS')
               ORDER BY scheduled_date ASC"#
        ))?;

        let tasks = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tasks)
    }

    /// 按设备查询任务（含历史）
    pub fn list_by_equipment(&self, equipment_id: &str) -> RepositoryResult<Vec<MaintenanceTask>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            r#"SELECT {TASK_COLUMNS} FROM maintenance_task
               WHERE equipment_id = ?
               ORDER BY scheduled_date DESC"#
        ))?;

        let tasks = stmt
            .query_map(params![equipment_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tasks)
    }

    /// 按状态查询任务
    pub fn list_by_status(&self, status: TaskStatus) -> RepositoryResult<Vec<MaintenanceTask>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            r#"SELECT {TASK_COLUMNS} FROM maintenance_task
               WHERE status = ?
               ORDER BY scheduled_date ASC"#
        ))?;

        let tasks = stmt
            .query_map(params![status.to_db_str()], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tasks)
    }

    /// 完成任务并（可选地）在同一事务内插入递推后继
    ///
    /// 全有或全无: 状态翻转与后继插入同事务提交；
    /// revision 不匹配或任务已进入终态时不产生任何写入。
    #[allow(clippy::too_many_arguments)]
    pub fn complete_and_chain(
        &self,
        task_id: &str,
        expected_revision: i32,
        completed_date: NaiveDate,
        actual_cost: Option<f64>,
        actual_duration_minutes: Option<i64>,
        notes: Option<&str>,
        now: NaiveDateTime,
        successor: Option<&MaintenanceTask>,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let affected = tx.execute(
            r#"UPDATE maintenance_task
               SET status = 'COMPLETED',
                   completed_date = ?,
                   actual_cost = COALESCE(?, actual_cost),
                   actual_duration_minutes = COALESCE(?, actual_duration_minutes),
                   notes = COALESCE(?, notes),
                   updated_at = ?,
                   revision = revision + 1
               WHERE task_id = ? AND revision = ?
                 AND status IN ('SCHEDULED', 'IN_PROGRESS')"#,
            params![
                completed_date.format("%Y-%m-%d").to_string(),
                actual_cost,
                actual_duration_minutes,
                notes,
                now.format("%Y-%m-%d %H:%M:%S").to_string(),
                task_id,
                expected_revision,
            ],
        )?;

        if affected == 0 {
            return Err(self.conflict_error(&tx, task_id, expected_revision));
        }

        if let Some(succ) = successor {
            Self::insert_task(&tx, succ)?;
        }

        tx.commit()?;
        Ok(())
    }

    /// 取消任务（revision 校验）
    pub fn cancel(
        &self,
        task_id: &str,
        expected_revision: i32,
        reason: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let affected = tx.execute(
            r#"UPDATE maintenance_task
               SET status = 'CANCELLED',
                   cancel_reason = ?,
                   updated_at = ?,
                   revision = revision + 1
               WHERE task_id = ? AND revision = ?
                 AND status IN ('SCHEDULED', 'IN_PROGRESS')"#,
            params![
                reason,
                now.format("%Y-%m-%d %H:%M:%S").to_string(),
                task_id,
                expected_revision,
            ],
        )?;

        if affected == 0 {
            return Err(self.conflict_error(&tx, task_id, expected_revision));
        }

        tx.commit()?;
        Ok(())
    }

    /// 条件更新失败时的错误定性
    ///
    /// 行不存在 → NotFound；行存在 → 乐观锁冲突（含终态竞争）
    fn conflict_error(
        &self,
        conn: &Connection,
        task_id: &str,
        expected: i32,
    ) -> RepositoryError {
        match conn.query_row(
            "SELECT revision FROM maintenance_task WHERE task_id = ?",
            params![task_id],
            |row| row.get::<_, i32>(0),
        ) {
            Ok(actual) => RepositoryError::OptimisticLockFailure {
                entity: "MaintenanceTask".to_string(),
                id: task_id.to_string(),
                expected,
                actual,
            },
            Err(rusqlite::Error::QueryReturnedNoRows) => RepositoryError::NotFound {
                entity: "MaintenanceTask".to_string(),
                id: task_id.to_string(),
            },
            Err(e) => e.into(),
        }
    }

    /// 插入任务行（create 与事务内后继插入共用）
    fn insert_task(conn: &Connection, task: &MaintenanceTask) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO maintenance_task (
                task_id, equipment_id, kind, status, priority,
                scheduled_date, completed_date, cancel_reason, assigned_technician_id,
                actual_cost, actual_duration_minutes, notes, chained_from_task_id,
                created_at, updated_at, revision
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &task.task_id,
                &task.equipment_id,
                task.kind.to_db_str(),
                task.status.to_db_str(),
                task.priority.to_db_str(),
                task.scheduled_date.format("%Y-%m-%d").to_string(),
                task.completed_date.map(|d| d.format("%Y-%m-%d").to_string()),
                &task.cancel_reason,
                &task.assigned_technician_id,
                &task.actual_cost,
                &task.actual_duration_minutes,
                &task.notes,
                &task.chained_from_task_id,
                task.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                task.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                &task.revision,
            ],
        )?;
        Ok(())
    }

    /// 映射数据库行到MaintenanceTask对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<MaintenanceTask> {
        let kind_str: String = row.get(2)?;
        let status_str: String = row.get(3)?;
        let priority_str: String = row.get(4)?;

        Ok(MaintenanceTask {
            task_id: row.get(0)?,
            equipment_id: row.get(1)?,
            kind: TaskKind::from_db_str(&kind_str).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    format!("未知任务类型: {}", kind_str).into(),
                )
            })?,
            status: TaskStatus::from_db_str(&status_str).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    format!("未知任务状态: {}", status_str).into(),
                )
            })?,
            priority: TaskPriority::from_db_str(&priority_str).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Text,
                    format!("未知优先级: {}", priority_str).into(),
                )
            })?,
            scheduled_date: parse_date(row.get::<_, String>(5)?, 5)?,
            completed_date: row
                .get::<_, Option<String>>(6)?
                .map(|s| parse_date(s, 6))
                .transpose()?,
            cancel_reason: row.get(7)?,
            assigned_technician_id: row.get(8)?,
            actual_cost: row.get(9)?,
            actual_duration_minutes: row.get(10)?,
            notes: row.get(11)?,
            chained_from_task_id: row.get(12)?,
            created_at: parse_datetime(row.get::<_, String>(13)?, 13)?,
            updated_at: parse_datetime(row.get::<_, String>(14)?, 14)?,
            revision: row.get(15)?,
        })
    }
}

/// 解析 YYYY-MM-DD 日期列
pub(crate) fn parse_date(s: String, idx: usize) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// 解析 YYYY-MM-DD HH:MM:SS 时间列
pub(crate) fn parse_datetime(s: String, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
