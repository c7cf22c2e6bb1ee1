// ==========================================
// 医疗设备维护管理系统 - 操作日志仓储
// ==========================================
// 只增不改: 操作日志仅支持插入与查询
// ==========================================

use crate::domain::action_log::{ActionLog, ActionType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::task_repo::parse_datetime;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
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

    /// 写入一条操作日志
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO action_log (
                action_id, action_type, entity_id, equipment_id,
                actor, action_ts, payload_json, detail
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &log.action_id,
                log.action_type.to_db_str(),
                &log.entity_id,
                &log.equipment_id,
                &log.actor,
                log.action_ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                log.payload_json.as_ref().map(|v| v.to_string()),
                &log.detail,
            ],
        )?;

        Ok(log.action_id.clone())
    }

    /// 查询某实体的操作历史（时间升序）
    pub fn find_by_entity(&self, entity_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT action_id, action_type, entity_id, equipment_id,
                      actor, action_ts, payload_json, detail
               FROM action_log
               WHERE entity_id = ?
               ORDER BY action_ts ASC"#,
        )?;

        let logs = stmt
            .query_map(params![entity_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(logs)
    }

    /// 映射数据库行到ActionLog对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ActionLog> {
        let type_str: String = row.get(1)?;
        let payload_str: Option<String> = row.get(6)?;

        Ok(ActionLog {
            action_id: row.get(0)?,
            action_type: ActionType::from_db_str(&type_str).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    1,
                    rusqlite::types::Type::Text,
                    format!("未知操作类型: {}", type_str).into(),
                )
            })?,
            entity_id: row.get(2)?,
            equipment_id: row.get(3)?,
            actor: row.get(4)?,
            action_ts: parse_datetime(row.get::<_, String>(5)?, 5)?,
            payload_json: payload_str.and_then(|s| serde_json::from_str(&s).ok()),
            detail: row.get(7)?,
        })
    }
}
