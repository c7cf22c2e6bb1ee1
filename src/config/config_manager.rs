// ==========================================
// 医疗设备维护管理系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 读取策略: 缺失或解析失败时取默认值
// ==========================================

use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// 配置键全集
// ==========================================
pub mod config_keys {
    /// 临期预警窗口(天)
    pub const ALERT_WINDOW_DAYS: &str = "alert_window_days";
    /// 升级宽限期(分钟)，0 = 立即升级
    pub const ESCALATION_GRACE_MINUTES: &str = "escalation_grace_minutes";
    /// 事件上报时是否自动指派
    pub const AUTO_ASSIGN_ENABLED: &str = "auto_assign_enabled";
    /// 自动指派的技师角色
    pub const AUTO_ASSIGN_ROLE: &str = "auto_assign_role";
    /// 批量排程并发上限
    pub const BULK_WORKER_LIMIT: &str = "bulk_worker_limit";
    /// 上游调用超时(毫秒)
    pub const UPSTREAM_TIMEOUT_MS: &str = "upstream_timeout_ms";
    /// 风险评分时间窗(天)
    pub const RISK_WINDOW_DAYS: &str = "risk_window_days";
}

// ===== 默认值 =====
const DEFAULT_ALERT_WINDOW_DAYS: u32 = 30;
const DEFAULT_ESCALATION_GRACE_MINUTES: i64 = 0;
const DEFAULT_AUTO_ASSIGN_ENABLED: bool = true;
const DEFAULT_AUTO_ASSIGN_ROLE: &str = "TECHNICIAN";
const DEFAULT_BULK_WORKER_LIMIT: usize = 4;
const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_RISK_WINDOW_DAYS: i64 = 30;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 写入 global scope 配置值
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            r#"INSERT INTO config_kv (scope_id, key, value, updated_at)
               VALUES ('global', ?1, ?2, datetime('now'))
               ON CONFLICT(scope_id, key) DO UPDATE SET
                   value = excluded.value,
                   updated_at = datetime('now')"#,
            params![key, value],
        )?;

        Ok(())
    }

    /// 读取并解析；缺失或解析失败取默认值（解析失败记 warn）
    fn get_parsed_or<T: FromStr + Copy>(&self, key: &str, default: T) -> T {
        match self.get_config_value(key) {
            Ok(Some(raw)) => match raw.parse::<T>() {
                Ok(value) => value,
                Err(_) => {
                    warn!(key = key, raw = %raw, "配置值解析失败，使用默认值");
                    default
                }
            },
            Ok(None) => default,
            Err(e) => {
                warn!(key = key, error = %e, "配置读取失败，使用默认值");
                default
            }
        }
    }

    // ==========================================
    // 类型化读取接口
    // ==========================================

    /// 临期预警窗口(天)
    pub fn alert_window_days(&self) -> u32 {
        self.get_parsed_or(config_keys::ALERT_WINDOW_DAYS, DEFAULT_ALERT_WINDOW_DAYS)
    }

    /// 升级宽限期(分钟)；0 表示高危事件立即升级
    pub fn escalation_grace_minutes(&self) -> i64 {
        self.get_parsed_or(
            config_keys::ESCALATION_GRACE_MINUTES,
            DEFAULT_ESCALATION_GRACE_MINUTES,
        )
    }

    /// 事件上报时是否自动指派
    pub fn auto_assign_enabled(&self) -> bool {
        match self.get_config_value(config_keys::AUTO_ASSIGN_ENABLED) {
            Ok(Some(raw)) => matches!(raw.trim(), "1" | "true" | "TRUE" | "on"),
            Ok(None) => DEFAULT_AUTO_ASSIGN_ENABLED,
            Err(e) => {
                warn!(error = %e, "配置读取失败，使用默认值");
                DEFAULT_AUTO_ASSIGN_ENABLED
            }
        }
    }

    /// 自动指派的技师角色
    pub fn auto_assign_role(&self) -> String {
        match self.get_config_value(config_keys::AUTO_ASSIGN_ROLE) {
            Ok(Some(raw)) if !raw.trim().is_empty() => raw,
            _ => DEFAULT_AUTO_ASSIGN_ROLE.to_string(),
        }
    }

    /// 批量排程并发上限（最少为1）
    pub fn bulk_worker_limit(&self) -> usize {
        self.get_parsed_or(config_keys::BULK_WORKER_LIMIT, DEFAULT_BULK_WORKER_LIMIT)
            .max(1)
    }

    /// 上游调用超时(毫秒)
    pub fn upstream_timeout_ms(&self) -> u64 {
        self.get_parsed_or(config_keys::UPSTREAM_TIMEOUT_MS, DEFAULT_UPSTREAM_TIMEOUT_MS)
    }

    /// 风险评分时间窗(天)
    pub fn risk_window_days(&self) -> i64 {
        self.get_parsed_or(config_keys::RISK_WINDOW_DAYS, DEFAULT_RISK_WINDOW_DAYS)
    }
}
