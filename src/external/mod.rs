// ==========================================
// 医疗设备维护管理系统 - 外部协作方接口
// ==========================================
// 职责: 定义引擎消费的外部服务窄接口
// - EquipmentStore: 设备主数据(外部 CRUD 服务所有)
// - TechnicianDirectory: 技师名录
// - AuditLog: 审计日志(只读)
// - Clock: 时钟(进程内，无需超时包装)
// 红线: 业务逻辑不得直接访问全局状态，
//       协作方一律通过构造注入
// ==========================================

pub mod sqlite;

use crate::domain::audit::AuditEvent;
use crate::domain::equipment::{EquipmentRecord, Technician};
use crate::domain::types::EquipmentStatus;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

pub use sqlite::{SqliteAuditLog, SqliteEquipmentStore, SqliteTechnicianDirectory};

// ==========================================
// 上游调用错误
// ==========================================

/// 外部协作方调用错误
///
/// 两类都视为瞬态，调用方可重试；引擎自身不重试
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("上游调用超时: {collaborator}")]
    Timeout { collaborator: String },

    #[error("上游服务不可用: {collaborator}: {message}")]
    Unavailable { collaborator: String, message: String },
}

impl UpstreamError {
    pub fn unavailable(collaborator: &str, message: impl Into<String>) -> Self {
        UpstreamError::Unavailable {
            collaborator: collaborator.to_string(),
            message: message.into(),
        }
    }
}

/// 包装上游调用并施加超时
///
/// 超时到期 → UpstreamError::Timeout，当前操作整体中止（无部分写入）
pub async fn with_timeout<T, F>(
    collaborator: &str,
    timeout_ms: u64,
    fut: F,
) -> Result<T, UpstreamError>
where
    F: Future<Output = Result<T, UpstreamError>>,
{
    match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
        Ok(result) => result,
        Err(_) => Err(UpstreamError::Timeout {
            collaborator: collaborator.to_string(),
        }),
    }
}

// ==========================================
// EquipmentStore - 设备主数据接口
// ==========================================

/// 设备主数据访问接口
///
/// 引擎只读取设备引用，并在完成维护/事件升级时回写
/// 维护日期与运行状态——这是引擎对外部状态唯一的副作用
#[async_trait]
pub trait EquipmentStore: Send + Sync {
    /// 按ID取设备引用；不存在时返回 None
    async fn get(&self, equipment_id: &str) -> Result<Option<EquipmentRecord>, UpstreamError>;

    /// 回写维护日期（完成维护后；两个字段按传入值整体覆盖，
    /// 补偿回滚时用于精确还原）
    async fn update_maintenance_dates(
        &self,
        equipment_id: &str,
        last_maintenance_date: Option<NaiveDate>,
        next_maintenance_date: Option<NaiveDate>,
    ) -> Result<(), UpstreamError>;

    /// 回写运行状态（事件升级停用/解决恢复）
    async fn update_status(
        &self,
        equipment_id: &str,
        status: EquipmentStatus,
    ) -> Result<(), UpstreamError>;
}

// ==========================================
// TechnicianDirectory - 技师名录接口
// ==========================================
#[async_trait]
pub trait TechnicianDirectory: Send + Sync {
    /// 查询指定角色的可用技师
    async fn available_by_role(&self, role: &str) -> Result<Vec<Technician>, UpstreamError>;
}

// ==========================================
// AuditLog - 审计日志接口（只读）
// ==========================================
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// 查询时间窗内的审计事件
    async fn query_window(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<AuditEvent>, UpstreamError>;
}

// ==========================================
// Clock - 时钟接口
// ==========================================

/// 时钟接口
///
/// 引擎内不直接读系统时钟，便于测试固定时间
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// 系统时钟（本地时区）
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// 固定时钟（测试/重放用）
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// 拨动时钟
    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result: Result<(), UpstreamError> = with_timeout("equipment", 10, async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;

        match result {
            Err(UpstreamError::Timeout { collaborator }) => assert_eq!(collaborator, "equipment"),
            other => panic!("expected timeout, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_with_timeout_passes_through() {
        let result = with_timeout("equipment", 1_000, async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_fixed_clock() {
        let t0 = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(8, 0, 0).unwrap();
        let t1 = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap().and_hms_opt(8, 0, 0).unwrap();

        let clock = FixedClock::new(t0);
        assert_eq!(clock.now(), t0);
        clock.set(t1);
        assert_eq!(clock.now(), t1);
        assert_eq!(clock.today(), t1.date());
    }
}
