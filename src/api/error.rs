// ==========================================
// 医疗设备维护管理系统 - API层错误类型
// ==========================================
// 职责: 定义业务错误分类，转换仓储/上游错误为
//       用户可读的错误消息
// 约束: 内部堆栈与存储细节不跨越 API 边界
// ==========================================

use crate::external::UpstreamError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
///
/// 所有错误信息必须包含显式原因（可解释性）
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 校验错误（立即返回，不重试）
    // ==========================================
    #[error("无效日期: {0}")]
    InvalidDate(String),

    #[error("设备不存在: equipment_id={equipment_id}")]
    UnknownEquipment { equipment_id: String },

    #[error("无效输入: {0}")]
    InvalidInput(String),

    // ==========================================
    // 状态机错误
    // ==========================================
    #[error("任务已进入终态: task_id={task_id}, status={status}")]
    AlreadyTerminal { task_id: String, status: String },

    #[error("事件已解决/关闭: incident_id={incident_id}, status={status}")]
    AlreadyResolved { incident_id: String, status: String },

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ==========================================
    // 并发控制错误（由调用方决定是否重试）
    // ==========================================
    #[error("并发修改冲突: {entity} id={id}，请重新读取后重试")]
    ConcurrentModification { entity: String, id: String },

    // ==========================================
    // 上游协作方错误（瞬态，可重试）
    // ==========================================
    #[error("上游调用超时: {collaborator}")]
    UpstreamTimeout { collaborator: String },

    #[error("上游服务不可用: {collaborator}: {message}")]
    UpstreamUnavailable { collaborator: String, message: String },

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 是否建议调用方重试
    ///
    /// 并发冲突与上游瞬态失败可重试；校验错误不可重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::ConcurrentModification { .. }
                | ApiError::UpstreamTimeout { .. }
                | ApiError::UpstreamUnavailable { .. }
        )
    }
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将仓储层的技术错误转换为业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 并发控制错误
            RepositoryError::OptimisticLockFailure { entity, id, .. } => {
                ApiError::ConcurrentModification { entity, id }
            }

            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg)
            | RepositoryError::DatabaseTransactionError(msg)
            | RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }

            // 业务规则错误
            RepositoryError::BusinessRuleViolation(msg) => ApiError::BusinessRuleViolation(msg),
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }

            // 数据质量错误
            RepositoryError::ValidationError(msg) => ApiError::InvalidInput(msg),

            // 通用错误
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 UpstreamError 转换
// ==========================================
impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Timeout { collaborator } => ApiError::UpstreamTimeout { collaborator },
            UpstreamError::Unavailable {
                collaborator,
                message,
            } => ApiError::UpstreamUnavailable {
                collaborator,
                message,
            },
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimistic_lock_conversion() {
        let repo_err = RepositoryError::OptimisticLockFailure {
            entity: "MaintenanceTask".to_string(),
            id: "task-1".to_string(),
            expected: 1,
            actual: 2,
        };
        let api_err: ApiError = repo_err.into();
        match api_err {
            ApiError::ConcurrentModification { entity, id } => {
                assert_eq!(entity, "MaintenanceTask");
                assert_eq!(id, "task-1");
            }
            other => panic!("Expected ConcurrentModification, got {:?}", other),
        }
    }

    #[test]
    fn test_not_found_conversion() {
        let repo_err = RepositoryError::NotFound {
            entity: "Incident".to_string(),
            id: "inc-1".to_string(),
        };
        let api_err: ApiError = repo_err.into();
        match api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("Incident"));
                assert!(msg.contains("inc-1"));
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_upstream_conversion() {
        let api_err: ApiError = UpstreamError::Timeout {
            collaborator: "equipment".to_string(),
        }
        .into();
        assert!(matches!(api_err, ApiError::UpstreamTimeout { .. }));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ApiError::ConcurrentModification {
            entity: "Incident".to_string(),
            id: "inc-1".to_string(),
        }
        .is_retryable());
        assert!(ApiError::UpstreamTimeout {
            collaborator: "equipment".to_string(),
        }
        .is_retryable());

        assert!(!ApiError::InvalidDate("过去日期".to_string()).is_retryable());
        assert!(!ApiError::UnknownEquipment {
            equipment_id: "EQ-404".to_string(),
        }
        .is_retryable());
        assert!(!ApiError::AlreadyTerminal {
            task_id: "task-1".to_string(),
            status: "COMPLETED".to_string(),
        }
        .is_retryable());
    }
}
