// ==========================================
// 医疗设备维护管理系统 - 引擎层事件发布
// ==========================================
// 职责: 定义引擎事件发布 trait，实现依赖倒置
// 说明: Engine 层定义 trait，通知服务侧实现适配器
// 消费方: 外部通知服务(邮件/短信推送不在本系统范围)
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 引擎事件类型
// ==========================================

/// 引擎事件触发类型
///
/// Engine 层定义的事件类型，用于通知下游系统
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEventType {
    /// 维护任务已排程
    TaskScheduled,
    /// 维护任务已完成
    TaskCompleted,
    /// 维护任务已取消
    TaskCancelled,
    /// 应急事件已上报
    IncidentReported,
    /// 应急事件已升级(设备停用)
    IncidentEscalated,
    /// 应急事件已指派
    IncidentAssigned,
    /// 应急事件已解决
    IncidentResolved,
    /// 应急事件已关闭
    IncidentClosed,
}

impl EngineEventType {
    /// 转换为字符串标识
    pub fn as_str(&self) -> &str {
        match self {
            EngineEventType::TaskScheduled => "TaskScheduled",
            EngineEventType::TaskCompleted => "TaskCompleted",
            EngineEventType::TaskCancelled => "TaskCancelled",
            EngineEventType::IncidentReported => "IncidentReported",
            EngineEventType::IncidentEscalated => "IncidentEscalated",
            EngineEventType::IncidentAssigned => "IncidentAssigned",
            EngineEventType::IncidentResolved => "IncidentResolved",
            EngineEventType::IncidentClosed => "IncidentClosed",
        }
    }
}

/// 引擎事件
///
/// 包含实体ID、设备ID与发生时间，payload 携带事件相关负载
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEvent {
    /// 事件类型
    pub event_type: EngineEventType,
    /// 关联实体(任务/事件)ID
    pub entity_id: String,
    /// 关联设备ID
    pub equipment_id: String,
    /// 发生时间
    pub occurred_at: NaiveDateTime,
    /// 事件负载
    pub payload: Option<serde_json::Value>,
}

impl EngineEvent {
    /// 创建事件
    pub fn new(
        event_type: EngineEventType,
        entity_id: &str,
        equipment_id: &str,
        occurred_at: NaiveDateTime,
    ) -> Self {
        Self {
            event_type,
            entity_id: entity_id.to_string(),
            equipment_id: equipment_id.to_string(),
            occurred_at,
            payload: None,
        }
    }

    /// 附加负载
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 引擎事件发布者 Trait
///
/// Engine 层定义，通知服务适配器实现
pub trait EngineEventPublisher: Send + Sync {
    /// 发布引擎事件
    ///
    /// # 返回
    /// - `Ok(())`: 已入队/已投递
    /// - `Err`: 发布失败（调用方只记日志，不阻断业务操作）
    fn publish(&self, event: EngineEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
///
/// 用于不需要事件发布的场景（如单元测试）
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl EngineEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: EngineEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - entity_id={}, event_type={}",
            event.entity_id,
            event.event_type.as_str()
        );
        Ok(())
    }
}

/// 可选的事件发布者包装
///
/// 简化 Option<Arc<dyn EngineEventPublisher>> 的使用
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn EngineEventPublisher>>,
}

impl OptionalEventPublisher {
    /// 创建带发布者的实例
    pub fn with_publisher(publisher: Arc<dyn EngineEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    /// 创建空实例（不发布事件）
    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件（如果有发布者）；失败只记日志
    pub fn publish_quietly(&self, event: EngineEvent) {
        if let Some(publisher) = &self.inner {
            let event_type = event.event_type;
            let entity_id = event.entity_id.clone();
            if let Err(e) = publisher.publish(event) {
                tracing::warn!(
                    entity_id = %entity_id,
                    event_type = event_type.as_str(),
                    error = %e,
                    "事件发布失败"
                );
            }
        }
    }

    /// 检查是否配置了发布者
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    struct CollectingPublisher {
        events: Mutex<Vec<EngineEvent>>,
    }

    impl EngineEventPublisher for CollectingPublisher {
        fn publish(&self, event: EngineEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    #[test]
    fn test_optional_publisher_forwards() {
        let publisher = Arc::new(CollectingPublisher {
            events: Mutex::new(Vec::new()),
        });
        let optional = OptionalEventPublisher::with_publisher(publisher.clone());
        assert!(optional.is_configured());

        let occurred = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        optional.publish_quietly(EngineEvent::new(
            EngineEventType::TaskScheduled,
            "task-1",
            "EQ-001",
            occurred,
        ));

        let events = publisher.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EngineEventType::TaskScheduled);
    }

    #[test]
    fn test_none_publisher_is_silent() {
        let optional = OptionalEventPublisher::none();
        assert!(!optional.is_configured());

        let occurred = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        // 不配置发布者时不报错
        optional.publish_quietly(EngineEvent::new(
            EngineEventType::IncidentReported,
            "inc-1",
            "EQ-001",
            occurred,
        ));
    }
}
