// ==========================================
// 医疗设备维护管理系统 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎,不拼 SQL
// 红线: Engine 不拼 SQL, 所有规则必须输出 reason
// 纯引擎不读系统时钟, now/today 由调用方传入
// ==========================================

pub mod allocation;
pub mod detector;
pub mod events;
pub mod frequency;
pub mod risk;
pub mod triage;

// 重导出核心引擎
pub use allocation::{AllocationStrategy, FirstAvailableAllocator};
pub use detector::{ScheduleClassification, ScheduleClassifier};
pub use events::{
    EngineEvent, EngineEventPublisher, EngineEventType, NoOpEventPublisher, OptionalEventPublisher,
};
pub use frequency::FrequencyResolver;
pub use risk::{RiskAssessment, RiskEngine, RISK_SCORE_CAP};
pub use triage::TriageEngine;
