// ==========================================
// 医疗设备维护管理系统 - 应急事件分诊引擎
// ==========================================
// 职责: 严重度+影响度+响应时长 → 优先级评分
// 评分为加法制，各分量分档封顶，总分不另设上限
// ==========================================
// 纯函数引擎: now 由调用方传入，无时钟依赖
// ==========================================

use crate::domain::incident::Incident;
use crate::domain::types::{Impact, Severity};
use chrono::{NaiveDateTime, TimeDelta};

// ===== 时间升级档位（小时，互斥取高档） =====
const AGE_BRACKET_HIGH_HOURS: i64 = 24;
const AGE_BRACKET_LOW_HOURS: i64 = 8;

// ==========================================
// TriageEngine - 分诊引擎
// ==========================================
pub struct TriageEngine {
    // 无状态引擎,不需要注入依赖
}

impl TriageEngine {
    /// 构造函数
    pub fn new() -> Self {
        Self {}
    }

    /// 计算事件优先级评分
    ///
    /// 分量:
    /// - 严重度: LOW=10 / MEDIUM=20 / HIGH=30 / CRITICAL=40
    /// - 影响度: NONE=5 / LOW=10 / MEDIUM=20 / HIGH=30 / CRITICAL=30(封顶)
    /// - 响应时长: >24h +20，否则 >8h +10（互斥，只取高档）
    pub fn score(
        &self,
        severity: Severity,
        impact: Impact,
        reported_at: NaiveDateTime,
        now: NaiveDateTime,
    ) -> i32 {
        Self::severity_points(severity) + Self::impact_points(impact)
            + Self::age_points(reported_at, now)
    }

    /// 对事件实体求分（读取时派生，不落库）
    pub fn score_incident(&self, incident: &Incident, now: NaiveDateTime) -> i32 {
        self.score(incident.severity, incident.impact, incident.reported_at, now)
    }

    /// 严重度是否触发自动升级（设备停用）
    pub fn requires_escalation(&self, severity: Severity) -> bool {
        matches!(severity, Severity::High | Severity::Critical)
    }

    fn severity_points(severity: Severity) -> i32 {
        match severity {
            Severity::Low => 10,
            Severity::Medium => 20,
            Severity::High => 30,
            Severity::Critical => 40,
        }
    }

    fn impact_points(impact: Impact) -> i32 {
        match impact {
            Impact::None => 5,
            Impact::Low => 10,
            Impact::Medium => 20,
            // HIGH 与 CRITICAL 同档: 影响度分量封顶30
            Impact::High => 30,
            Impact::Critical => 30,
        }
    }

    fn age_points(reported_at: NaiveDateTime, now: NaiveDateTime) -> i32 {
        let age_hours = (now - reported_at).max(TimeDelta::zero()).num_hours();
        if age_hours > AGE_BRACKET_HIGH_HOURS {
            20
        } else if age_hours > AGE_BRACKET_LOW_HOURS {
            10
        } else {
            0
        }
    }
}

impl Default for TriageEngine {
    fn default() -> Self {
        Self::new()
    }
}
