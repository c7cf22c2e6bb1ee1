// ==========================================
// 医疗设备维护管理系统 - 风险评分引擎
// ==========================================
// 职责: 时间窗内审计事件 → 有界风险评分 + 风险等级
// 输入: 审计事件列表(外部审计日志服务) + now + 窗口
// 输出: RiskAssessment (评分/等级/分量明细/处置建议)
// ==========================================
// 纯聚合引擎: 无副作用，now 由调用方传入
// ==========================================

use crate::domain::audit::AuditEvent;
use crate::domain::types::{AuditRiskLevel, RiskLevel};
use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use serde_json::json;

// ===== 事件权重 =====
const WEIGHT_HIGH: i32 = 15;
const WEIGHT_MEDIUM: i32 = 8;
const WEIGHT_LOW: i32 = 3;

/// 评分上限
pub const RISK_SCORE_CAP: i32 = 100;

// ===== 等级分档 =====
const BAND_CRITICAL: i32 = 70;
const BAND_HIGH: i32 = 50;
const BAND_MEDIUM: i32 = 30;

// ==========================================
// RiskAssessment - 风险评估结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: i32,                     // 风险评分 (0..=100)
    pub level: RiskLevel,               // 风险等级
    pub window_start: NaiveDateTime,    // 窗口起点
    pub window_end: NaiveDateTime,      // 窗口终点(now)
    pub event_count: usize,             // 窗口内事件总数
    pub high_count: usize,              // 高风险事件数
    pub medium_count: usize,            // 中风险事件数
    pub low_count: usize,               // 低风险事件数
    pub reason: serde_json::Value,      // 分量明细 (可解释性)
    pub recommendations: Vec<String>,   // 处置建议
}

// ==========================================
// RiskEngine - 风险评分引擎
// ==========================================
pub struct RiskEngine {
    // 无状态引擎,不需要注入依赖
}

impl RiskEngine {
    /// 构造函数
    pub fn new() -> Self {
        Self {}
    }

    /// 聚合时间窗内的审计事件
    ///
    /// 评分: HIGH=15 / MEDIUM=8 / LOW=3 加和，封顶100
    /// 分档: ≥70 CRITICAL, ≥50 HIGH, ≥30 MEDIUM, 其余 LOW
    pub fn assess(
        &self,
        events: &[AuditEvent],
        now: NaiveDateTime,
        window: TimeDelta,
    ) -> RiskAssessment {
        let window_start = now - window;

        let mut high_count = 0usize;
        let mut medium_count = 0usize;
        let mut low_count = 0usize;

        for event in events {
            if event.event_ts < window_start || event.event_ts > now {
                continue;
            }
            match event.risk_level {
                AuditRiskLevel::High => high_count += 1,
                AuditRiskLevel::Medium => medium_count += 1,
                AuditRiskLevel::Low => low_count += 1,
            }
        }

        let raw_score = high_count as i32 * WEIGHT_HIGH
            + medium_count as i32 * WEIGHT_MEDIUM
            + low_count as i32 * WEIGHT_LOW;
        let score = raw_score.min(RISK_SCORE_CAP);

        let level = if score >= BAND_CRITICAL {
            RiskLevel::Critical
        } else if score >= BAND_HIGH {
            RiskLevel::High
        } else if score >= BAND_MEDIUM {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        let event_count = high_count + medium_count + low_count;
        let recommendations = self.build_recommendations(level, high_count, score, raw_score);

        let reason = json!({
            "high": { "count": high_count, "weight": WEIGHT_HIGH },
            "medium": { "count": medium_count, "weight": WEIGHT_MEDIUM },
            "low": { "count": low_count, "weight": WEIGHT_LOW },
            "raw_score": raw_score,
            "capped": raw_score > RISK_SCORE_CAP,
        });

        RiskAssessment {
            score,
            level,
            window_start,
            window_end: now,
            event_count,
            high_count,
            medium_count,
            low_count,
            reason,
            recommendations,
        }
    }

    /// 生成处置建议
    fn build_recommendations(
        &self,
        level: RiskLevel,
        high_count: usize,
        score: i32,
        raw_score: i32,
    ) -> Vec<String> {
        let mut recommendations = Vec::new();

        if high_count > 0 {
            recommendations.push(format!(
                "窗口内存在{}条高风险审计事件，建议核查相关账号操作",
                high_count
            ));
        }
        if level >= RiskLevel::High {
            recommendations.push(format!("系统风险等级为{}，建议通知安全负责人", level));
        }
        if raw_score > score {
            recommendations.push("风险评分已达上限，实际事件量高于评分所示".to_string());
        }

        recommendations
    }
}

impl Default for RiskEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn dt(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    fn event(ts: NaiveDateTime, level: AuditRiskLevel) -> AuditEvent {
        AuditEvent {
            event_id: Uuid::new_v4().to_string(),
            event_ts: ts,
            actor_id: "user-1".to_string(),
            action: "LOGIN_FAILED".to_string(),
            risk_level: level,
            ip_address: Some("10.0.0.8".to_string()),
        }
    }

    #[test]
    fn test_weighted_sum_and_level_bands() {
        let engine = RiskEngine::new();
        let now = dt(10, 12);
        let window = TimeDelta::days(7);

        // 2高 + 1中 + 2低 = 30+8+6 = 44 → MEDIUM
        let events = vec![
            event(dt(9, 10), AuditRiskLevel::High),
            event(dt(8, 10), AuditRiskLevel::High),
            event(dt(7, 10), AuditRiskLevel::Medium),
            event(dt(6, 10), AuditRiskLevel::Low),
            event(dt(5, 10), AuditRiskLevel::Low),
        ];
        let assessment = engine.assess(&events, now, window);

        assert_eq!(assessment.score, 44);
        assert_eq!(assessment.level, RiskLevel::Medium);
        assert_eq!(assessment.event_count, 5);
        assert_eq!(assessment.high_count, 2);
    }

    #[test]
    fn test_score_capped_at_100() {
        let engine = RiskEngine::new();
        let now = dt(10, 12);

        let events: Vec<AuditEvent> =
            (0..20).map(|_| event(dt(9, 10), AuditRiskLevel::High)).collect();
        let assessment = engine.assess(&events, now, TimeDelta::days(7));

        assert_eq!(assessment.score, RISK_SCORE_CAP);
        assert_eq!(assessment.level, RiskLevel::Critical);
        assert!(assessment
            .recommendations
            .iter()
            .any(|r| r.contains("上限")));
    }

    #[test]
    fn test_events_outside_window_ignored() {
        let engine = RiskEngine::new();
        let now = dt(10, 12);

        let events = vec![
            event(dt(1, 10), AuditRiskLevel::High),  // 窗口前
            event(dt(11, 10), AuditRiskLevel::High), // now 之后
            event(dt(9, 10), AuditRiskLevel::Low),   // 窗口内
        ];
        let assessment = engine.assess(&events, now, TimeDelta::days(3));

        assert_eq!(assessment.event_count, 1);
        assert_eq!(assessment.score, 3);
        assert_eq!(assessment.level, RiskLevel::Low);
    }

    #[test]
    fn test_empty_window_is_low_risk() {
        let engine = RiskEngine::new();
        let assessment = engine.assess(&[], dt(10, 12), TimeDelta::days(30));

        assert_eq!(assessment.score, 0);
        assert_eq!(assessment.level, RiskLevel::Low);
        assert!(assessment.recommendations.is_empty());
    }
}
