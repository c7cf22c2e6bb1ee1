// ==========================================
// 医疗设备维护管理系统 - 逾期/临期检测引擎
// ==========================================
// 职责: 将任务划分为 逾期(vencido) / 临期(próximo) / 正常
// 输入: 任务列表 + 调用方提供的 today + 预警窗口天数
// 输出: 三个互斥桶的完全划分
// ==========================================
// 纯分类引擎: 不读系统时钟，today 由调用方传入
// ==========================================

use crate::domain::maintenance::MaintenanceTask;
use crate::domain::types::TaskStatus;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

// ==========================================
// ScheduleClassification - 分类结果
// ==========================================
// 划分不变式: 每个非终态任务恰好落入一个桶
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleClassification {
    pub overdue: Vec<MaintenanceTask>,  // 逾期
    pub due_soon: Vec<MaintenanceTask>, // 临期(预警窗口内)
    pub on_track: Vec<MaintenanceTask>, // 正常
}

impl ScheduleClassification {
    /// 非终态任务总数
    pub fn total(&self) -> usize {
        self.overdue.len() + self.due_soon.len() + self.on_track.len()
    }
}

// ==========================================
// ScheduleClassifier - 逾期/临期检测引擎
// ==========================================
pub struct ScheduleClassifier {
    // 无状态引擎,不需要注入依赖
}

impl ScheduleClassifier {
    /// 构造函数
    pub fn new() -> Self {
        Self {}
    }

    /// 分类任务列表
    ///
    /// 规则:
    /// - 终态任务(已完成/已取消)直接剔除
    /// - SCHEDULED 且 scheduled_date < today → 逾期
    /// - SCHEDULED 且 today ≤ scheduled_date ≤ today+窗口 → 临期
    /// - 其余非终态任务(含 IN_PROGRESS) → 正常
    pub fn classify(
        &self,
        tasks: Vec<MaintenanceTask>,
        today: NaiveDate,
        alert_window_days: u32,
    ) -> ScheduleClassification {
        let window_end = today
            .checked_add_days(Days::new(alert_window_days as u64))
            .unwrap_or(NaiveDate::MAX);

        let mut result = ScheduleClassification::default();

        for task in tasks {
            if task.status.is_terminal() {
                continue;
            }

            if task.status != TaskStatus::Scheduled {
                // 执行中的任务已在处理，不再告警
                result.on_track.push(task);
                continue;
            }

            if task.scheduled_date < today {
                result.overdue.push(task);
            } else if task.scheduled_date <= window_end {
                result.due_soon.push(task);
            } else {
                result.on_track.push(task);
            }
        }

        result
    }
}

impl Default for ScheduleClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{TaskKind, TaskPriority};
    use std::collections::HashSet;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn task(scheduled: NaiveDate, status: TaskStatus) -> MaintenanceTask {
        let mut t = MaintenanceTask::new_scheduled(
            "EQ-001",
            TaskKind::Preventive,
            scheduled,
            TaskPriority::Medium,
            None,
            d(2024, 1, 1).and_hms_opt(8, 0, 0).unwrap(),
        );
        t.status = status;
        t
    }

    #[test]
    fn test_past_scheduled_date_is_overdue() {
        // 2024-01-01 排程，now=2024-01-10，窗口7天 → 逾期而非临期
        let classifier = ScheduleClassifier::new();
        let result = classifier.classify(
            vec![task(d(2024, 1, 1), TaskStatus::Scheduled)],
            d(2024, 1, 10),
            7,
        );

        assert_eq!(result.overdue.len(), 1);
        assert!(result.due_soon.is_empty());
        assert!(result.on_track.is_empty());
    }

    #[test]
    fn test_window_boundaries() {
        let classifier = ScheduleClassifier::new();
        let today = d(2024, 1, 10);

        // 当日到期 → 临期（不是逾期）
        let result = classifier.classify(vec![task(today, TaskStatus::Scheduled)], today, 7);
        assert_eq!(result.due_soon.len(), 1);

        // 窗口最后一天 → 临期
        let result =
            classifier.classify(vec![task(d(2024, 1, 17), TaskStatus::Scheduled)], today, 7);
        assert_eq!(result.due_soon.len(), 1);

        // 窗口外一天 → 正常
        let result =
            classifier.classify(vec![task(d(2024, 1, 18), TaskStatus::Scheduled)], today, 7);
        assert_eq!(result.on_track.len(), 1);
    }

    #[test]
    fn test_terminal_tasks_excluded() {
        let classifier = ScheduleClassifier::new();
        let result = classifier.classify(
            vec![
                task(d(2024, 1, 1), TaskStatus::Completed),
                task(d(2024, 1, 1), TaskStatus::Cancelled),
            ],
            d(2024, 1, 10),
            7,
        );
        assert_eq!(result.total(), 0);
    }

    #[test]
    fn test_in_progress_is_on_track() {
        let classifier = ScheduleClassifier::new();
        let result = classifier.classify(
            vec![task(d(2024, 1, 1), TaskStatus::InProgress)],
            d(2024, 1, 10),
            7,
        );
        assert_eq!(result.on_track.len(), 1);
    }

    #[test]
    fn test_partition_totality() {
        // 划分完全性: 每个非终态任务恰好出现在一个桶中
        let classifier = ScheduleClassifier::new();
        let today = d(2024, 6, 15);

        let mut tasks = Vec::new();
        for offset in -30i64..=30 {
            let date = if offset < 0 {
                today.checked_sub_days(Days::new(offset.unsigned_abs())).unwrap()
            } else {
                today.checked_add_days(Days::new(offset as u64)).unwrap()
            };
            tasks.push(task(date, TaskStatus::Scheduled));
        }
        let non_terminal = tasks.len();

        let result = classifier.classify(tasks, today, 10);

        assert_eq!(result.total(), non_terminal);

        // 三桶互斥
        let mut seen = HashSet::new();
        for t in result
            .overdue
            .iter()
            .chain(result.due_soon.iter())
            .chain(result.on_track.iter())
        {
            assert!(seen.insert(t.task_id.clone()), "任务出现在多个桶中: {}", t.task_id);
        }
    }
}
