// ==========================================
// 并发控制测试
// ==========================================
// 职责: 验证乐观锁下 Complete/Cancel 的互斥性——
// 并发竞争时恰好一方成功，失败方得到可重试错误，
// 不发生静默覆盖
// ==========================================


use med_cmms::api::error::ApiError;
use med_cmms::api::{CompleteTaskRequest, ScheduleTaskRequest};
use med_cmms::domain::types::{TaskKind, TaskPriority, TaskStatus};
use med_cmms::repository::RepositoryError;

use test_helpers::*;

async fn schedule_preventive(env: &TestEnv, equipment_id: &str) -> String {
    env.maintenance_api
        .schedule(
            ScheduleTaskRequest {
                equipment_id: equipment_id.to_string(),
                kind: TaskKind::Preventive,
                scheduled_date: d(2024, 5, 15),
                priority: TaskPriority::Medium,
                technician_id: None,
            },
            "tester",
        )
        .await
        .unwrap()
        .task_id
}

// ==========================================
// Complete vs Cancel 互斥
// ==========================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_complete_and_cancel_are_mutually_exclusive() {
    let env = setup_env();
    insert_equipment(&env, "EQ-001", Some("MONTHLY"), None);

    // 多轮真实并行竞争，覆盖两种获胜顺序
    for round in 0..10 {
        let task_id = schedule_preventive(&env, "EQ-001").await;

        let complete_handle = tokio::spawn({
            let api = env.maintenance_api.clone();
            let task_id = task_id.clone();
            async move {
                api.complete(&task_id, CompleteTaskRequest::default(), "worker-a")
                    .await
            }
        });
        let cancel_handle = tokio::spawn({
            let api = env.maintenance_api.clone();
            let task_id = task_id.clone();
            async move { api.cancel(&task_id, "并发取消", "worker-b").await }
        });

        let complete_result = complete_handle.await.unwrap();
        let cancel_result = cancel_handle.await.unwrap();

        let success_count = complete_result.is_ok() as usize + cancel_result.is_ok() as usize;
        assert_eq!(success_count, 1, "第{}轮: 必须恰好一方成功", round);

        // 失败方得到明确的冲突/终态错误，而非静默覆盖
        for err in [
            complete_result.as_ref().err(),
            cancel_result.as_ref().err(),
        ]
        .into_iter()
        .flatten()
        {
            assert!(
                matches!(
                    err,
                    ApiError::ConcurrentModification { .. } | ApiError::AlreadyTerminal { .. }
                ),
                "第{}轮: 意外错误 {:?}",
                round,
                err
            );
        }

        // 终态与副作用一致性
        let task = env.maintenance_api.get_task(&task_id).unwrap();
        let successors: Vec<_> = env
            .task_repo
            .list_by_equipment("EQ-001")
            .unwrap()
            .into_iter()
            .filter(|t| t.chained_from_task_id.as_deref() == Some(task_id.as_str()))
            .collect();

        match task.status {
            TaskStatus::Completed => {
                assert!(complete_result.is_ok());
                assert!(task.completed_date.is_some());
                assert_eq!(successors.len(), 1, "完成方获胜时恰好一个后继");
            }
            TaskStatus::Cancelled => {
                assert!(cancel_result.is_ok());
                assert!(task.completed_date.is_none());
                assert!(successors.is_empty(), "取消方获胜时不得生成后继");
            }
            other => panic!("第{}轮: 任务必须进入终态, 实际 {}", round, other),
        }
    }
}

// ==========================================
// 过期 revision 的条件更新不产生写入
// ==========================================

#[tokio::test]
async fn test_stale_revision_write_is_rejected() {
    let env = setup_env();
    insert_equipment(&env, "EQ-001", Some("MONTHLY"), None);

    let task_id = schedule_preventive(&env, "EQ-001").await;
    let stale = env.task_repo.find_by_id(&task_id).unwrap().unwrap();

    // 他人先取消
    env.maintenance_api
        .cancel(&task_id, "设备检修占用", "worker-b")
        .await
        .unwrap();

    // 携带过期 revision 的完成写入被拒绝
    let result = env.task_repo.complete_and_chain(
        &task_id,
        stale.revision,
        d(2024, 5, 15),
        None,
        None,
        None,
        default_now(),
        None,
    );

    match result {
        Err(RepositoryError::OptimisticLockFailure { expected, actual, .. }) => {
            assert_eq!(expected, stale.revision);
            assert!(actual > stale.revision);
        }
        other => panic!("expected OptimisticLockFailure, got {:?}", other),
    }

    // 状态保持取消，无部分写入
    let reloaded = env.maintenance_api.get_task(&task_id).unwrap();
    assert_eq!(reloaded.status, TaskStatus::Cancelled);
    assert!(reloaded.completed_date.is_none());
    assert_eq!(env.task_repo.list_by_equipment("EQ-001").unwrap().len(), 1);
}

// ==========================================
// 并发指派: 单一获胜方
// ==========================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_assign_single_winner() {
    let env = setup_env();
    env.config.set_config_value("auto_assign_enabled", "0").unwrap();
    insert_equipment(&env, "EQ-001", Some("MONTHLY"), None);

    let response = env
        .incident_api
        .report(
            med_cmms::api::ReportIncidentRequest {
                equipment_id: "EQ-001".to_string(),
                title: "输液泵报警".to_string(),
                description: None,
                severity: med_cmms::Severity::Medium,
                impact: med_cmms::Impact::Medium,
                category: None,
                reported_by: "user-1".to_string(),
            },
            "user-1",
        )
        .await
        .unwrap();
    let incident_id = response.incident.incident_id;

    let handle_a = tokio::spawn({
        let api = env.incident_api.clone();
        let incident_id = incident_id.clone();
        async move { api.assign(&incident_id, Some("T-01"), "admin").await }
    });
    let handle_b = tokio::spawn({
        let api = env.incident_api.clone();
        let incident_id = incident_id.clone();
        async move { api.assign(&incident_id, Some("T-02"), "admin").await }
    });

    let a = handle_a.await.unwrap();
    let b = handle_b.await.unwrap();

    let success_count = a.is_ok() as usize + b.is_ok() as usize;
    assert_eq!(success_count, 1, "并发指派必须恰好一方成功");

    for err in [a.as_ref().err(), b.as_ref().err()].into_iter().flatten() {
        assert!(
            matches!(
                err,
                ApiError::ConcurrentModification { .. }
                    | ApiError::InvalidStateTransition { .. }
            ),
            "意外错误 {:?}",
            err
        );
    }

    // 指派结果与获胜方一致
    let incident = env.incident_repo.find_by_id(&incident_id).unwrap().unwrap();
    let winner = if a.is_ok() { "T-01" } else { "T-02" };
    assert_eq!(incident.assigned_to.as_deref(), Some(winner));
}
